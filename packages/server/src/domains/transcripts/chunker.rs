//! Paragraph-aligned transcript chunking.
//!
//! Splits on double-newline paragraph boundaries rather than arbitrary
//! character offsets, and carries an overlap tail from the previous chunk so
//! ideas spanning a boundary stay visible to the LLM in at least one chunk.

/// Soft chunk size in estimated tokens (chars / 4).
pub const CHUNK_SIZE_TOKENS: usize = 6000;

/// Overlap carried into the next chunk, in estimated tokens.
pub const CHUNK_OVERLAP_TOKENS: usize = 500;

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Split a transcript into ordered, size-bounded chunks.
///
/// The size limit is a soft target: a single paragraph longer than the limit
/// is kept whole rather than sub-split. Whitespace-only input yields no
/// chunks.
pub fn chunk_transcript(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_overlap: Option<String> = None;
    let mut current_len = 0usize;

    for para in text.split("\n\n") {
        let para_len = estimate_tokens(para);
        if current_len + para_len > CHUNK_SIZE_TOKENS && !(current.is_empty() && current_overlap.is_none()) {
            let closed = join_segment(current_overlap.as_deref(), &current);
            // Keep an overlap tail from the end of the closed chunk
            let overlap = tail_chars(&closed, CHUNK_OVERLAP_TOKENS * 4);
            chunks.push(closed);
            current_overlap = Some(overlap);
            current = vec![para];
            current_len = CHUNK_OVERLAP_TOKENS + para_len;
        } else {
            current.push(para);
            current_len += para_len;
        }
    }

    if !current.is_empty() || current_overlap.is_some() {
        chunks.push(join_segment(current_overlap.as_deref(), &current));
    }
    chunks
}

fn join_segment(overlap: Option<&str>, paragraphs: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(paragraphs.len() + 1);
    if let Some(tail) = overlap {
        parts.push(tail);
    }
    parts.extend_from_slice(paragraphs);
    parts.join("\n\n")
}

/// Last `n` characters of `s`, respecting char boundaries.
fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        return s.to_string();
    }
    s.chars().skip(count - n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(token_len: usize, fill: char) -> String {
        // chars/4 token estimate: token_len tokens == token_len * 4 chars
        std::iter::repeat(fill).take(token_len * 4).collect()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_transcript("").is_empty());
        assert!(chunk_transcript("   \n\n  \n").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = chunk_transcript(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn two_paragraphs_under_limit_stay_together() {
        // End-to-end precondition: two paragraphs, each well under the limit
        let text = format!("{}\n\n{}", paragraph(100, 'a'), paragraph(100, 'b'));
        assert_eq!(chunk_transcript(&text).len(), 1);
    }

    #[test]
    fn splits_on_paragraph_boundary_when_limit_exceeded() {
        let a = paragraph(4000, 'a');
        let b = paragraph(4000, 'b');
        let text = format!("{a}\n\n{b}");
        let chunks = chunk_transcript(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], a);
        // Second chunk starts with the overlap tail of the first
        assert!(chunks[1].starts_with(&tail_chars(&a, CHUNK_OVERLAP_TOKENS * 4)));
        assert!(chunks[1].ends_with(&b));
    }

    #[test]
    fn adjacent_chunks_share_overlap_verbatim() {
        let paras: Vec<String> = (0..4)
            .map(|i| paragraph(3500, char::from(b'a' + i as u8)))
            .collect();
        let text = paras.join("\n\n");
        let chunks = chunk_transcript(&text);
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0], CHUNK_OVERLAP_TOKENS * 4);
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn concatenation_minus_overlap_reconstructs_paragraphs() {
        let paras: Vec<String> = (0..5)
            .map(|i| paragraph(3000, char::from(b'a' + i as u8)))
            .collect();
        let text = paras.join("\n\n");
        let chunks = chunk_transcript(&text);

        let mut reconstructed = chunks[0].clone();
        for pair in chunks.windows(2) {
            let overlap_len = tail_chars(&pair[0], CHUNK_OVERLAP_TOKENS * 4).len();
            // Strip the injected overlap and the separator that follows it
            reconstructed.push_str("\n\n");
            reconstructed.push_str(&pair[1][overlap_len + 2..]);
        }
        assert_eq!(reconstructed, text);
    }

    #[test]
    fn oversized_single_paragraph_is_kept_whole() {
        let huge = paragraph(CHUNK_SIZE_TOKENS + 2000, 'x');
        let chunks = chunk_transcript(&huge);
        assert_eq!(chunks, vec![huge]);
    }

    #[test]
    fn chunks_respect_soft_limit() {
        let paras: Vec<String> = (0..10).map(|_| paragraph(2000, 'p')).collect();
        let text = paras.join("\n\n");
        for chunk in chunk_transcript(&text) {
            // Overlap + separators add slack beyond the paragraph accounting
            assert!(
                estimate_tokens(&chunk) <= CHUNK_SIZE_TOKENS + CHUNK_OVERLAP_TOKENS + 10,
                "chunk of {} tokens exceeds budget",
                estimate_tokens(&chunk)
            );
        }
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        let s = "héllo wörld";
        let tail = tail_chars(s, 4);
        assert_eq!(tail, "örld");
    }
}
