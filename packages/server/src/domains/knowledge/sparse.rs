//! Client-side sparse encoding for keyword matching.
//!
//! Deterministic hashed term frequencies: the same text always produces the
//! same sparse vector, with no vocabulary to train or share. Writers and
//! readers must use this exact encoding or sparse scores are garbage.

use std::collections::HashMap;

use crate::kernel::SparseVector;

/// Token cap per text; beyond this the tail contributes nothing.
const MAX_TOKENS: usize = 500;

/// Dimension indexes live in `[0, 2^31 - 1)` to stay well inside the range
/// vector stores accept for sparse indices.
const INDEX_MODULUS: u64 = (1 << 31) - 1;

/// Encode text as a hashed term-frequency sparse vector.
///
/// Tokens are lowercased alphanumeric runs of at least two characters, taken
/// from the first [`MAX_TOKENS`] tokens only. Each distinct token hashes to a
/// dimension index and its value is the occurrence count. Empty or
/// token-free text yields an empty vector.
pub fn encode(text: &str) -> SparseVector {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<u32, f32> = HashMap::new();
    let tokens = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .take(MAX_TOKENS);
    for token in tokens {
        *counts.entry(token_index(token)).or_insert(0.0) += 1.0;
    }

    let mut entries: Vec<(u32, f32)> = counts.into_iter().collect();
    entries.sort_unstable_by_key(|(index, _)| *index);

    SparseVector {
        indices: entries.iter().map(|(index, _)| *index).collect(),
        values: entries.iter().map(|(_, value)| *value).collect(),
    }
}

fn token_index(token: &str) -> u32 {
    let digest = md5::compute(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    (u64::from_be_bytes(bytes) % INDEX_MODULUS) as u32
}
