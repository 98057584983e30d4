//! Map/reduce use-case extraction over transcript chunks.
//!
//! The map stage prompts the LLM once per chunk and parses its response into
//! candidate use cases. The reduce stage prompts once per candidate batch to
//! merge duplicates and drop anything semantically equivalent to an already
//! accepted use case. Reduction is a second LLM pass rather than an embedding
//! similarity threshold: "same underlying idea" is a semantic judgment.

use anyhow::{Context, Result};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::kernel::BaseAI;

/// Candidates are folded through reduce in batches of this size.
pub const REDUCE_BATCH_SIZE: usize = 30;

/// An extracted use-case hypothesis. Transient: only survives inside the
/// reduce stage's working set until persisted as a `UseCase`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateUseCase {
    /// Short, clear title of the use case
    pub title: String,
    /// Detailed description of the problem or opportunity
    pub description: String,
    /// Business value this creates
    #[serde(default)]
    pub expected_benefit: Option<String>,
    /// 2-5 topic tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1.0 = explicitly stated as a use case. 0.7 = clearly a problem but
    /// stated implicitly. 0.4 = vague mention, uncertain if actionable.
    /// 0.2 = barely suggested.
    #[serde(default = "default_confidence")]
    pub confidence_score: f32,
}

fn default_confidence() -> f32 {
    0.5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResult {
    pub use_cases: Vec<CandidateUseCase>,
}

const MAP_SYSTEM: &str = "You are an expert analyst extracting actionable use cases from workshop transcripts.
A use case is a specific, concrete business or technology opportunity discussed.
Be conservative: vague or tangential mentions score below 0.5.
Do NOT invent use cases not present in the text.";

const REDUCE_SYSTEM: &str = "You are merging use cases extracted from different sections of the same transcript.
Merge obvious duplicates (same underlying idea). Combine details from multiple mentions.
Raise confidence_score if a use case was mentioned multiple times. Keep distinct ones separate.
CRITICAL: Do NOT output any use case that is semantically similar to one already in the \"already_extracted\" list.
Treat \"already_extracted\" as the canonical list of use cases already produced - do not duplicate them.";

/// Format instructions appended to every prompt: respond with JSON matching
/// the ExtractionResult schema.
fn format_instructions() -> String {
    let schema = schema_for!(ExtractionResult);
    let schema_json =
        serde_json::to_string(&schema).unwrap_or_else(|_| "{\"use_cases\": []}".to_string());
    format!(
        "Respond ONLY with a JSON object matching this JSON schema, no prose:\n{}",
        schema_json
    )
}

/// Map stage: extract candidate use cases from one chunk.
///
/// An unparseable response is an error — the caller treats it as a stage
/// failure, never a silently empty result.
pub async fn extract_use_cases(ai: &dyn BaseAI, chunk: &str) -> Result<Vec<CandidateUseCase>> {
    let prompt = format!(
        "{}\n\n{}\n\nTranscript excerpt:\n{}",
        MAP_SYSTEM,
        format_instructions(),
        chunk
    );
    let raw = ai
        .complete_json(&prompt)
        .await
        .context("Map-stage LLM call failed")?;
    let result = parse_extraction(&raw).context("Map-stage response did not match schema")?;
    Ok(result.use_cases)
}

/// Reduce stage: merge/deduplicate a candidate batch against itself and the
/// already-accepted set. Never re-emits a candidate judged semantically
/// equivalent to an accepted one.
pub async fn reduce_use_cases(
    ai: &dyn BaseAI,
    batch: &[CandidateUseCase],
    already_accepted: &[CandidateUseCase],
) -> Result<Vec<CandidateUseCase>> {
    let batch_json = serde_json::to_string_pretty(batch).context("serialize candidate batch")?;
    let accepted_json =
        serde_json::to_string_pretty(already_accepted).context("serialize accepted set")?;

    let prompt = format!(
        "{}\n\n{}\n\nALREADY EXTRACTED (do not duplicate):\n{}\n\nNew use cases from this batch (merge/deduplicate against above):\n{}",
        REDUCE_SYSTEM,
        format_instructions(),
        accepted_json,
        batch_json
    );
    let raw = ai
        .complete_json(&prompt)
        .await
        .context("Reduce-stage LLM call failed")?;
    let result = parse_extraction(&raw).context("Reduce-stage response did not match schema")?;
    Ok(result.use_cases)
}

/// Parse an LLM response into the strict extraction schema.
///
/// Tolerates markdown code fences around the JSON but nothing else.
pub fn parse_extraction(raw: &str) -> Result<ExtractionResult> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).with_context(|| {
        let preview: String = cleaned.chars().take(200).collect();
        format!("unparseable extraction response: {}", preview)
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag after the opening fence
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(inner)
        .trim()
}
