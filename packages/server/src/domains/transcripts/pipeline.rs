//! Transcript processing pipeline: chunk -> map -> reduce -> persist -> index.
//!
//! Runs as one logical unit of work per transcript. Chunks are processed
//! sequentially: reduce folds results incrementally and the persisted
//! progress counter must reflect true completion order. Any map-stage
//! failure fails the whole job (no partial commit of use cases); reduce
//! failures fall back to the raw candidate list; index writes are
//! best-effort and never block the record store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunker::chunk_transcript;
use super::extraction::{extract_use_cases, reduce_use_cases, CandidateUseCase, REDUCE_BATCH_SIZE};
use super::models::{Transcript, TranscriptStatus};
use crate::domains::use_cases::NewUseCase;
use crate::kernel::deps::ServerDeps;

/// Progress events published while a transcript is processed.
///
/// A closed set of variants so consumers pattern-match exhaustively;
/// serialized as `{"event": "chunk_done", ...}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Processing began; chunk count is not known yet.
    Started { chunk_count: u32 },

    /// One chunk's map call succeeded.
    ChunkDone { chunk: u32, total: u32, extracted: u32 },

    /// All chunks mapped; deduplication underway.
    Reducing { raw_count: u32 },

    /// Terminal: all resulting records persisted.
    Completed { use_cases_count: u32 },

    /// Terminal: the job failed; the transcript carries the error message.
    Failed { error: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. }
        )
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Started { .. } => "started",
            ProgressEvent::ChunkDone { .. } => "chunk_done",
            ProgressEvent::Reducing { .. } => "reducing",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Failed { .. } => "failed",
        }
    }
}

/// StreamHub topic for a transcript's progress events.
pub fn progress_topic(transcript_id: Uuid) -> String {
    format!("transcript:{}", transcript_id)
}

/// Process a transcript end to end.
///
/// Failures inside the pipeline are recorded on the transcript
/// (`status = failed`, `error_message`) and published as a terminal event;
/// the returned error covers only the case where that bookkeeping itself
/// failed.
pub async fn process_transcript(
    deps: &ServerDeps,
    transcript_id: Uuid,
    job_id: &str,
) -> Result<()> {
    tracing::info!(%transcript_id, job_id, "Starting transcript processing");

    let Some(transcript) = deps.records.get_transcript(transcript_id).await? else {
        tracing::warn!(%transcript_id, "Transcript not found, ending job without status mutation");
        return Ok(());
    };

    if !transcript.status.can_transition_to(TranscriptStatus::Processing) {
        tracing::warn!(
            %transcript_id,
            status = ?transcript.status,
            "Transcript cannot enter processing from its current status"
        );
        return Ok(());
    }

    let topic = progress_topic(transcript_id);
    match run_pipeline(deps, &transcript, job_id, &topic).await {
        Ok(count) => {
            tracing::info!(%transcript_id, use_cases = count, "Transcript processing finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(%transcript_id, error = %e, "Transcript processing failed");
            deps.records
                .mark_failed(transcript_id, &format!("{:#}", e))
                .await
                .context("failed to record pipeline failure")?;
            deps.stream_hub
                .publish(
                    &topic,
                    ProgressEvent::Failed {
                        error: format!("{:#}", e),
                    },
                )
                .await;
            Ok(())
        }
    }
}

async fn run_pipeline(
    deps: &ServerDeps,
    transcript: &Transcript,
    job_id: &str,
    topic: &str,
) -> Result<usize> {
    let transcript_id = transcript.id;
    let records = &deps.records;

    records.mark_processing(transcript_id, job_id).await?;
    deps.stream_hub
        .publish(topic, ProgressEvent::Started { chunk_count: 0 })
        .await;

    // -- Chunking ------------------------------------------------------------
    let chunks = chunk_transcript(&transcript.raw_text);
    let total = chunks.len();
    records.set_chunk_count(transcript_id, total as i32).await?;
    tracing::info!(%transcript_id, chunks = total, "Chunking completed");

    // -- Map: extract per chunk, sequentially --------------------------------
    let mut candidates: Vec<CandidateUseCase> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let index = i + 1;
        tracing::debug!(%transcript_id, chunk = index, total, length = chunk.len(), "Processing chunk");

        let extracted = extract_use_cases(deps.ai.as_ref(), chunk)
            .await
            .with_context(|| format!("extraction failed on chunk {}/{}", index, total))?;

        records
            .set_chunks_processed(transcript_id, index as i32)
            .await?;
        deps.stream_hub
            .publish(
                topic,
                ProgressEvent::ChunkDone {
                    chunk: index as u32,
                    total: total as u32,
                    extracted: extracted.len() as u32,
                },
            )
            .await;
        tracing::info!(
            %transcript_id,
            chunk = index,
            total,
            extracted = extracted.len(),
            "Chunk processed"
        );
        candidates.extend(extracted);
    }

    // -- Reduce: deduplicate and merge ---------------------------------------
    deps.stream_hub
        .publish(
            topic,
            ProgressEvent::Reducing {
                raw_count: candidates.len() as u32,
            },
        )
        .await;
    let final_use_cases = reduce_all(deps, transcript_id, candidates).await;

    // -- Persist -------------------------------------------------------------
    match records.company_exists(transcript.company_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(%transcript_id, company_id = %transcript.company_id, "Company not found")
        }
        Err(e) => {
            tracing::warn!(%transcript_id, error = %e, "Company lookup failed")
        }
    }

    let mut created = Vec::with_capacity(final_use_cases.len());
    for uc in &final_use_cases {
        let new = NewUseCase {
            title: uc.title.clone(),
            description: uc.description.clone(),
            expected_benefit: uc.expected_benefit.clone(),
            tags: uc.tags.clone(),
            confidence_score: uc.confidence_score,
            company_id: transcript.company_id,
            transcript_id,
            created_by_id: transcript.uploaded_by_id,
        };
        let persisted = records
            .create_use_case(new)
            .await
            .with_context(|| format!("failed to persist use case '{}'", uc.title))?;
        created.push(persisted);
    }
    tracing::info!(%transcript_id, persisted = created.len(), "Persistence completed");

    // -- Index (best-effort, never blocks the authoritative store) ----------
    for (i, chunk) in chunks.iter().enumerate() {
        if let Err(e) = deps
            .knowledge
            .upsert_transcript_chunk(transcript_id, transcript.company_id, i as u32, chunk)
            .await
        {
            tracing::warn!(%transcript_id, chunk = i, error = %e, "Transcript chunk indexing failed");
        }
    }
    for uc in &created {
        if let Err(e) = deps.knowledge.upsert_use_case(uc).await {
            tracing::warn!(use_case_id = %uc.id, error = %e, "Use case indexing failed");
        }
    }

    // -- Finalize ------------------------------------------------------------
    records.mark_completed(transcript_id).await?;
    deps.stream_hub
        .publish(
            topic,
            ProgressEvent::Completed {
                use_cases_count: created.len() as u32,
            },
        )
        .await;

    Ok(created.len())
}

/// Fold candidates through the reduce stage in batches, accumulating the
/// accepted set. A failing batch passes through unreduced rather than losing
/// data.
async fn reduce_all(
    deps: &ServerDeps,
    transcript_id: Uuid,
    candidates: Vec<CandidateUseCase>,
) -> Vec<CandidateUseCase> {
    if candidates.is_empty() {
        tracing::info!(%transcript_id, "No use cases to reduce - empty result");
        return Vec::new();
    }
    let raw_count = candidates.len();

    let mut accepted: Vec<CandidateUseCase> = Vec::new();
    for batch in candidates.chunks(REDUCE_BATCH_SIZE) {
        match reduce_use_cases(deps.ai.as_ref(), batch, &accepted).await {
            Ok(reduced) => accepted.extend(reduced),
            Err(e) => {
                tracing::warn!(
                    %transcript_id,
                    error = %e,
                    "Reduce failed - falling back to raw results for this batch"
                );
                accepted.extend_from_slice(batch);
            }
        }
    }
    tracing::info!(%transcript_id, before = raw_count, after = accepted.len(), "Reduce completed");
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::transcripts::extraction::ExtractionResult;
    use crate::kernel::test_dependencies::{MockAI, TestDependencies};

    fn candidate(title: &str, confidence: f32) -> CandidateUseCase {
        CandidateUseCase {
            title: title.to_string(),
            description: format!("{} description", title),
            expected_benefit: Some("saves time".to_string()),
            tags: vec!["automation".to_string()],
            confidence_score: confidence,
        }
    }

    fn extraction_json(candidates: Vec<CandidateUseCase>) -> ExtractionResult {
        ExtractionResult {
            use_cases: candidates,
        }
    }

    #[test]
    fn progress_events_serialize_with_event_tag() {
        let event = ProgressEvent::ChunkDone {
            chunk: 1,
            total: 3,
            extracted: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chunk_done");
        assert_eq!(json["chunk"], 1);
        assert_eq!(json["total"], 3);
        assert_eq!(json["extracted"], 2);
    }

    #[test]
    fn terminal_events_are_flagged() {
        assert!(ProgressEvent::Completed { use_cases_count: 0 }.is_terminal());
        assert!(ProgressEvent::Failed {
            error: "x".to_string()
        }
        .is_terminal());
        assert!(!ProgressEvent::Started { chunk_count: 0 }.is_terminal());
        assert!(!ProgressEvent::Reducing { raw_count: 0 }.is_terminal());
    }

    #[tokio::test]
    async fn single_chunk_transcript_completes_end_to_end() {
        // Two short paragraphs -> exactly one chunk; map yields one candidate;
        // reduce returns it unchanged.
        let ai = MockAI::new()
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]))
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]));
        let test_deps = TestDependencies::new().mock_ai(ai);
        let transcript_id = test_deps
            .records
            .seed_transcript("First paragraph.\n\nSecond paragraph.")
            .await;
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, transcript_id, "job-1").await.unwrap();

        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(transcript.chunk_count, Some(1));
        assert_eq!(transcript.chunks_processed, 1);
        assert_eq!(transcript.task_id.as_deref(), Some("job-1"));
        assert!(transcript.error_message.is_none());

        let use_cases = test_deps.records.use_cases().await;
        assert_eq!(use_cases.len(), 1);
        assert_eq!(use_cases[0].title, "X");
        assert_eq!(
            use_cases[0].status,
            crate::domains::use_cases::UseCaseStatus::New
        );
    }

    #[tokio::test]
    async fn publishes_progress_events_in_order() {
        let ai = MockAI::new()
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]))
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]));
        let test_deps = TestDependencies::new().mock_ai(ai);
        let transcript_id = test_deps.records.seed_transcript("Only paragraph.").await;
        let deps = test_deps.clone().into_deps();

        let mut rx = deps.stream_hub.subscribe(&progress_topic(transcript_id)).await;

        process_transcript(&deps, transcript_id, "job-1").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Started { chunk_count: 0 }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::ChunkDone {
                chunk: 1,
                total: 1,
                extracted: 1
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Reducing { raw_count: 1 }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Completed { use_cases_count: 1 }
        );
    }

    #[tokio::test]
    async fn map_failure_fails_job_and_keeps_partial_progress() {
        // Three chunks; chunk 2's map response is unparseable.
        let big = "p".repeat(4000 * 4);
        let text = format!("{big}\n\n{big}\n\n{big}");
        assert_eq!(chunk_transcript(&text).len(), 3);

        let ai = MockAI::new()
            .with_json_response(&extraction_json(vec![candidate("A", 0.8)]))
            .with_response("this is not json");
        let test_deps = TestDependencies::new().mock_ai(ai);
        let transcript_id = test_deps.records.seed_transcript(&text).await;
        let deps = test_deps.clone().into_deps();

        let mut rx = deps.stream_hub.subscribe(&progress_topic(transcript_id)).await;

        process_transcript(&deps, transcript_id, "job-2").await.unwrap();

        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Failed);
        assert_eq!(transcript.chunks_processed, 1);
        let error = transcript.error_message.unwrap();
        assert!(error.contains("chunk 2/3"), "unexpected error: {error}");

        // No use cases persisted at all
        assert!(test_deps.records.use_cases().await.is_empty());

        // Last event is terminal failure
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(ProgressEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn reduce_failure_falls_back_to_raw_candidates() {
        let ai = MockAI::new()
            .with_json_response(&extraction_json(vec![
                candidate("A", 0.8),
                candidate("B", 0.6),
            ]))
            // Reduce response is malformed -> raw batch passes through
            .with_response("garbage");
        let test_deps = TestDependencies::new().mock_ai(ai);
        let transcript_id = test_deps.records.seed_transcript("One paragraph.").await;
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, transcript_id, "job-3").await.unwrap();

        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(test_deps.records.use_cases().await.len(), 2);
    }

    #[tokio::test]
    async fn missing_transcript_ends_without_mutation() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, Uuid::new_v4(), "job-4").await.unwrap();

        assert!(test_deps.records.use_cases().await.is_empty());
    }

    #[tokio::test]
    async fn empty_transcript_completes_with_zero_use_cases() {
        let test_deps = TestDependencies::new();
        let transcript_id = test_deps.records.seed_transcript("   ").await;
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, transcript_id, "job-5").await.unwrap();

        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(transcript.chunk_count, Some(0));
        assert_eq!(transcript.chunks_processed, 0);
        assert!(test_deps.records.use_cases().await.is_empty());
    }

    #[tokio::test]
    async fn index_failure_does_not_fail_the_job() {
        let ai = MockAI::new()
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]))
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]));
        let test_deps = TestDependencies::new().mock_ai(ai);
        test_deps.vector_store.fail_upserts(true);
        let transcript_id = test_deps.records.seed_transcript("A paragraph.").await;
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, transcript_id, "job-6").await.unwrap();

        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(test_deps.records.use_cases().await.len(), 1);
    }

    #[tokio::test]
    async fn reprocessing_resets_progress_and_reenters_processing() {
        let ai = MockAI::new()
            // First run: map fails outright
            .with_response("broken")
            // Second run: map + reduce succeed
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]))
            .with_json_response(&extraction_json(vec![candidate("X", 0.9)]));
        let test_deps = TestDependencies::new().mock_ai(ai);
        let transcript_id = test_deps.records.seed_transcript("A paragraph.").await;
        let deps = test_deps.clone().into_deps();

        process_transcript(&deps, transcript_id, "job-7").await.unwrap();
        assert_eq!(
            test_deps.records.transcript(transcript_id).await.status,
            TranscriptStatus::Failed
        );

        process_transcript(&deps, transcript_id, "job-8").await.unwrap();
        let transcript = test_deps.records.transcript(transcript_id).await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(transcript.task_id.as_deref(), Some("job-8"));
        assert!(transcript.error_message.is_none());
    }
}
