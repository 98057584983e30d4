//! In-process job dispatcher.
//!
//! Satisfies the dispatcher seam: `enqueue(transcript_id) -> job_id`. The
//! pipeline runs as a single spawned task per transcript; durable queueing,
//! leases and retries belong to an external task queue and are not modeled
//! here. The orchestrator records the returned job id onto the transcript
//! itself.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::deps::ServerDeps;
use super::BaseJobDispatcher;
use crate::domains::transcripts::process_transcript;

pub struct TokioJobDispatcher {
    deps: ServerDeps,
}

impl TokioJobDispatcher {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl BaseJobDispatcher for TokioJobDispatcher {
    async fn enqueue(&self, transcript_id: Uuid) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let deps = self.deps.clone();
        let task_job_id = job_id.clone();

        tracing::info!(%transcript_id, job_id = %job_id, "Dispatching transcript processing");

        tokio::spawn(async move {
            if let Err(e) = process_transcript(&deps, transcript_id, &task_job_id).await {
                // The pipeline records its own failures; an error here means
                // even that bookkeeping failed.
                tracing::error!(%transcript_id, job_id = %task_job_id, error = %e, "Transcript processing task failed");
            }
        });

        Ok(job_id)
    }
}
