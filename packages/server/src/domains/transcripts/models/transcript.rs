use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Transcript processing lifecycle.
///
/// `uploaded -> processing -> {completed | failed}`; reprocessing re-enters
/// `processing` from either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "transcript_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    #[default]
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TranscriptStatus) -> bool {
        use TranscriptStatus::*;
        matches!(
            (self, next),
            (Uploaded, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Processing)
                | (Failed, Processing)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscriptStatus::Completed | TranscriptStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transcript {
    pub id: Uuid,
    pub filename: String,
    pub raw_text: String,
    pub company_id: Uuid,
    pub uploaded_by_id: Uuid,
    pub status: TranscriptStatus,
    pub task_id: Option<String>,
    pub chunk_count: Option<i32>,
    pub chunks_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Transcript Queries
// =============================================================================

impl Transcript {
    pub async fn create(
        filename: &str,
        raw_text: &str,
        company_id: Uuid,
        uploaded_by_id: Uuid,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO transcripts (filename, raw_text, company_id, uploaded_by_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(filename)
        .bind(raw_text)
        .bind(company_id)
        .bind(uploaded_by_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM transcripts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Enter `processing`: record the job id, clear any previous error and
    /// reset progress bookkeeping. One committed statement.
    pub async fn mark_processing(id: Uuid, job_id: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE transcripts
            SET status = 'processing', task_id = $2, chunks_processed = 0,
                error_message = NULL, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(job_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_chunk_count(id: Uuid, chunk_count: i32, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE transcripts SET chunk_count = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(chunk_count)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Advance the persisted progress counter. Committed per chunk so a crash
    /// after chunk N leaves state consistent with "N completed".
    pub async fn set_chunks_processed(id: Uuid, chunks_processed: i32, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE transcripts SET chunks_processed = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(chunks_processed)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE transcripts SET status = 'completed', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(id: Uuid, error_message: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transcripts
            SET status = 'failed', error_message = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }
}
