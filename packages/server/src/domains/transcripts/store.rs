//! Record store seam between the pipeline and persistent entity storage.
//!
//! The pipeline reads/updates transcripts and creates use cases through this
//! trait; the Postgres implementation commits each significant step as a
//! single statement so a crash after step N leaves state consistent with
//! "N completed".

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Transcript;
use crate::domains::use_cases::{NewUseCase, UseCase};

#[async_trait]
pub trait BaseRecordStore: Send + Sync {
    async fn get_transcript(&self, id: Uuid) -> Result<Option<Transcript>>;

    /// Transition to `processing`: record the job id and reset progress.
    async fn mark_processing(&self, id: Uuid, job_id: &str) -> Result<Transcript>;

    async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<()>;

    async fn set_chunks_processed(&self, id: Uuid, chunks_processed: i32) -> Result<()>;

    async fn mark_completed(&self, id: Uuid) -> Result<()>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()>;

    async fn company_exists(&self, company_id: Uuid) -> Result<bool>;

    /// Create-only: the pipeline never updates or deletes use cases.
    async fn create_use_case(&self, new: NewUseCase) -> Result<UseCase>;
}

// =============================================================================
// Postgres implementation
// =============================================================================

#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseRecordStore for PostgresRecordStore {
    async fn get_transcript(&self, id: Uuid) -> Result<Option<Transcript>> {
        Transcript::find_by_id(id, &self.pool).await
    }

    async fn mark_processing(&self, id: Uuid, job_id: &str) -> Result<Transcript> {
        Transcript::mark_processing(id, job_id, &self.pool).await
    }

    async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<()> {
        Transcript::set_chunk_count(id, chunk_count, &self.pool).await
    }

    async fn set_chunks_processed(&self, id: Uuid, chunks_processed: i32) -> Result<()> {
        Transcript::set_chunks_processed(id, chunks_processed, &self.pool).await
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        Transcript::mark_completed(id, &self.pool).await
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()> {
        Transcript::mark_failed(id, error_message, &self.pool).await
    }

    async fn company_exists(&self, company_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_use_case(&self, new: NewUseCase) -> Result<UseCase> {
        UseCase::create(&new, &self.pool).await
    }
}
