use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Review lifecycle of a persisted use case. The pipeline only ever writes
/// `new`; later transitions belong to the CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "use_case_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UseCaseStatus {
    #[default]
    New,
    UnderReview,
    Approved,
    InProgress,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UseCase {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub expected_benefit: Option<String>,
    pub status: UseCaseStatus,
    pub confidence_score: f32,
    pub tags: Json<Vec<String>>,
    pub company_id: Uuid,
    pub transcript_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a create-only insert at the end of the pipeline.
#[derive(Debug, Clone)]
pub struct NewUseCase {
    pub title: String,
    pub description: String,
    pub expected_benefit: Option<String>,
    pub tags: Vec<String>,
    pub confidence_score: f32,
    pub company_id: Uuid,
    pub transcript_id: Uuid,
    pub created_by_id: Uuid,
}

// =============================================================================
// UseCase Queries
// =============================================================================

impl UseCase {
    pub async fn create(new: &NewUseCase, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO use_cases
                (title, description, expected_benefit, tags, confidence_score,
                 company_id, transcript_id, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.expected_benefit)
        .bind(Json(&new.tags))
        .bind(new.confidence_score)
        .bind(new.company_id)
        .bind(new.transcript_id)
        .bind(new.created_by_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_transcript(transcript_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM use_cases WHERE transcript_id = $1 ORDER BY created_at",
        )
        .bind(transcript_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
