//! Shared row fixtures for integration tests.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use server_core::domains::transcripts::Transcript;

pub async fn create_test_company(pool: &PgPool, name: &str) -> Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO companies (name) VALUES ($1) RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn create_test_user(pool: &PgPool, company_id: Uuid) -> Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (email, display_name, company_id)
        VALUES ($1, 'Test User', $2)
        RETURNING id
        "#,
    )
    .bind(format!("user-{}@example.org", Uuid::new_v4()))
    .bind(company_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn create_test_transcript(
    pool: &PgPool,
    company_id: Uuid,
    uploaded_by_id: Uuid,
    raw_text: &str,
) -> Result<Transcript> {
    Transcript::create("workshop.txt", raw_text, company_id, uploaded_by_id, pool).await
}
