//! Integration tests for transcript and use case persistence.
//!
//! Exercises the Postgres record store against a real database: status
//! updates, progress bookkeeping, and use case inserts.

mod common;

use crate::common::{create_test_company, create_test_transcript, create_test_user, TestHarness};
use server_core::domains::transcripts::{BaseRecordStore, PostgresRecordStore, TranscriptStatus};
use server_core::domains::use_cases::{NewUseCase, UseCase, UseCaseStatus};
use test_context::test_context;
use uuid::Uuid;

// =============================================================================
// Transcript lifecycle
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn new_transcript_starts_uploaded(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let user_id = create_test_user(&ctx.db_pool, company_id).await.unwrap();
    let transcript = create_test_transcript(&ctx.db_pool, company_id, user_id, "Some text")
        .await
        .unwrap();

    assert_eq!(transcript.status, TranscriptStatus::Uploaded);
    assert_eq!(transcript.chunks_processed, 0);
    assert!(transcript.chunk_count.is_none());
    assert!(transcript.task_id.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn mark_processing_records_job_and_resets_progress(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let user_id = create_test_user(&ctx.db_pool, company_id).await.unwrap();
    let transcript = create_test_transcript(&ctx.db_pool, company_id, user_id, "Some text")
        .await
        .unwrap();
    let store = PostgresRecordStore::new(ctx.db_pool.clone());

    // Simulate a previous failed run
    store.set_chunks_processed(transcript.id, 4).await.unwrap();
    store.mark_failed(transcript.id, "llm timeout").await.unwrap();

    let updated = store.mark_processing(transcript.id, "job-abc").await.unwrap();
    assert_eq!(updated.status, TranscriptStatus::Processing);
    assert_eq!(updated.task_id.as_deref(), Some("job-abc"));
    assert_eq!(updated.chunks_processed, 0);
    assert!(updated.error_message.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn progress_counters_round_trip(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let user_id = create_test_user(&ctx.db_pool, company_id).await.unwrap();
    let transcript = create_test_transcript(&ctx.db_pool, company_id, user_id, "Some text")
        .await
        .unwrap();
    let store = PostgresRecordStore::new(ctx.db_pool.clone());

    store.set_chunk_count(transcript.id, 7).await.unwrap();
    store.set_chunks_processed(transcript.id, 3).await.unwrap();
    store.mark_completed(transcript.id).await.unwrap();

    let fetched = store.get_transcript(transcript.id).await.unwrap().unwrap();
    assert_eq!(fetched.chunk_count, Some(7));
    assert_eq!(fetched.chunks_processed, 3);
    assert_eq!(fetched.status, TranscriptStatus::Completed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn mark_failed_stores_the_error_message(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let user_id = create_test_user(&ctx.db_pool, company_id).await.unwrap();
    let transcript = create_test_transcript(&ctx.db_pool, company_id, user_id, "Some text")
        .await
        .unwrap();
    let store = PostgresRecordStore::new(ctx.db_pool.clone());

    store
        .mark_failed(transcript.id, "extraction failed on chunk 2/3")
        .await
        .unwrap();

    let fetched = store.get_transcript(transcript.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TranscriptStatus::Failed);
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("extraction failed on chunk 2/3")
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn get_transcript_returns_none_for_unknown_id(ctx: &TestHarness) {
    let store = PostgresRecordStore::new(ctx.db_pool.clone());
    assert!(store.get_transcript(Uuid::new_v4()).await.unwrap().is_none());
}

// =============================================================================
// Use case inserts
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn create_use_case_persists_all_fields(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let user_id = create_test_user(&ctx.db_pool, company_id).await.unwrap();
    let transcript = create_test_transcript(&ctx.db_pool, company_id, user_id, "Some text")
        .await
        .unwrap();
    let store = PostgresRecordStore::new(ctx.db_pool.clone());

    let created = store
        .create_use_case(NewUseCase {
            title: "Automate invoice processing".to_string(),
            description: "OCR incoming invoices and route for approval".to_string(),
            expected_benefit: Some("Saves two days per month".to_string()),
            tags: vec!["automation".to_string(), "finance".to_string()],
            confidence_score: 0.7,
            company_id,
            transcript_id: transcript.id,
            created_by_id: user_id,
        })
        .await
        .unwrap();

    assert_eq!(created.status, UseCaseStatus::New);
    assert_eq!(created.tags.0, vec!["automation", "finance"]);
    assert!((created.confidence_score - 0.7).abs() < 1e-6);

    let by_transcript = UseCase::find_by_transcript(transcript.id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(by_transcript.len(), 1);
    assert_eq!(by_transcript[0].id, created.id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn company_exists_checks_the_companies_table(ctx: &TestHarness) {
    let company_id = create_test_company(&ctx.db_pool, "Acme").await.unwrap();
    let store = PostgresRecordStore::new(ctx.db_pool.clone());

    assert!(store.company_exists(company_id).await.unwrap());
    assert!(!store.company_exists(Uuid::new_v4()).await.unwrap());
}
