// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use server_core::domains::knowledge::KnowledgeBase;
use server_core::domains::transcripts::{PostgresRecordStore, ProgressEvent};
use server_core::kernel::sse::{self, SseState};
use server_core::kernel::{
    BaseJobDispatcher, OpenAIClient, QdrantHttpClient, ServerDeps, StreamHub, TokioJobDispatcher,
};
use server_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Workshop Use-Case Miner API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies
    let ai = Arc::new(OpenAIClient::new(
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
    ));
    let vector_store = Arc::new(
        QdrantHttpClient::new(&config.qdrant_url, None).context("Failed to create Qdrant client")?,
    );
    let knowledge = Arc::new(KnowledgeBase::new(vector_store, ai.clone()));

    // The index is rebuildable; a down vector store should not keep the API
    // from serving transcripts.
    if let Err(e) = knowledge.ensure_collections().await {
        tracing::warn!(error = %e, "Vector collections unavailable at startup");
    }

    let stream_hub: StreamHub<ProgressEvent> = StreamHub::new();
    let deps = ServerDeps::new(
        Arc::new(PostgresRecordStore::new(pool)),
        ai.clone(),
        ai,
        knowledge,
        stream_hub.clone(),
    );
    let dispatcher = Arc::new(TokioJobDispatcher::new(deps));

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/transcripts/:transcript_id/process",
            post(dispatch_transcript),
        )
        .with_state(dispatcher)
        .merge(sse::router(SseState { stream_hub }))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Kick off background processing for a transcript and return the job id.
async fn dispatch_transcript(
    State(dispatcher): State<Arc<TokioJobDispatcher>>,
    Path(transcript_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match dispatcher.enqueue(transcript_id).await {
        Ok(task_id) => Ok(Json(serde_json::json!({ "task_id": task_id }))),
        Err(e) => {
            tracing::error!(%transcript_id, error = %e, "Failed to enqueue transcript processing");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to enqueue processing".to_string(),
            ))
        }
    }
}
