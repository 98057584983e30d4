//! Knowledge domain - dual dense/sparse index over transcripts and use cases.
//!
//! The index is a derived, rebuildable view: Postgres stays authoritative and
//! callers treat index writes as best-effort. Retrieval is hybrid where the
//! collection schema allows it, with client-side rank fusion, degrading to
//! dense-only search against legacy collections or when the sparse leg
//! misbehaves.

pub mod rrf;
pub mod sparse;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::domains::use_cases::UseCase;
use crate::kernel::{
    BaseEmbeddingService, BaseVectorStore, CollectionSchema, IndexPoint, PayloadFilter,
    ScoredPoint, EMBEDDING_DIM,
};

pub use rrf::RRF_K;

pub const TRANSCRIPTS_COLLECTION: &str = "transcripts";
pub const USE_CASES_COLLECTION: &str = "use_cases";

/// Per-leg retrieval depth before fusion; deeper than any sensible `limit`
/// so fusion has real overlap to work with.
pub const INITIAL_K: usize = 20;

/// Payload text fields are previews, not storage; full text lives in Postgres.
const PREVIEW_CHARS: usize = 2000;

/// Search results per collection, side by side. Transcript chunks and use
/// cases score on different text distributions, so they are never merged
/// into one ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub transcripts: Vec<ScoredPoint>,
    pub use_cases: Vec<ScoredPoint>,
}

pub struct KnowledgeBase {
    store: Arc<dyn BaseVectorStore>,
    embeddings: Arc<dyn BaseEmbeddingService>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn BaseVectorStore>, embeddings: Arc<dyn BaseEmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    /// Create both collections with the hybrid schema if missing, and ensure
    /// payload indexes either way. Safe to call on every startup; an existing
    /// dense-only collection is left as-is and served via the legacy path.
    pub async fn ensure_collections(&self) -> Result<()> {
        self.ensure_collection(TRANSCRIPTS_COLLECTION, &["company_id", "transcript_id"])
            .await?;
        self.ensure_collection(
            USE_CASES_COLLECTION,
            &["company_id", "transcript_id", "use_case_id"],
        )
        .await?;
        Ok(())
    }

    async fn ensure_collection(&self, collection: &str, index_fields: &[&str]) -> Result<()> {
        match self.store.collection_schema(collection).await? {
            CollectionSchema::Missing => {
                tracing::info!(collection, "Creating hybrid collection");
                self.store
                    .create_hybrid_collection(collection, EMBEDDING_DIM)
                    .await?;
            }
            CollectionSchema::DenseOnly => {
                tracing::warn!(
                    collection,
                    "Collection has legacy dense-only schema; sparse indexing disabled for it"
                );
            }
            CollectionSchema::Hybrid => {}
        }
        self.store
            .create_payload_indexes(collection, index_fields)
            .await?;
        Ok(())
    }

    // -- Writes --------------------------------------------------------------

    pub async fn upsert_transcript_chunk(
        &self,
        transcript_id: Uuid,
        company_id: Uuid,
        chunk_index: u32,
        text: &str,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "transcript_id": transcript_id.to_string(),
            "company_id": company_id.to_string(),
            "chunk_index": chunk_index,
            "text": preview(text),
        });
        let id = point_id("transcript", &format!("{}:{}", transcript_id, chunk_index));
        self.upsert(TRANSCRIPTS_COLLECTION, id, text, payload).await
    }

    pub async fn upsert_use_case(&self, use_case: &UseCase) -> Result<()> {
        let mut text = format!("{}\n\n{}", use_case.title, use_case.description);
        if let Some(benefit) = &use_case.expected_benefit {
            text.push_str("\n\n");
            text.push_str(benefit);
        }
        let payload = serde_json::json!({
            "use_case_id": use_case.id.to_string(),
            "company_id": use_case.company_id.to_string(),
            "transcript_id": use_case.transcript_id.map(|id| id.to_string()),
            "title": use_case.title,
            "description": preview(&use_case.description),
            "tags": use_case.tags.0,
            "status": use_case.status,
            "confidence_score": use_case.confidence_score,
        });
        let id = point_id("usecase", &use_case.id.to_string());
        self.upsert(USE_CASES_COLLECTION, id, &text, payload).await
    }

    async fn upsert(
        &self,
        collection: &str,
        id: u64,
        text: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let dense = self.embeddings.generate(text).await?;
        // Sparse only where the schema can hold it; writing a named sparse
        // vector into a legacy collection is a hard error on the store side.
        let sparse = match self.store.collection_schema(collection).await? {
            CollectionSchema::Hybrid => Some(sparse::encode(text)),
            CollectionSchema::DenseOnly | CollectionSchema::Missing => None,
        };
        self.store
            .upsert_point(
                collection,
                IndexPoint {
                    id,
                    dense,
                    sparse,
                    payload,
                },
            )
            .await
    }

    // -- Search --------------------------------------------------------------

    pub async fn search_transcripts(
        &self,
        query: &str,
        limit: usize,
        company_id: Option<Uuid>,
    ) -> Result<Vec<ScoredPoint>> {
        self.search(TRANSCRIPTS_COLLECTION, query, limit, company_id)
            .await
    }

    pub async fn search_use_cases(
        &self,
        query: &str,
        limit: usize,
        company_id: Option<Uuid>,
    ) -> Result<Vec<ScoredPoint>> {
        self.search(USE_CASES_COLLECTION, query, limit, company_id)
            .await
    }

    /// Both collections independently, half the limit each, never cross-merged.
    pub async fn search_all(
        &self,
        query: &str,
        limit: usize,
        company_id: Option<Uuid>,
    ) -> Result<SearchResults> {
        let per_collection = limit / 2;
        let transcripts = self
            .search_transcripts(query, per_collection, company_id)
            .await?;
        let use_cases = self
            .search_use_cases(query, per_collection, company_id)
            .await?;
        Ok(SearchResults {
            transcripts,
            use_cases,
        })
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        company_id: Option<Uuid>,
    ) -> Result<Vec<ScoredPoint>> {
        let schema = self.store.collection_schema(collection).await?;
        if schema == CollectionSchema::Missing {
            tracing::warn!(collection, "Search against missing collection");
            return Ok(Vec::new());
        }

        let dense = self.embeddings.generate(query).await?;
        let filter = company_id.map(PayloadFilter::company);

        if schema == CollectionSchema::Hybrid {
            match self
                .hybrid_search(collection, &dense, query, limit, filter.as_ref())
                .await
            {
                Ok(results) => return Ok(results),
                Err(e) => {
                    tracing::warn!(
                        collection,
                        error = %e,
                        "Hybrid search failed, falling back to dense-only"
                    );
                }
            }
        }

        // Dense-path errors propagate: with a present collection and a valid
        // embedding there is no further level to degrade to.
        self.store
            .query_dense(collection, &dense, limit, filter.as_ref())
            .await
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        dense: &[f32],
        query: &str,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let sparse = sparse::encode(query);
        let dense_hits = self
            .store
            .query_dense(collection, dense, INITIAL_K, filter)
            .await?;
        let sparse_hits = if sparse.indices.is_empty() {
            Vec::new()
        } else {
            self.store
                .query_sparse(collection, &sparse, INITIAL_K, filter)
                .await?
        };
        Ok(rrf::fuse(&[dense_hits, sparse_hits], RRF_K, limit))
    }

    // -- Deletes -------------------------------------------------------------

    pub async fn delete_transcript(&self, transcript_id: Uuid) -> Result<()> {
        self.store
            .delete_by_filter(
                TRANSCRIPTS_COLLECTION,
                &PayloadFilter::transcript(transcript_id),
            )
            .await
    }

    pub async fn delete_use_case(&self, use_case_id: Uuid) -> Result<()> {
        let id = point_id("usecase", &use_case_id.to_string());
        self.store.delete_points(USE_CASES_COLLECTION, &[id]).await
    }

    /// Tenant teardown: remove every point for a company from both
    /// collections. One collection failing does not stop the other; the
    /// first error is returned after both attempts.
    pub async fn delete_company(&self, company_id: Uuid) -> Result<()> {
        let filter = PayloadFilter::company(company_id);
        let mut first_error = None;
        for collection in [TRANSCRIPTS_COLLECTION, USE_CASES_COLLECTION] {
            if let Err(e) = self.store.delete_by_filter(collection, &filter).await {
                tracing::warn!(collection, %company_id, error = %e, "Company index teardown failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Deterministic point id so re-upserting the same entity overwrites its
/// point. Folded into `[0, 2^31)` to stay positive in any signed id column.
fn point_id(kind: &str, key: &str) -> u64 {
    let digest = md5::compute(format!("{}:{}", kind, key).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(bytes) % (1 << 31)
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
