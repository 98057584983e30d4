// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "extract use cases") should be domain functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseEmbeddingService)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM (returns raw text response)
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt expecting JSON response (returns raw JSON string)
    /// Parse with serde_json::from_str in calling code
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        // Default implementation calls complete
        self.complete(prompt).await
    }
}

// =============================================================================
// Embedding Service Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate a dense embedding for text (1536-dimensional vector)
    async fn generate(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// Vector Store Trait (Infrastructure - raw point operations)
// =============================================================================

/// Shape of an existing vector collection.
///
/// `Hybrid` collections carry named dense + sparse vector spaces; `DenseOnly`
/// is the legacy single-vector layout. Search strategy is chosen from this
/// probe rather than by catching failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionSchema {
    Missing,
    DenseOnly,
    Hybrid,
}

/// Hashed term-frequency vector for keyword matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A point to upsert: deterministic id, dense vector, optional sparse
/// vector (only when the target collection has the hybrid schema), payload.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: u64,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub payload: serde_json::Value,
}

/// A scored search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Exact-match payload filter (all conditions must hold).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    pub must: Vec<(String, String)>,
}

impl PayloadFilter {
    pub fn company(company_id: Uuid) -> Self {
        Self {
            must: vec![("company_id".to_string(), company_id.to_string())],
        }
    }

    pub fn transcript(transcript_id: Uuid) -> Self {
        Self {
            must: vec![("transcript_id".to_string(), transcript_id.to_string())],
        }
    }
}

#[async_trait]
pub trait BaseVectorStore: Send + Sync {
    /// Probe a collection's schema. `Missing` if it does not exist.
    async fn collection_schema(&self, collection: &str) -> Result<CollectionSchema>;

    /// Create a collection with named dense (cosine) + sparse vector spaces.
    async fn create_hybrid_collection(&self, collection: &str, dense_size: usize) -> Result<()>;

    /// Create keyword payload indexes for filterable fields.
    async fn create_payload_indexes(&self, collection: &str, fields: &[&str]) -> Result<()>;

    /// Write or overwrite a point (last write wins).
    async fn upsert_point(&self, collection: &str, point: IndexPoint) -> Result<()>;

    /// Top-k by dense cosine similarity.
    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Top-k by sparse term overlap.
    async fn query_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete specific points by id.
    async fn delete_points(&self, collection: &str, ids: &[u64]) -> Result<()>;

    /// Delete every point matching a payload filter.
    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<()>;
}

// =============================================================================
// Job Dispatcher Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseJobDispatcher: Send + Sync {
    /// Enqueue transcript processing; returns the job id the pipeline will
    /// record back onto the transcript.
    async fn enqueue(&self, transcript_id: Uuid) -> Result<String>;
}
