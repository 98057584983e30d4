// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected as ServerDeps for tests.
// Mocks are scripted up front with builder methods and record every call
// for assertion afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    BaseAI, BaseEmbeddingService, BaseVectorStore, CollectionSchema, IndexPoint, PayloadFilter,
    ScoredPoint, SparseVector, StreamHub,
};
use crate::domains::knowledge::KnowledgeBase;
use crate::domains::transcripts::{BaseRecordStore, ProgressEvent, Transcript, TranscriptStatus};
use crate::domains::use_cases::{NewUseCase, UseCase, UseCaseStatus};
use crate::kernel::deps::ServerDeps;

// =============================================================================
// Mock AI
// =============================================================================

/// Scripted LLM: responses are consumed in order; running out of script is a
/// hard error so a test with an unexpected extra call fails loudly.
pub struct MockAI {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, response: &str) -> Self {
        self.responses.lock().unwrap().push(response.to_string());
        self
    }

    /// Queue a response serialized as JSON
    pub fn with_json_response<T: Serialize>(self, value: &T) -> Self {
        let json = serde_json::to_string(value).unwrap();
        self.responses.lock().unwrap().push(json);
        self
    }

    /// Get all prompts that were sent
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Check if any prompt contained the given text
    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|p| p.contains(text))
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            bail!("MockAI has no scripted response for this call");
        }
        Ok(responses.remove(0))
    }
}

// =============================================================================
// Mock Embedding Service
// =============================================================================

/// Deterministic embeddings: same text, same vector. Different texts get
/// different vectors so tests can tell them apart without real similarity.
pub struct MockEmbeddingService {
    dimension: usize,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        Self {
            dimension: 8,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        let seed = text
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        Ok((0..self.dimension)
            .map(|i| ((seed.wrapping_add(i as u32) % 1000) as f32) / 1000.0)
            .collect())
    }
}

// =============================================================================
// Mock Vector Store
// =============================================================================

/// In-memory vector store with per-collection scripted search results and
/// switchable failure injection for the sparse and upsert paths.
pub struct MockVectorStore {
    schemas: Mutex<HashMap<String, CollectionSchema>>,
    dense_results: Mutex<HashMap<String, Vec<ScoredPoint>>>,
    sparse_results: Mutex<HashMap<String, Vec<ScoredPoint>>>,
    upserts: Mutex<Vec<(String, IndexPoint)>>,
    point_deletes: Mutex<Vec<(String, Vec<u64>)>>,
    filter_deletes: Mutex<Vec<(String, PayloadFilter)>>,
    fail_sparse: Mutex<bool>,
    fail_upserts: Mutex<bool>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self {
            schemas: Mutex::new(HashMap::new()),
            dense_results: Mutex::new(HashMap::new()),
            sparse_results: Mutex::new(HashMap::new()),
            upserts: Mutex::new(Vec::new()),
            point_deletes: Mutex::new(Vec::new()),
            filter_deletes: Mutex::new(Vec::new()),
            fail_sparse: Mutex::new(false),
            fail_upserts: Mutex::new(false),
        }
    }

    pub fn set_schema(&self, collection: &str, schema: CollectionSchema) {
        self.schemas
            .lock()
            .unwrap()
            .insert(collection.to_string(), schema);
    }

    pub fn script_dense(&self, collection: &str, results: Vec<ScoredPoint>) {
        self.dense_results
            .lock()
            .unwrap()
            .insert(collection.to_string(), results);
    }

    pub fn script_sparse(&self, collection: &str, results: Vec<ScoredPoint>) {
        self.sparse_results
            .lock()
            .unwrap()
            .insert(collection.to_string(), results);
    }

    pub fn fail_sparse(&self, fail: bool) {
        *self.fail_sparse.lock().unwrap() = fail;
    }

    pub fn fail_upserts(&self, fail: bool) {
        *self.fail_upserts.lock().unwrap() = fail;
    }

    pub async fn schema(&self, collection: &str) -> CollectionSchema {
        self.schemas
            .lock()
            .unwrap()
            .get(collection)
            .copied()
            .unwrap_or(CollectionSchema::Missing)
    }

    /// Get every upserted point with its target collection
    pub async fn upserts(&self) -> Vec<(String, IndexPoint)> {
        self.upserts.lock().unwrap().clone()
    }

    pub async fn point_deletes(&self) -> Vec<(String, Vec<u64>)> {
        self.point_deletes.lock().unwrap().clone()
    }

    pub async fn filter_deletes(&self) -> Vec<(String, PayloadFilter)> {
        self.filter_deletes.lock().unwrap().clone()
    }
}

impl Default for MockVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseVectorStore for MockVectorStore {
    async fn collection_schema(&self, collection: &str) -> Result<CollectionSchema> {
        Ok(self.schema(collection).await)
    }

    async fn create_hybrid_collection(&self, collection: &str, _dense_size: usize) -> Result<()> {
        self.set_schema(collection, CollectionSchema::Hybrid);
        Ok(())
    }

    async fn create_payload_indexes(&self, _collection: &str, _fields: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn upsert_point(&self, collection: &str, point: IndexPoint) -> Result<()> {
        if *self.fail_upserts.lock().unwrap() {
            bail!("simulated upsert failure");
        }
        self.upserts
            .lock()
            .unwrap()
            .push((collection.to_string(), point));
        Ok(())
    }

    async fn query_dense(
        &self,
        collection: &str,
        _vector: &[f32],
        limit: usize,
        _filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut results = self
            .dense_results
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }

    async fn query_sparse(
        &self,
        collection: &str,
        _vector: &SparseVector,
        limit: usize,
        _filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        if *self.fail_sparse.lock().unwrap() {
            bail!("simulated sparse query failure");
        }
        let mut results = self
            .sparse_results
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_points(&self, collection: &str, ids: &[u64]) -> Result<()> {
        self.point_deletes
            .lock()
            .unwrap()
            .push((collection.to_string(), ids.to_vec()));
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<()> {
        self.filter_deletes
            .lock()
            .unwrap()
            .push((collection.to_string(), filter.clone()));
        Ok(())
    }
}

// =============================================================================
// In-memory Record Store
// =============================================================================

/// HashMap-backed BaseRecordStore so pipeline tests run without Postgres.
pub struct InMemoryRecordStore {
    transcripts: Mutex<HashMap<Uuid, Transcript>>,
    use_cases: Mutex<Vec<UseCase>>,
    companies: Mutex<HashSet<Uuid>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            transcripts: Mutex::new(HashMap::new()),
            use_cases: Mutex::new(Vec::new()),
            companies: Mutex::new(HashSet::new()),
        }
    }

    /// Insert an uploaded transcript (and its company) and return its id.
    pub async fn seed_transcript(&self, raw_text: &str) -> Uuid {
        let now = Utc::now();
        let company_id = Uuid::new_v4();
        self.companies.lock().unwrap().insert(company_id);

        let transcript = Transcript {
            id: Uuid::new_v4(),
            filename: "workshop.txt".to_string(),
            raw_text: raw_text.to_string(),
            company_id,
            uploaded_by_id: Uuid::new_v4(),
            status: TranscriptStatus::Uploaded,
            task_id: None,
            chunk_count: None,
            chunks_processed: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let id = transcript.id;
        self.transcripts.lock().unwrap().insert(id, transcript);
        id
    }

    /// Current state of a seeded transcript. Panics if the id is unknown.
    pub async fn transcript(&self, id: Uuid) -> Transcript {
        self.transcripts
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("no transcript {id} in InMemoryRecordStore"))
    }

    pub async fn use_cases(&self) -> Vec<UseCase> {
        self.use_cases.lock().unwrap().clone()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<Transcript>
    where
        F: FnOnce(&mut Transcript),
    {
        let mut transcripts = self.transcripts.lock().unwrap();
        let transcript = transcripts
            .get_mut(&id)
            .ok_or_else(|| anyhow!("transcript {id} not found"))?;
        apply(transcript);
        transcript.updated_at = Utc::now();
        Ok(transcript.clone())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRecordStore for InMemoryRecordStore {
    async fn get_transcript(&self, id: Uuid) -> Result<Option<Transcript>> {
        Ok(self.transcripts.lock().unwrap().get(&id).cloned())
    }

    async fn mark_processing(&self, id: Uuid, job_id: &str) -> Result<Transcript> {
        self.update(id, |t| {
            t.status = TranscriptStatus::Processing;
            t.task_id = Some(job_id.to_string());
            t.chunks_processed = 0;
            t.error_message = None;
        })
    }

    async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<()> {
        self.update(id, |t| t.chunk_count = Some(chunk_count))?;
        Ok(())
    }

    async fn set_chunks_processed(&self, id: Uuid, chunks_processed: i32) -> Result<()> {
        self.update(id, |t| t.chunks_processed = chunks_processed)?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        self.update(id, |t| t.status = TranscriptStatus::Completed)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()> {
        self.update(id, |t| {
            t.status = TranscriptStatus::Failed;
            t.error_message = Some(error_message.to_string());
        })?;
        Ok(())
    }

    async fn company_exists(&self, company_id: Uuid) -> Result<bool> {
        Ok(self.companies.lock().unwrap().contains(&company_id))
    }

    async fn create_use_case(&self, new: NewUseCase) -> Result<UseCase> {
        let now = Utc::now();
        let use_case = UseCase {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            expected_benefit: new.expected_benefit,
            status: UseCaseStatus::New,
            confidence_score: new.confidence_score,
            tags: Json(new.tags),
            company_id: new.company_id,
            transcript_id: Some(new.transcript_id),
            created_by_id: new.created_by_id,
            created_at: now,
            updated_at: now,
        };
        self.use_cases.lock().unwrap().push(use_case.clone());
        Ok(use_case)
    }
}

// =============================================================================
// TestDependencies builder
// =============================================================================

/// Bundle of mocks wired the same way `main` wires the real services. Keep a
/// clone around after `into_deps()` to assert on recorded calls.
#[derive(Clone)]
pub struct TestDependencies {
    pub records: Arc<InMemoryRecordStore>,
    pub ai: Arc<MockAI>,
    pub embedding_service: Arc<MockEmbeddingService>,
    pub vector_store: Arc<MockVectorStore>,
    pub stream_hub: StreamHub<ProgressEvent>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            records: Arc::new(InMemoryRecordStore::new()),
            ai: Arc::new(MockAI::new()),
            embedding_service: Arc::new(MockEmbeddingService::new()),
            vector_store: Arc::new(MockVectorStore::new()),
            stream_hub: StreamHub::new(),
        }
    }

    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    pub fn mock_vector_store(mut self, store: MockVectorStore) -> Self {
        self.vector_store = Arc::new(store);
        self
    }

    pub fn into_deps(self) -> ServerDeps {
        let knowledge = Arc::new(KnowledgeBase::new(
            self.vector_store.clone(),
            self.embedding_service.clone(),
        ));
        ServerDeps::new(
            self.records,
            self.ai,
            self.embedding_service,
            knowledge,
            self.stream_hub,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

/// A plausible persisted use case for index tests.
pub fn sample_use_case(company_id: Uuid, transcript_id: Uuid) -> UseCase {
    let now = Utc::now();
    UseCase {
        id: Uuid::new_v4(),
        title: "Automate invoice processing".to_string(),
        description: "OCR incoming invoices and route them for approval".to_string(),
        expected_benefit: Some("Saves two days per month".to_string()),
        status: UseCaseStatus::New,
        confidence_score: 0.9,
        tags: Json(vec!["automation".to_string(), "finance".to_string()]),
        company_id,
        transcript_id: Some(transcript_id),
        created_by_id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
    }
}
