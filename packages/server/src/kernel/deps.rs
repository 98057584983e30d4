//! Server dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by the
//! pipeline and the API surface. All external services use trait
//! abstractions to enable testing; clients are constructed once at process
//! start and passed by reference — no global singletons.

use std::sync::Arc;

use crate::domains::knowledge::KnowledgeBase;
use crate::domains::transcripts::{BaseRecordStore, ProgressEvent};
use crate::kernel::{stream_hub::StreamHub, BaseAI, BaseEmbeddingService};

/// Server dependencies accessible to the pipeline and handlers.
#[derive(Clone)]
pub struct ServerDeps {
    /// Authoritative entity storage for transcripts and use cases. The pool
    /// lives inside the Postgres implementation; the pipeline only sees this
    /// seam.
    pub records: Arc<dyn BaseRecordStore>,
    /// AI client for the map/reduce extraction calls.
    pub ai: Arc<dyn BaseAI>,
    pub embedding_service: Arc<dyn BaseEmbeddingService>,
    /// Hybrid dense/sparse search index. Best-effort: write failures are
    /// logged, never escalated to the record store's transaction.
    pub knowledge: Arc<KnowledgeBase>,
    /// In-process pub/sub hub for real-time progress streaming to SSE endpoints.
    pub stream_hub: StreamHub<ProgressEvent>,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        records: Arc<dyn BaseRecordStore>,
        ai: Arc<dyn BaseAI>,
        embedding_service: Arc<dyn BaseEmbeddingService>,
        knowledge: Arc<KnowledgeBase>,
        stream_hub: StreamHub<ProgressEvent>,
    ) -> Self {
        Self {
            records,
            ai,
            embedding_service,
            knowledge,
            stream_hub,
        }
    }
}
