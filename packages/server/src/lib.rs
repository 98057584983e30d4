// Workshop Use-Case Miner - API Core
//
// This crate turns long-form workshop transcripts into structured use-case
// records via a chunk -> map -> reduce LLM pipeline, and keeps transcripts
// and use cases searchable through a hybrid (dense + sparse) Qdrant index.
//
// CRUD handlers, auth and pagination live outside this crate; the pipeline
// talks to them through the record store and dispatcher seams in kernel/.

pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
