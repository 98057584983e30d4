//! Transcripts domain - ingestion pipeline from raw text to use cases.

pub mod chunker;
pub mod extraction;
pub mod models;
pub mod pipeline;
pub mod store;

pub use chunker::chunk_transcript;
pub use extraction::{extract_use_cases, reduce_use_cases, CandidateUseCase};
pub use models::{Transcript, TranscriptStatus};
pub use pipeline::{process_transcript, progress_topic, ProgressEvent};
pub use store::{BaseRecordStore, PostgresRecordStore};
