//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod dispatcher;
pub mod qdrant;
pub mod sse;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use ai::{OpenAIClient, EMBEDDING_DIM};
pub use deps::ServerDeps;
pub use dispatcher::TokioJobDispatcher;
pub use qdrant::{QdrantHttpClient, DENSE_VECTOR_NAME, SPARSE_VECTOR_NAME};
pub use stream_hub::StreamHub;
pub use test_dependencies::TestDependencies;
pub use traits::*;
