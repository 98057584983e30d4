//! Use cases domain - persisted extraction output.
//!
//! The pipeline creates use cases; everything after creation (review,
//! scoring, relations) is owned by the CRUD layer outside this crate.

pub mod models;

pub use models::{NewUseCase, UseCase, UseCaseStatus};
