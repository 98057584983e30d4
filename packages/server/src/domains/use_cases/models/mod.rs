mod use_case;

pub use use_case::{NewUseCase, UseCase, UseCaseStatus};
