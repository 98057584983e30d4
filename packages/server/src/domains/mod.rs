// Business domains
pub mod knowledge;
pub mod transcripts;
pub mod use_cases;
