//! Analysis job orchestration.
//!
//! Sequences upload -> persist -> predict -> map -> finalize for one
//! submitted scan, leaving the analysis record in a consistent terminal
//! state wherever a step fails.

pub mod error;
pub mod orchestrator;
pub mod store;

pub use error::AnalysisError;
pub use orchestrator::{AnalysisOrchestrator, AnalysisSubmission, FailureRecord};
pub use store::{AnalysisStore, PgAnalysisStore, StoreError};
