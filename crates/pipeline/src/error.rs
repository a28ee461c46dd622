use retinoscan_core::error::CoreError;
use retinoscan_core::types::DbId;
use retinoscan_inference::PredictionError;

use crate::store::StoreError;

/// Failure kinds surfaced by the orchestrator.
///
/// `InvalidInput` and `UploadFailed` happen before any record exists.
/// The three prediction kinds and `Cancelled` are recorded on the analysis
/// as `failed` before being returned.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Missing, oversized or non-image file, or invalid patient fields.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Object storage rejected or failed the upload.
    #[error("Image upload failed: {0}")]
    UploadFailed(String),

    #[error("Prediction service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Prediction service rejected the request: {0}")]
    InvalidRequest(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    /// The caller's cancellation token fired.
    #[error("Analysis cancelled by the caller")]
    Cancelled,

    /// Absent, or owned by someone else.
    #[error("Analysis {id} not found")]
    NotFound { id: DbId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PredictionError> for AnalysisError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::ServiceUnavailable(msg) => Self::ServiceUnavailable(msg),
            PredictionError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            PredictionError::PredictionFailed(msg) => Self::PredictionFailed(msg),
        }
    }
}

impl From<CoreError> for AnalysisError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::InvalidInput(msg),
            other => Self::Store(StoreError(other.to_string())),
        }
    }
}
