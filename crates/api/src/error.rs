use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use retinoscan_core::error::CoreError;
use retinoscan_pipeline::AnalysisError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`AnalysisError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `retinoscan_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure reported by the analysis orchestrator.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            // --- Orchestrator errors ---
            AppError::Analysis(err) => classify_analysis_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map each orchestrator failure kind to its own status and code.
///
/// Upstream messages are kept for prediction and upload failures; store
/// failures are logged and sanitized.
fn classify_analysis_error(err: &AnalysisError) -> (StatusCode, &'static str, String) {
    match err {
        AnalysisError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
        AnalysisError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, "UPLOAD_FAILED", err.to_string()),
        AnalysisError::ServiceUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            err.to_string(),
        ),
        AnalysisError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.to_string())
        }
        AnalysisError::PredictionFailed(_) => {
            (StatusCode::BAD_GATEWAY, "PREDICTION_FAILED", err.to_string())
        }
        AnalysisError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", err.to_string()),
        AnalysisError::NotFound { id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Analysis with id {id} not found"),
        ),
        AnalysisError::Store(store) => {
            tracing::error!(error = %store, "Analysis store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
