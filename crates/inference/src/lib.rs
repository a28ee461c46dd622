//! Client library for the external retinal-scan prediction service.
//!
//! Provides the [`Predictor`] trait consumed by the analysis pipeline, an
//! HTTP implementation ([`client::ModelApiClient`]) with health checks,
//! multipart and base64 prediction calls, and classification of upstream
//! failures into [`PredictionError`] kinds.

pub mod client;
pub mod config;
pub mod messages;

use async_trait::async_trait;
use bytes::Bytes;
use retinoscan_core::prediction::ModelOutput;

pub use client::ModelApiClient;
pub use config::ModelApiConfig;

/// Image plus identifying fields sent with a prediction request.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub image: Bytes,
    pub content_type: String,
    pub file_name: String,
    /// Caller-supplied identifier echoed back by the model service.
    pub patient_id: String,
    pub patient_name: String,
}

/// Classified prediction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictionError {
    /// The service is unreachable, unhealthy, or its model is not loaded yet.
    #[error("Prediction service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service rejected the request as malformed.
    #[error("Invalid prediction request: {0}")]
    InvalidRequest(String),

    /// The service ran but reported a failure, or failed in an unclassified way.
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
}

/// A prediction backend.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// `true` only when the service answers and reports itself healthy.
    /// Never fails: connectivity and protocol problems yield `false`.
    async fn check_health(&self) -> bool;

    /// Run the model on one image.
    async fn predict(&self, request: PredictionRequest) -> Result<ModelOutput, PredictionError>;
}
