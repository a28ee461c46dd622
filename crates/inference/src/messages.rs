//! Wire types for the prediction service's JSON API.

use retinoscan_core::prediction::{ModelOutput, ModelPrediction, PredictionMetadata};
use serde::{Deserialize, Serialize};

use crate::PredictionError;

/// Status value the service reports when it is ready to serve.
pub const HEALTHY_STATUS: &str = "healthy";

/// Envelope status value of a successful prediction.
pub const SUCCESS_STATUS: &str = "success";

/// Body of `GET /api/v1/health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// JSON body of `POST /api/v1/predict`.
#[derive(Debug, Serialize)]
pub struct Base64PredictRequest<'a> {
    pub image_base64: &'a str,
    pub patient_id: &'a str,
    pub patient_name: &'a str,
}

/// Envelope returned by both prediction endpoints.
///
/// Only `status` is guaranteed; the result fields are present when
/// `status == "success"`.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub predictions: Vec<ModelPrediction>,
    #[serde(default)]
    pub primary_diagnosis: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metadata: Option<PredictionMetadata>,
}

impl PredictResponse {
    /// Convert a parsed envelope into model output.
    ///
    /// A non-`success` status is a logical failure even on HTTP 200.
    /// Missing summary fields fall back to the highest-confidence entry.
    pub fn into_output(self) -> Result<ModelOutput, PredictionError> {
        if self.status != SUCCESS_STATUS {
            return Err(PredictionError::PredictionFailed(format!(
                "Model API prediction failed: {}",
                self.message.as_deref().unwrap_or("Unknown error")
            )));
        }

        let top = self
            .predictions
            .iter()
            .filter(|p| !p.confidence.is_nan())
            .fold(None::<&ModelPrediction>, |best, p| match best {
                Some(b) if p.confidence <= b.confidence => Some(b),
                _ => Some(p),
            });

        let primary_diagnosis = self
            .primary_diagnosis
            .or_else(|| top.map(|p| p.condition.clone()))
            .unwrap_or_else(|| "Unknown".to_string());
        let confidence_score = self
            .confidence_score
            .or_else(|| top.map(|p| p.confidence))
            .unwrap_or(0.0);

        Ok(ModelOutput {
            predictions: self.predictions,
            primary_diagnosis,
            confidence_score,
            processing_time: self.processing_time.unwrap_or(0.0),
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

/// Error body shape used by the service (FastAPI style `detail`, or `message`).
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message from an error response body.
    pub fn extract(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => parsed.message,
        }
    }
}
