//! HTTP client for the prediction service.
//!
//! Wraps `GET /api/v1/health`, `POST /api/v1/predict/upload` (multipart)
//! and `POST /api/v1/predict` (base64 JSON) using [`reqwest`]. Every
//! prediction call is preceded by a health check so an unavailable service
//! fails fast without uploading the image.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use retinoscan_core::prediction::ModelOutput;

use crate::config::ModelApiConfig;
use crate::messages::{
    Base64PredictRequest, ErrorBody, HealthResponse, PredictResponse, HEALTHY_STATUS,
};
use crate::{PredictionError, PredictionRequest, Predictor};

/// Path prefix of the service's versioned API.
const API_PREFIX: &str = "/api/v1";

/// Timeout for the health probe; much shorter than a prediction.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for one prediction service instance.
#[derive(Clone)]
pub struct ModelApiClient {
    client: reqwest::Client,
    config: ModelApiConfig,
}

impl ModelApiClient {
    pub fn new(config: ModelApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.config.base_url)
    }

    /// Probe `GET /health`. Never fails; problems are logged and yield `false`.
    pub async fn check_health(&self) -> bool {
        let response = match self
            .client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, base_url = %self.config.base_url, "Model API health check failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Model API health check returned an error status");
            return false;
        }

        match response.json::<HealthResponse>().await {
            Ok(health) if health.status == HEALTHY_STATUS => true,
            Ok(health) => {
                tracing::warn!(status = %health.status, "Model API reports not healthy");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model API health response unreadable");
                false
            }
        }
    }

    /// Send an image as multipart form data to `POST /predict/upload`.
    pub async fn predict_upload(
        &self,
        request: PredictionRequest,
    ) -> Result<ModelOutput, PredictionError> {
        self.ensure_healthy().await?;

        let part = Part::stream(reqwest::Body::from(request.image))
            .file_name(request.file_name)
            .mime_str(&request.content_type)
            .map_err(|e| {
                PredictionError::InvalidRequest(format!(
                    "Invalid content type '{}': {e}",
                    request.content_type
                ))
            })?;

        let form = Form::new()
            .part("file", part)
            .text("patient_id", request.patient_id)
            .text("patient_name", request.patient_name);

        let response = self
            .client
            .post(self.url("/predict/upload"))
            .multipart(form)
            .timeout(self.config.predict_timeout)
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;

        self.parse_prediction(response).await
    }

    /// Send a base64-encoded image as JSON to `POST /predict`.
    pub async fn predict_base64(
        &self,
        image: &[u8],
        patient_id: &str,
        patient_name: &str,
    ) -> Result<ModelOutput, PredictionError> {
        self.ensure_healthy().await?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = Base64PredictRequest {
            image_base64: &encoded,
            patient_id,
            patient_name,
        };

        let response = self
            .client
            .post(self.url("/predict"))
            .json(&body)
            .timeout(self.config.predict_timeout)
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;

        self.parse_prediction(response).await
    }

    // ---- private helpers ----

    async fn ensure_healthy(&self) -> Result<(), PredictionError> {
        if self.check_health().await {
            Ok(())
        } else {
            Err(PredictionError::ServiceUnavailable(
                "Model API is not available".into(),
            ))
        }
    }

    /// Turn a completed HTTP exchange into model output or a classified error.
    async fn parse_prediction(
        &self,
        response: reqwest::Response,
    ) -> Result<ModelOutput, PredictionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_status(status, &body));
        }

        let envelope = response.json::<PredictResponse>().await.map_err(|e| {
            if e.is_timeout() {
                self.classify_transport(&e)
            } else {
                PredictionError::PredictionFailed(format!("Invalid response from Model API: {e}"))
            }
        })?;

        envelope.into_output()
    }

    /// Classify a transport-level failure (no HTTP status available).
    fn classify_transport(&self, err: &reqwest::Error) -> PredictionError {
        if err.is_connect() {
            PredictionError::ServiceUnavailable(
                "Cannot connect to Model API. Please ensure the model server is running.".into(),
            )
        } else if err.is_timeout() {
            PredictionError::PredictionFailed(format!(
                "Model API did not respond within {}s",
                self.config.predict_timeout.as_secs_f64()
            ))
        } else {
            PredictionError::PredictionFailed(format!("Model API error: {err}"))
        }
    }
}

/// Classify a non-success HTTP status from the prediction endpoints.
///
/// - 400 / 422: the request was malformed
/// - 503: the model is not loaded yet
/// - anything else: an upstream failure, message preserved
pub fn classify_status(status: StatusCode, body: &str) -> PredictionError {
    let detail = ErrorBody::extract(body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            PredictionError::InvalidRequest(format!(
                "Invalid request to Model API: {}",
                detail.as_deref().unwrap_or("Bad request")
            ))
        }
        StatusCode::SERVICE_UNAVAILABLE => PredictionError::ServiceUnavailable(
            "Model is not loaded. Please wait for the server to initialize.".into(),
        ),
        other => PredictionError::PredictionFailed(format!(
            "Model API error ({}): {}",
            other.as_u16(),
            detail.unwrap_or_else(|| body.to_string())
        )),
    }
}

#[async_trait]
impl Predictor for ModelApiClient {
    async fn check_health(&self) -> bool {
        ModelApiClient::check_health(self).await
    }

    async fn predict(&self, request: PredictionRequest) -> Result<ModelOutput, PredictionError> {
        self.predict_upload(request).await
    }
}
