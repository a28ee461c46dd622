#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use retinoscan_api::auth::jwt::{Claims, JwtConfig};
use retinoscan_api::config::ServerConfig;
use retinoscan_api::router::build_app_router;
use retinoscan_api::state::AppState;
use retinoscan_cloud::{CloudinaryConfig, ImageStore, StorageError, StoredImage};
use retinoscan_core::prediction::{ModelOutput, ModelPrediction, PredictionMetadata};
use retinoscan_inference::{ModelApiConfig, PredictionError, PredictionRequest, Predictor};
use retinoscan_pipeline::{AnalysisOrchestrator, PgAnalysisStore};
use sqlx::PgPool;
use tokio::sync::Notify;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_concurrent_submissions: 4,
        upload_folder: "retinal-scans".to_string(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        model_api: ModelApiConfig::new("http://127.0.0.1:9"),
        cloudinary: CloudinaryConfig {
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Collaborator fakes
// ---------------------------------------------------------------------------

/// In-memory object storage producing Cloudinary-shaped URLs.
#[derive(Default)]
pub struct FakeImages {
    counter: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageStore for FakeImages {
    async fn store(
        &self,
        _image: bytes::Bytes,
        _content_type: &str,
        folder: &str,
    ) -> Result<StoredImage, StorageError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StoredImage {
            url: format!("https://res.cloudinary.com/test/image/upload/v1/{folder}/scan{n}.jpg"),
            public_id: format!("{folder}/scan{n}"),
        })
    }

    async fn delete(&self, public_id: &str) -> bool {
        self.deleted.lock().unwrap().push(public_id.to_string());
        true
    }

    fn public_id_for_url(&self, url: &str) -> Option<String> {
        retinoscan_cloud::cloudinary::public_id_from_url(url)
    }
}

/// Prediction service double. Answers with `predictions`, with
/// `ServiceUnavailable` while `reachable` is false, or never when `hangs`.
pub struct FakePredictor {
    pub reachable: AtomicBool,
    pub predictions: Vec<ModelPrediction>,
    pub hangs: bool,
    /// Notified each time a prediction call starts.
    pub started: Notify,
}

impl FakePredictor {
    pub fn returning(predictions: Vec<ModelPrediction>) -> Self {
        Self {
            reachable: AtomicBool::new(true),
            predictions,
            hangs: false,
            started: Notify::new(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: AtomicBool::new(false),
            ..Self::returning(Vec::new())
        }
    }

    pub fn hanging() -> Self {
        Self {
            hangs: true,
            ..Self::returning(Vec::new())
        }
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn check_health(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn predict(&self, _request: PredictionRequest) -> Result<ModelOutput, PredictionError> {
        if !self.check_health().await {
            return Err(PredictionError::ServiceUnavailable(
                "Cannot connect to Model API. Please ensure the model server is running.".into(),
            ));
        }
        self.started.notify_one();
        if self.hangs {
            std::future::pending::<()>().await;
        }
        let top = self.predictions.first().cloned();
        Ok(ModelOutput {
            predictions: self.predictions.clone(),
            primary_diagnosis: top.as_ref().map(|p| p.condition.clone()).unwrap_or_default(),
            confidence_score: top.map(|p| p.confidence).unwrap_or(0.0),
            processing_time: 0.25,
            metadata: PredictionMetadata {
                model_version: "2.1.0".into(),
                model_architecture: "EfficientNet-B3".into(),
                preprocessing: "ben_graham".into(),
                image_size: vec![512, 512],
                file_name: None,
                file_size: None,
            },
        })
    }
}

pub fn prediction(condition: &str, confidence: f64) -> ModelPrediction {
    ModelPrediction {
        condition: condition.to_string(),
        confidence,
        probability: confidence,
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Full router over a real database with a predictor that reports
/// moderate retinopathy.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(
        pool,
        Arc::new(FakePredictor::returning(vec![
            prediction("No DR", 0.1),
            prediction("Moderate Diabetic Retinopathy", 0.81),
        ])),
        Arc::new(FakeImages::default()),
    )
}

/// Full router with the given collaborators. Mirrors `main.rs` through
/// [`build_app_router`], so tests exercise the production middleware stack.
pub fn build_test_app_with(
    pool: PgPool,
    predictor: Arc<FakePredictor>,
    images: Arc<FakeImages>,
) -> Router {
    let config = test_config();
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(PgAnalysisStore::new(pool.clone())),
        images,
        predictor,
    )
    .with_upload_folder(config.upload_folder.clone());

    let state = AppState::new(pool, config.clone(), orchestrator);
    build_app_router(state, &config)
}

/// Bearer token for `owner_id` signed with the test secret, as the identity
/// provider would issue it.
pub fn token_for(owner_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: owner_id.to_string(),
        exp: now + 15 * 60,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    tokio::time::timeout(Duration::from_secs(30), app.oneshot(request))
        .await
        .expect("request timed out")
        .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    form: MultipartForm,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", form.content_type());
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(form.finish())).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Minimal `multipart/form-data` body builder.
pub struct MultipartForm {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "retinoscan-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

/// A 2 MiB JPEG-typed upload with the given patient name.
pub fn scan_form(patient_name: &str) -> MultipartForm {
    MultipartForm::new()
        .file("image", "fundus.jpg", "image/jpeg", &vec![0xFF; 2 * 1024 * 1024])
        .text("patientName", patient_name)
}
