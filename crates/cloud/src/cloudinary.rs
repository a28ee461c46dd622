//! Cloudinary implementation of [`ImageStore`].
//!
//! Uses the signed REST upload API (`POST /v1_1/{cloud}/image/upload`) and
//! destroy API (`POST /v1_1/{cloud}/image/destroy`). Requests are signed
//! with SHA-256 over the alphabetically sorted parameters followed by the
//! API secret.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{ImageStore, StorageError, StoredImage};

/// Default Cloudinary API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// Configuration for a Cloudinary account.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API endpoint; overridable for testing.
    pub api_base: String,
}

impl CloudinaryConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default                      |
    /// |--------------------------|----------|------------------------------|
    /// | `CLOUDINARY_CLOUD_NAME`  | **yes**  | --                           |
    /// | `CLOUDINARY_API_KEY`     | **yes**  | --                           |
    /// | `CLOUDINARY_API_SECRET`  | **yes**  | --                           |
    /// | `CLOUDINARY_API_BASE`    | no       | `https://api.cloudinary.com` |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or empty.
    pub fn from_env() -> Self {
        Self {
            cloud_name: required_env("CLOUDINARY_CLOUD_NAME"),
            api_key: required_env("CLOUDINARY_API_KEY"),
            api_secret: required_env("CLOUDINARY_API_SECRET"),
            api_base: std::env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

fn required_env(name: &str) -> String {
    let value = std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    assert!(!value.is_empty(), "{name} must not be empty");
    value
}

/// Successful upload response (subset).
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

/// Destroy response: `{"result": "ok"}` or `{"result": "not found"}`.
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary error envelope: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Cloudinary-backed image store.
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{action}",
            self.config.api_base, self.config.cloud_name
        )
    }

    /// Ensure a 2xx status, turning anything else into [`StorageError::Api`]
    /// with the provider's message when it sent one.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        Ok(body.result == "ok")
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn store(
        &self,
        image: Bytes,
        content_type: &str,
        folder: &str,
    ) -> Result<StoredImage, StorageError> {
        let public_id = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("folder", folder),
                ("public_id", &public_id),
                ("timestamp", &timestamp),
            ],
            &self.config.api_secret,
        );

        let file = Part::stream(reqwest::Body::from(image))
            .file_name(format!("{public_id}.{}", extension_for(content_type)))
            .mime_str(content_type)?;

        let form = Form::new()
            .part("file", file)
            .text("folder", folder.to_string())
            .text("public_id", public_id)
            .text("timestamp", timestamp)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if uploaded.secure_url.is_empty() {
            return Err(StorageError::InvalidResponse(
                "upload response has an empty secure_url".into(),
            ));
        }

        tracing::debug!(public_id = %uploaded.public_id, "Image uploaded to Cloudinary");

        Ok(StoredImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> bool {
        match self.destroy(public_id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(public_id, "Cloudinary did not confirm image deletion");
                false
            }
            Err(e) => {
                tracing::warn!(public_id, error = %e, "Failed to delete image from Cloudinary");
                false
            }
        }
    }

    fn public_id_for_url(&self, url: &str) -> Option<String> {
        public_id_from_url(url)
    }
}

/// Sign request parameters: sort by key, join as `k=v` with `&`, append
/// the secret, hex-encode the SHA-256 digest.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the public id from a Cloudinary delivery URL.
///
/// `https://res.cloudinary.com/<cloud>/image/upload/v1712/retinal-scans/abc.jpg`
/// yields `retinal-scans/abc`. Returns `None` for URLs without an
/// `/upload/` segment.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let (_, rest) = path.split_once("/upload/")?;

    let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(first) = segments.first() {
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());
        if is_version {
            segments.remove(0);
        }
    }

    let last = segments.pop()?;
    let stem = match last.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => last,
    };
    segments.push(stem);
    Some(segments.join("/"))
}

/// File extension matching an image content type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "jpg",
    }
}
