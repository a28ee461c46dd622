//! Object storage for uploaded scans.
//!
//! [`ImageStore`] is the contract the analysis pipeline depends on;
//! [`cloudinary::CloudinaryStore`] implements it over Cloudinary's signed
//! upload and destroy endpoints.

pub mod cloudinary;

use async_trait::async_trait;
use bytes::Bytes;

pub use cloudinary::{CloudinaryConfig, CloudinaryStore};

/// Location of an image after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Public retrieval URL (HTTPS).
    pub url: String,
    /// Provider identifier used for deletion.
    pub public_id: String,
}

/// Errors from the storage provider.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status.
    #[error("Storage provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered 2xx with a body we could not use.
    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),
}

/// Binary object storage for images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `image` under `folder` and return its retrieval URL.
    async fn store(
        &self,
        image: Bytes,
        content_type: &str,
        folder: &str,
    ) -> Result<StoredImage, StorageError>;

    /// Delete a stored image. Returns `true` only if the provider confirms
    /// the deletion; failures are logged, never raised.
    async fn delete(&self, public_id: &str) -> bool;

    /// Recover the provider identifier from a retrieval URL produced by
    /// [`store`](Self::store), if the URL belongs to this provider.
    fn public_id_for_url(&self, url: &str) -> Option<String>;
}
