use retinoscan_cloud::CloudinaryConfig;
use retinoscan_core::analysis::DEFAULT_UPLOAD_FOLDER;
use retinoscan_inference::ModelApiConfig;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Everything except the secrets has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`). Must exceed the
    /// prediction timeout or slow predictions are cut off by the server.
    pub request_timeout_secs: u64,
    /// Upper bound on submissions running at once (default: `16`).
    pub max_concurrent_submissions: usize,
    /// Storage folder for uploaded scans (default: `retinal-scans`).
    pub upload_folder: String,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Prediction service connection.
    pub model_api: ModelApiConfig,
    /// Object storage account.
    pub cloudinary: CloudinaryConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `60`                    |
    /// | `MAX_CONCURRENT_SUBMISSIONS` | `16`                    |
    /// | `UPLOAD_FOLDER`              | `retinal-scans`         |
    ///
    /// JWT, model API and Cloudinary settings are read by their own
    /// `from_env` constructors.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_concurrent_submissions: usize = std::env::var("MAX_CONCURRENT_SUBMISSIONS")
            .unwrap_or_else(|_| "16".into())
            .parse()
            .expect("MAX_CONCURRENT_SUBMISSIONS must be a valid usize");
        assert!(
            max_concurrent_submissions > 0,
            "MAX_CONCURRENT_SUBMISSIONS must be at least 1"
        );

        let upload_folder = std::env::var("UPLOAD_FOLDER")
            .ok()
            .map(|s| s.trim().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_concurrent_submissions,
            upload_folder,
            jwt: JwtConfig::from_env(),
            model_api: ModelApiConfig::from_env(),
            cloudinary: CloudinaryConfig::from_env(),
        }
    }
}
