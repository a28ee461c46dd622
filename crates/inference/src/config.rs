use std::time::Duration;

/// Default base URL of the prediction service.
pub const DEFAULT_MODEL_API_URL: &str = "http://localhost:8001";

/// Default timeout for a single prediction call.
pub const DEFAULT_PREDICT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the prediction service.
#[derive(Debug, Clone)]
pub struct ModelApiConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:8001`.
    pub base_url: String,
    /// Timeout applied to each prediction request.
    pub predict_timeout: Duration,
}

impl ModelApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            predict_timeout: Duration::from_secs(DEFAULT_PREDICT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `MODEL_API_URL`          | `http://localhost:8001` |
    /// | `MODEL_API_TIMEOUT_SECS` | `30`                    |
    ///
    /// # Panics
    ///
    /// Panics if `MODEL_API_TIMEOUT_SECS` is not a valid u64.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MODEL_API_URL").unwrap_or_else(|_| DEFAULT_MODEL_API_URL.into());

        let timeout_secs: u64 = std::env::var("MODEL_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_PREDICT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("MODEL_API_TIMEOUT_SECS must be a valid u64");

        Self {
            predict_timeout: Duration::from_secs(timeout_secs),
            ..Self::new(base_url)
        }
    }
}
