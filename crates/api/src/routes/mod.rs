pub mod analysis;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /analysis/upload        submit a scan (POST, multipart)
/// /analysis               list caller's analyses (GET)
/// /analysis/{id}          get, delete
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/analysis", analysis::router())
}
