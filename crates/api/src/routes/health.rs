use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency is reachable, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Whether the prediction service reports itself healthy.
    pub model_api_healthy: bool,
}

/// GET /health -- returns service, database and prediction service health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db, model_api_healthy) = tokio::join!(
        retinoscan_db::health_check(&state.pool),
        state.orchestrator.check_prediction_service(),
    );
    if let Err(e) = &db {
        tracing::warn!(error = %e, "Database health check failed");
    }
    let db_healthy = db.is_ok();

    let status = if db_healthy && model_api_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        model_api_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
