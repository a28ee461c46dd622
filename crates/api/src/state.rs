use std::sync::Arc;

use retinoscan_pipeline::AnalysisOrchestrator;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: retinoscan_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs submissions and owner-scoped queries.
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Bounds the number of submissions running concurrently.
    pub submissions: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        pool: retinoscan_db::DbPool,
        config: ServerConfig,
        orchestrator: AnalysisOrchestrator,
    ) -> Self {
        let submissions = Arc::new(Semaphore::new(config.max_concurrent_submissions));
        Self {
            pool,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            submissions,
        }
    }
}
