//! Record store contract consumed by the orchestrator.
//!
//! [`AnalysisStore`] is the seam between the orchestration logic and the
//! durable store. [`PgAnalysisStore`] backs it with the `analyses` table;
//! tests substitute an in-memory implementation.

use async_trait::async_trait;
use retinoscan_core::types::DbId;
use retinoscan_db::models::analysis::{Analysis, CreateAnalysis, TerminalUpdate};
use retinoscan_db::repositories::AnalysisRepo;
use retinoscan_db::DbPool;

/// The record store failed to perform an operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Analysis store error: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// Durable storage for analysis records.
///
/// Every operation except `create` is scoped to an owner, apart from
/// `update` which the orchestrator only calls on records it just created.
/// `None` means "absent or not owned by this caller".
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn create(&self, input: CreateAnalysis) -> Result<Analysis, StoreError>;

    async fn get(&self, id: DbId, owner_id: &str) -> Result<Option<Analysis>, StoreError>;

    /// Newest upload first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Analysis>, StoreError>;

    /// Apply a terminal update atomically. `None` if the record is gone or
    /// already terminal.
    async fn update(&self, id: DbId, update: TerminalUpdate)
        -> Result<Option<Analysis>, StoreError>;

    /// Delete and return the removed record.
    async fn delete(&self, id: DbId, owner_id: &str) -> Result<Option<Analysis>, StoreError>;
}

/// PostgreSQL-backed [`AnalysisStore`].
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: DbPool,
}

impl PgAnalysisStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn create(&self, input: CreateAnalysis) -> Result<Analysis, StoreError> {
        Ok(AnalysisRepo::create(&self.pool, &input).await?)
    }

    async fn get(&self, id: DbId, owner_id: &str) -> Result<Option<Analysis>, StoreError> {
        Ok(AnalysisRepo::find_for_owner(&self.pool, id, owner_id).await?)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Analysis>, StoreError> {
        Ok(AnalysisRepo::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn update(
        &self,
        id: DbId,
        update: TerminalUpdate,
    ) -> Result<Option<Analysis>, StoreError> {
        Ok(AnalysisRepo::finalize(&self.pool, id, &update).await?)
    }

    async fn delete(&self, id: DbId, owner_id: &str) -> Result<Option<Analysis>, StoreError> {
        Ok(AnalysisRepo::delete_for_owner(&self.pool, id, owner_id).await?)
    }
}
