//! Repository for the `analyses` table.
//!
//! Reads and deletes are scoped to the owner: a row owned by someone else
//! is indistinguishable from a missing row. Terminal writes only apply to
//! rows that are still pending or processing.

use retinoscan_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::analysis::{Analysis, CreateAnalysis, TerminalUpdate};
use crate::models::status::AnalysisStatus;

/// Column list for `analyses` queries.
const COLUMNS: &str = "\
    id, owner_id, patient_id, original_image_url, analyzed_image_url, status_id, \
    patient_name, patient_age, patient_gender, patient_notes, actual_stage, \
    prediction, error_message, upload_date, analysis_date, created_at, updated_at";

/// Provides CRUD operations for analyses.
pub struct AnalysisRepo;

impl AnalysisRepo {
    /// Insert a new analysis. `upload_date` is assigned by the database.
    pub async fn create(pool: &PgPool, input: &CreateAnalysis) -> Result<Analysis, sqlx::Error> {
        let query = format!(
            "INSERT INTO analyses \
                 (owner_id, patient_id, original_image_url, status_id, \
                  patient_name, patient_age, patient_gender, patient_notes, actual_stage) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Analysis>(&query)
            .bind(&input.owner_id)
            .bind(&input.patient_id)
            .bind(&input.original_image_url)
            .bind(input.status.id())
            .bind(input.patient.name.trim())
            .bind(input.patient.age)
            .bind(input.patient.gender.map(|g| g.name()))
            .bind(&input.patient.notes)
            .bind(&input.actual_stage)
            .fetch_one(pool)
            .await
    }

    /// Find an analysis by id, only if it belongs to `owner_id`.
    pub async fn find_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: &str,
    ) -> Result<Option<Analysis>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analyses WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Analysis>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List every analysis owned by `owner_id`, newest upload first.
    ///
    /// Ties on `upload_date` are broken by descending id so repeated calls
    /// return the same order.
    pub async fn list_by_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<Analysis>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analyses \
             WHERE owner_id = $1 \
             ORDER BY upload_date DESC, id DESC"
        );
        sqlx::query_as::<_, Analysis>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Move an analysis into a terminal state in a single statement.
    ///
    /// Returns `None` if the row does not exist or is already terminal.
    /// `analysis_date` is clamped so it is never earlier than `upload_date`.
    pub async fn finalize(
        pool: &PgPool,
        id: DbId,
        update: &TerminalUpdate,
    ) -> Result<Option<Analysis>, sqlx::Error> {
        match update {
            TerminalUpdate::Completed {
                prediction,
                analyzed_image_url,
                analysis_date,
            } => {
                let query = format!(
                    "UPDATE analyses \
                     SET status_id = $2, prediction = $3, \
                         analyzed_image_url = COALESCE($4, analyzed_image_url), \
                         error_message = NULL, \
                         analysis_date = GREATEST($5, upload_date) \
                     WHERE id = $1 AND status_id IN ($6, $7) \
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, Analysis>(&query)
                    .bind(id)
                    .bind(AnalysisStatus::Completed.id())
                    .bind(Json(prediction))
                    .bind(analyzed_image_url)
                    .bind(analysis_date)
                    .bind(AnalysisStatus::Pending.id())
                    .bind(AnalysisStatus::Processing.id())
                    .fetch_optional(pool)
                    .await
            }
            TerminalUpdate::Failed {
                error_message,
                analysis_date,
            } => {
                let query = format!(
                    "UPDATE analyses \
                     SET status_id = $2, error_message = $3, prediction = NULL, \
                         analysis_date = GREATEST($4, upload_date) \
                     WHERE id = $1 AND status_id IN ($5, $6) \
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, Analysis>(&query)
                    .bind(id)
                    .bind(AnalysisStatus::Failed.id())
                    .bind(error_message)
                    .bind(analysis_date)
                    .bind(AnalysisStatus::Pending.id())
                    .bind(AnalysisStatus::Processing.id())
                    .fetch_optional(pool)
                    .await
            }
        }
    }

    /// Delete an analysis owned by `owner_id`, returning the deleted row.
    pub async fn delete_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: &str,
    ) -> Result<Option<Analysis>, sqlx::Error> {
        let query = format!(
            "DELETE FROM analyses WHERE id = $1 AND owner_id = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Analysis>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }
}
