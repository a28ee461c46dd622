//! Analysis entity model and DTOs.

use retinoscan_core::analysis::{Gender, PatientInfo};
use retinoscan_core::prediction::PredictionOutcome;
use retinoscan_core::types::{DbId, OwnerId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{AnalysisStatus, StatusId};

/// A row from the `analyses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Analysis {
    pub id: DbId,
    pub owner_id: OwnerId,
    pub patient_id: Option<String>,
    pub original_image_url: String,
    pub analyzed_image_url: Option<String>,
    pub status_id: StatusId,
    pub patient_name: String,
    pub patient_age: Option<i32>,
    pub patient_gender: Option<String>,
    pub patient_notes: Option<String>,
    pub actual_stage: Option<String>,
    pub prediction: Option<Json<PredictionOutcome>>,
    pub error_message: Option<String>,
    pub upload_date: Timestamp,
    pub analysis_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Analysis {
    /// Decoded lifecycle status. Unknown ids cannot occur while the
    /// foreign key to `analysis_statuses` holds; they decode as Pending.
    pub fn status(&self) -> AnalysisStatus {
        AnalysisStatus::from_id(self.status_id).unwrap_or(AnalysisStatus::Pending)
    }

    /// Patient details reassembled from their columns.
    pub fn patient_info(&self) -> PatientInfo {
        PatientInfo {
            name: self.patient_name.clone(),
            age: self.patient_age,
            gender: self
                .patient_gender
                .as_deref()
                .and_then(|g| Gender::from_name(g).ok()),
            notes: self.patient_notes.clone(),
        }
    }

    /// Every stored image URL belonging to this analysis.
    pub fn image_urls(&self) -> Vec<&str> {
        std::iter::once(self.original_image_url.as_str())
            .chain(self.analyzed_image_url.as_deref())
            .collect()
    }
}

/// DTO for inserting a new analysis row.
#[derive(Debug, Clone)]
pub struct CreateAnalysis {
    pub owner_id: OwnerId,
    pub patient_id: Option<String>,
    pub original_image_url: String,
    pub patient: PatientInfo,
    pub actual_stage: Option<String>,
    pub status: AnalysisStatus,
}

/// The only writes that move an analysis into a terminal state.
///
/// Each variant carries every field its state requires, so a completed
/// row always has a prediction and a failed row always has a message.
#[derive(Debug, Clone)]
pub enum TerminalUpdate {
    Completed {
        prediction: PredictionOutcome,
        analyzed_image_url: Option<String>,
        analysis_date: Timestamp,
    },
    Failed {
        error_message: String,
        analysis_date: Timestamp,
    },
}

impl TerminalUpdate {
    /// Status this update moves the analysis into.
    pub fn status(&self) -> AnalysisStatus {
        match self {
            Self::Completed { .. } => AnalysisStatus::Completed,
            Self::Failed { .. } => AnalysisStatus::Failed,
        }
    }
}

/// Public representation of an analysis returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub id: DbId,
    pub owner_id: OwnerId,
    pub patient_id: Option<String>,
    pub original_image_url: String,
    pub analyzed_image_url: Option<String>,
    pub status: &'static str,
    pub patient_info: PatientInfo,
    pub actual_stage: Option<String>,
    pub prediction: Option<PredictionOutcome>,
    pub upload_date: Timestamp,
    pub analysis_date: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        let status = analysis.status().name();
        let patient_info = analysis.patient_info();
        Self {
            id: analysis.id,
            owner_id: analysis.owner_id,
            patient_id: analysis.patient_id,
            original_image_url: analysis.original_image_url,
            analyzed_image_url: analysis.analyzed_image_url,
            status,
            patient_info,
            actual_stage: analysis.actual_stage,
            prediction: analysis.prediction.map(|Json(p)| p),
            upload_date: analysis.upload_date,
            analysis_date: analysis.analysis_date,
            error_message: analysis.error_message,
        }
    }
}
