//! Handlers for the `/analysis` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. An analysis is
//! only visible to the caller that submitted it; anything else is reported
//! as not found.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use retinoscan_core::analysis::{parse_patient_age, Gender, PatientInfo};
use retinoscan_core::types::DbId;
use retinoscan_db::models::analysis::AnalysisResponse;
use retinoscan_pipeline::AnalysisSubmission;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the scan.
const IMAGE_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/analysis/upload
///
/// Multipart fields: `image` (file, required), `patientName` (required),
/// `patientAge`, `patientGender`, `patientNotes`, `patientId`, `actualStage`.
///
/// Runs the whole pipeline before answering. Returns 201 with the completed
/// analysis; prediction failures are returned as errors after the analysis
/// has been recorded as failed.
pub async fn upload_analysis(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let submission = read_submission(multipart).await?;

    let permit = Arc::clone(&state.submissions)
        .acquire_owned()
        .await
        .map_err(|_| AppError::InternalError("Submission limiter is closed".into()))?;

    // Dropping this handler (client gone, request timeout) cancels the
    // submission; the spawned task still records the failure.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let orchestrator = Arc::clone(&state.orchestrator);
    let owner_id = auth.user_id.clone();
    let task = tokio::spawn(async move {
        let _permit = permit;
        orchestrator.submit(&owner_id, submission, &cancel).await
    });

    let analysis = task
        .await
        .map_err(|e| AppError::InternalError(format!("Submission task failed: {e}")))??;

    tracing::info!(
        analysis_id = analysis.id,
        user_id = %auth.user_id,
        status = analysis.status().name(),
        "Analysis submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: AnalysisResponse::from(analysis),
        }),
    ))
}

/// Collect the multipart form into a submission. Missing or malformed
/// image data is left for the orchestrator to reject.
async fn read_submission(mut multipart: Multipart) -> AppResult<AnalysisSubmission> {
    let mut image = Bytes::new();
    let mut content_type: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut patient = PatientInfo {
        name: String::new(),
        age: None,
        gender: None,
        notes: None,
    };
    let mut patient_id: Option<String> = None;
    let mut actual_stage: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == IMAGE_FIELD {
            content_type = field.content_type().map(str::to_string);
            file_name = field.file_name().map(str::to_string);
            image = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match name.as_str() {
            "patientName" => patient.name = value,
            "patientAge" => patient.age = parse_patient_age(&value)?,
            "patientGender" => {
                patient.gender = non_blank(value)
                    .map(|g| Gender::from_name(&g))
                    .transpose()?;
            }
            "patientNotes" => patient.notes = non_blank(value),
            "patientId" => patient_id = non_blank(value),
            "actualStage" => actual_stage = non_blank(value),
            _ => {} // ignore unknown fields
        }
    }

    Ok(AnalysisSubmission {
        image,
        content_type,
        file_name,
        patient,
        patient_id,
        actual_stage,
    })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/analysis
///
/// The caller's analyses, newest upload first.
pub async fn list_analyses(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<AnalysisResponse>>>> {
    let analyses = state.orchestrator.list(&auth.user_id).await?;
    Ok(Json(DataResponse {
        data: analyses.into_iter().map(AnalysisResponse::from).collect(),
    }))
}

/// GET /api/v1/analysis/{id}
pub async fn get_analysis(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AnalysisResponse>>> {
    let analysis = state.orchestrator.get_one(id, &auth.user_id).await?;
    Ok(Json(DataResponse {
        data: analysis.into(),
    }))
}

/// DELETE /api/v1/analysis/{id}
///
/// Removes the record, then makes a best-effort attempt to remove its
/// images from storage. Returns 204.
pub async fn delete_analysis(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.orchestrator.delete(id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
