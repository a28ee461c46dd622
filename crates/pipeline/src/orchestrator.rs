//! The analysis state machine.
//!
//! A submission moves `processing -> completed | failed`. The record is
//! only created once the image is safely stored, and every failure after
//! that point is written back to the record before it is returned, so a
//! caller never observes an analysis stuck in `processing`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use retinoscan_cloud::{ImageStore, StoredImage};
use retinoscan_core::analysis::{validate_image_upload, PatientInfo, DEFAULT_UPLOAD_FOLDER};
use retinoscan_core::prediction::PredictionOutcome;
use retinoscan_core::severity::map_severity;
use retinoscan_core::types::DbId;
use retinoscan_db::models::analysis::{Analysis, CreateAnalysis, TerminalUpdate};
use retinoscan_db::models::status::AnalysisStatus;
use retinoscan_inference::{PredictionRequest, Predictor};
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::store::{AnalysisStore, StoreError};

/// File name sent to the prediction service when the upload had none.
const DEFAULT_FILE_NAME: &str = "scan.jpg";

/// One uploaded scan plus the form fields that accompanied it.
#[derive(Debug, Clone)]
pub struct AnalysisSubmission {
    pub image: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub patient: PatientInfo,
    /// Caller-supplied patient identifier, stored and forwarded as-is.
    pub patient_id: Option<String>,
    /// Clinician-reported stage, kept for later comparison with the model.
    pub actual_stage: Option<String>,
}

/// Result of writing a failure back to an analysis record.
///
/// Returned by [`AnalysisOrchestrator::record_failure`], which never fails
/// itself: a failed write is reported here and logged, and the caller
/// still propagates the original error.
#[derive(Debug)]
pub enum FailureRecord {
    /// The record is now `failed`.
    Recorded(Analysis),
    /// The record was already terminal or no longer exists.
    NotApplied,
    /// The store rejected the write.
    WriteFailed(StoreError),
}

/// Sequences upload, persistence, prediction and finalization for
/// analysis submissions.
pub struct AnalysisOrchestrator {
    store: Arc<dyn AnalysisStore>,
    images: Arc<dyn ImageStore>,
    predictor: Arc<dyn Predictor>,
    upload_folder: String,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        images: Arc<dyn ImageStore>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            store,
            images,
            predictor,
            upload_folder: DEFAULT_UPLOAD_FOLDER.to_string(),
        }
    }

    /// Store uploaded scans under `folder` instead of the default.
    pub fn with_upload_folder(mut self, folder: impl Into<String>) -> Self {
        self.upload_folder = folder.into();
        self
    }

    pub fn upload_folder(&self) -> &str {
        &self.upload_folder
    }

    /// Run one submission end to end and return the finalized analysis.
    ///
    /// 1. validate the file and patient fields (no external calls on failure)
    /// 2. upload the image (no record is created on failure)
    /// 3. create the record as `processing`
    /// 4. predict, map severity and mark the record `completed`
    ///
    /// Any failure in step 4, including cancellation, is recorded on the
    /// analysis as `failed` and then returned.
    pub async fn submit(
        &self,
        owner_id: &str,
        submission: AnalysisSubmission,
        cancel: &CancellationToken,
    ) -> Result<Analysis, AnalysisError> {
        validate_image_upload(submission.content_type.as_deref(), submission.image.len())?;
        submission.patient.validate()?;

        let AnalysisSubmission {
            image,
            content_type,
            file_name,
            patient,
            patient_id,
            actual_stage,
        } = submission;
        let content_type = content_type.unwrap_or_default().trim().to_string();

        let stored = self
            .upload(owner_id, image.clone(), &content_type, cancel)
            .await?;

        if cancel.is_cancelled() {
            self.discard_image(&stored).await;
            return Err(AnalysisError::Cancelled);
        }

        let input = CreateAnalysis {
            owner_id: owner_id.to_string(),
            patient_id: patient_id.clone(),
            original_image_url: stored.url.clone(),
            patient: patient.clone(),
            actual_stage,
            status: AnalysisStatus::Processing,
        };
        let analysis = match self.store.create(input).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::error!(owner_id, error = %e, "Failed to create analysis record");
                self.discard_image(&stored).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            analysis_id = analysis.id,
            owner_id,
            image_url = %analysis.original_image_url,
            "Analysis created",
        );

        let request = PredictionRequest {
            image,
            content_type,
            file_name: file_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            patient_id: patient_id.unwrap_or_else(|| analysis.id.to_string()),
            patient_name: patient.name.trim().to_string(),
        };

        let predicted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = self.predictor.predict(request) => result.map_err(AnalysisError::from),
        };

        let output = match predicted {
            Ok(output) => output,
            Err(err) => {
                self.record_failure(&analysis, &err).await;
                return Err(err);
            }
        };

        let assessment = map_severity(&output.predictions);
        let prediction = PredictionOutcome::new(output, assessment);
        let severity_level = prediction.severity_level;

        let update = TerminalUpdate::Completed {
            prediction,
            analyzed_image_url: None,
            analysis_date: Utc::now(),
        };

        match self.store.update(analysis.id, update).await {
            Ok(Some(completed)) => {
                tracing::info!(
                    analysis_id = completed.id,
                    severity_level,
                    "Analysis completed",
                );
                Ok(completed)
            }
            Ok(None) => {
                tracing::warn!(
                    analysis_id = analysis.id,
                    "Analysis was removed or finalized before its prediction was saved",
                );
                Err(AnalysisError::NotFound { id: analysis.id })
            }
            Err(e) => {
                let err = AnalysisError::Store(e);
                self.record_failure(&analysis, &err).await;
                Err(err)
            }
        }
    }

    /// Mark `analysis` as failed with `err`'s message.
    ///
    /// Never fails: secondary errors are logged and reported through the
    /// returned [`FailureRecord`] so they cannot mask `err`.
    pub async fn record_failure(&self, analysis: &Analysis, err: &AnalysisError) -> FailureRecord {
        let update = TerminalUpdate::Failed {
            error_message: err.to_string(),
            analysis_date: Utc::now(),
        };

        match self.store.update(analysis.id, update).await {
            Ok(Some(failed)) => {
                tracing::warn!(analysis_id = failed.id, error = %err, "Analysis failed");
                FailureRecord::Recorded(failed)
            }
            Ok(None) => {
                tracing::warn!(
                    analysis_id = analysis.id,
                    error = %err,
                    "Analysis failed but its record is gone or already final",
                );
                FailureRecord::NotApplied
            }
            Err(write_err) => {
                tracing::error!(
                    analysis_id = analysis.id,
                    error = %err,
                    write_error = %write_err,
                    "Failed to record analysis failure",
                );
                FailureRecord::WriteFailed(write_err)
            }
        }
    }

    /// All analyses owned by `owner_id`, newest upload first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Analysis>, AnalysisError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn get_one(&self, id: DbId, owner_id: &str) -> Result<Analysis, AnalysisError> {
        self.store
            .get(id, owner_id)
            .await?
            .ok_or(AnalysisError::NotFound { id })
    }

    /// Delete an analysis, then remove its images from object storage.
    ///
    /// Image removal is best-effort: failures are logged and never undo
    /// or fail the deletion.
    pub async fn delete(&self, id: DbId, owner_id: &str) -> Result<(), AnalysisError> {
        let deleted = self
            .store
            .delete(id, owner_id)
            .await?
            .ok_or(AnalysisError::NotFound { id })?;

        tracing::info!(analysis_id = id, owner_id, "Analysis deleted");

        for url in deleted.image_urls() {
            match self.images.public_id_for_url(url) {
                Some(public_id) => {
                    if !self.images.delete(&public_id).await {
                        tracing::warn!(analysis_id = id, public_id = %public_id, "Image left in storage");
                    }
                }
                None => tracing::debug!(analysis_id = id, url, "Image URL not managed by storage"),
            }
        }
        Ok(())
    }

    /// Whether the prediction service is currently healthy.
    pub async fn check_prediction_service(&self) -> bool {
        self.predictor.check_health().await
    }

    /// Store the scan, racing the caller's cancellation.
    ///
    /// The upload runs as its own task. If cancellation wins, that task is
    /// left to finish and whatever it stored is deleted in the background.
    async fn upload(
        &self,
        owner_id: &str,
        image: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<StoredImage, AnalysisError> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let images = Arc::clone(&self.images);
        let folder = self.upload_folder.clone();
        let content_type = content_type.to_string();
        let mut upload =
            tokio::spawn(async move { images.store(image, &content_type, &folder).await });

        let finished = tokio::select! {
            biased;
            joined = &mut upload => Some(joined),
            _ = cancel.cancelled() => None,
        };

        let Some(joined) = finished else {
            tracing::info!(owner_id, "Submission cancelled during image upload");
            let images = Arc::clone(&self.images);
            tokio::spawn(async move {
                if let Ok(Ok(stored)) = upload.await {
                    if !images.delete(&stored.public_id).await {
                        tracing::warn!(public_id = %stored.public_id, "Orphaned image left in storage");
                    }
                }
            });
            return Err(AnalysisError::Cancelled);
        };

        match joined {
            Ok(Ok(stored)) => Ok(stored),
            Ok(Err(e)) => {
                tracing::warn!(owner_id, error = %e, "Image upload failed");
                Err(AnalysisError::UploadFailed(e.to_string()))
            }
            Err(e) => {
                tracing::error!(owner_id, error = %e, "Image upload task failed");
                Err(AnalysisError::UploadFailed(format!("upload task failed: {e}")))
            }
        }
    }

    /// Remove an image that no record will ever reference.
    async fn discard_image(&self, stored: &StoredImage) {
        if !self.images.delete(&stored.public_id).await {
            tracing::warn!(public_id = %stored.public_id, "Orphaned image left in storage");
        }
    }
}
