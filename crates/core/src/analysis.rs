//! Upload and patient-record rules for analysis submissions.
//!
//! Everything here runs before any external call is made, so a rejected
//! submission never reaches object storage, the record store or the
//! prediction service.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum accepted image size (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Logical storage folder grouping all uploaded retinal scans.
pub const DEFAULT_UPLOAD_FOLDER: &str = "retinal-scans";

/// Maximum length of the patient name.
pub const MAX_PATIENT_NAME_LEN: usize = 200;

/// Maximum length of free-form patient notes.
pub const MAX_PATIENT_NOTES_LEN: usize = 2000;

/// Inclusive upper bound for patient age in years.
pub const MAX_PATIENT_AGE: i32 = 150;

// ---------------------------------------------------------------------------
// Image validation
// ---------------------------------------------------------------------------

/// Validate an uploaded image before anything is stored.
///
/// - `content_type` must be present and start with `image/`
/// - the payload must be non-empty and at most [`MAX_IMAGE_BYTES`]
pub fn validate_image_upload(content_type: Option<&str>, size: usize) -> Result<(), CoreError> {
    let content_type = content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .ok_or_else(|| CoreError::Validation("Image file is required".into()))?;

    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(CoreError::Validation(format!(
            "Only image files are allowed (got '{content_type}')"
        )));
    }

    if size == 0 {
        return Err(CoreError::Validation("Image file is empty".into()));
    }

    if size > MAX_IMAGE_BYTES {
        return Err(CoreError::Validation(format!(
            "File size must be at most {} MB (got {size} bytes)",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Patient info
// ---------------------------------------------------------------------------

/// Patient gender as accepted by the submission form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Parse the form/database value.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            other => Err(CoreError::Validation(format!(
                "Invalid gender '{other}'. Must be one of: male, female, other"
            ))),
        }
    }

    /// Database/form value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

/// Patient details attached to an analysis. Free-form: none of these are
/// checked against the prediction outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub notes: Option<String>,
}

impl PatientInfo {
    /// Check the field constraints. The name is required and must not be blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Patient name is required".into()));
        }
        if name.chars().count() > MAX_PATIENT_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "Patient name must be at most {MAX_PATIENT_NAME_LEN} characters"
            )));
        }
        if let Some(age) = self.age {
            if !(0..=MAX_PATIENT_AGE).contains(&age) {
                return Err(CoreError::Validation(format!(
                    "Patient age must be between 0 and {MAX_PATIENT_AGE}"
                )));
            }
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_PATIENT_NOTES_LEN {
                return Err(CoreError::Validation(format!(
                    "Patient notes must be at most {MAX_PATIENT_NOTES_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a patient age sent as a form string. Decimal input (e.g. `"54.0"`)
/// is accepted and truncated; blank input means "not provided".
pub fn parse_patient_age(raw: &str) -> Result<Option<i32>, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| CoreError::Validation(format!("Patient age must be a number (got '{raw}')")))?;
    if !value.is_finite() {
        return Err(CoreError::Validation("Patient age must be a finite number".into()));
    }
    Ok(Some(value.trunc() as i32))
}
