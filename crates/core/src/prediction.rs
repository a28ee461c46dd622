//! Prediction payload shapes.
//!
//! [`ModelOutput`] is what the external model returns; [`PredictionOutcome`]
//! is what gets persisted on a completed analysis: the model output plus the
//! severity fields derived from it.

use serde::{Deserialize, Serialize};

use crate::severity::SeverityAssessment;

/// One `(condition, confidence, probability)` entry from the model, in the
/// order the model returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub condition: String,
    pub confidence: f64,
    #[serde(default)]
    pub probability: f64,
}

/// Model version and preprocessing details, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionMetadata {
    pub model_version: String,
    pub model_architecture: String,
    pub preprocessing: String,
    pub image_size: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Raw result of a successful model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub predictions: Vec<ModelPrediction>,
    pub primary_diagnosis: String,
    pub confidence_score: f64,
    pub processing_time: f64,
    pub metadata: PredictionMetadata,
}

/// Prediction stored on a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub predictions: Vec<ModelPrediction>,
    pub primary_diagnosis: String,
    pub confidence_score: f64,
    pub processing_time: f64,
    pub severity_level: u8,
    pub severity_name: String,
    pub urgency_level: String,
    pub recommendations: Vec<String>,
    pub metadata: PredictionMetadata,
}

impl PredictionOutcome {
    /// Combine the model output with its severity assessment.
    pub fn new(output: ModelOutput, assessment: SeverityAssessment) -> Self {
        Self {
            predictions: output.predictions,
            primary_diagnosis: output.primary_diagnosis,
            confidence_score: output.confidence_score,
            processing_time: output.processing_time,
            severity_level: assessment.level.value(),
            severity_name: assessment.level.name().to_string(),
            urgency_level: assessment.urgency.as_str().to_string(),
            recommendations: assessment.recommendations,
            metadata: output.metadata,
        }
    }
}
