//! Severity mapping for diabetic-retinopathy model output.
//!
//! Translates the model's condition list into a five-step severity scale,
//! an urgency label and a fixed recommendation set. Total over its input:
//! unrecognised conditions map to [`SeverityLevel::NoRetinopathy`] instead
//! of failing, so unexpected model output never aborts an analysis.

use crate::prediction::ModelPrediction;

// ---------------------------------------------------------------------------
// Severity level
// ---------------------------------------------------------------------------

/// Diagnostic severity, ordered from 0 (none) to 4 (proliferative).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityLevel {
    NoRetinopathy = 0,
    Mild = 1,
    Moderate = 2,
    Severe = 3,
    Proliferative = 4,
}

impl SeverityLevel {
    /// Numeric level (0-4).
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Look up a level by its numeric value.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoRetinopathy),
            1 => Some(Self::Mild),
            2 => Some(Self::Moderate),
            3 => Some(Self::Severe),
            4 => Some(Self::Proliferative),
            _ => None,
        }
    }

    /// Recognise a model condition label.
    ///
    /// Accepts the canonical names (`"Moderate Diabetic Retinopathy"`),
    /// short forms (`"Moderate DR"`, `"No DR"`, `"PDR"`) and bare class
    /// indices (`"2"`). Returns `None` for anything else.
    pub fn from_condition(condition: &str) -> Option<Self> {
        let label = condition.trim().to_ascii_lowercase();

        if let Ok(index) = label.parse::<u8>() {
            return Self::from_value(index);
        }

        if label.starts_with("no ")
            || label == "no_dr"
            || label == "normal"
            || label == "healthy"
        {
            return Some(Self::NoRetinopathy);
        }
        // Grade words take precedence so "Severe Non-Proliferative DR" is Severe.
        if label.contains("mild") {
            return Some(Self::Mild);
        }
        if label.contains("moderate") {
            return Some(Self::Moderate);
        }
        if label.contains("severe") {
            return Some(Self::Severe);
        }
        if label.contains("proliferative") || label == "pdr" {
            return Some(Self::Proliferative);
        }
        None
    }

    /// Canonical display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoRetinopathy => "No Diabetic Retinopathy",
            Self::Mild => "Mild Diabetic Retinopathy",
            Self::Moderate => "Moderate Diabetic Retinopathy",
            Self::Severe => "Severe Diabetic Retinopathy",
            Self::Proliferative => "Proliferative Diabetic Retinopathy",
        }
    }

    /// Urgency implied by this level.
    pub fn urgency(self) -> Urgency {
        match self {
            Self::NoRetinopathy => Urgency::Normal,
            Self::Mild => Urgency::Mild,
            Self::Moderate => Urgency::Moderate,
            Self::Severe | Self::Proliferative => Urgency::Urgent,
        }
    }

    /// Fixed follow-up recommendations for this level.
    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            Self::NoRetinopathy => &[
                "Continue annual diabetic eye screening",
                "Maintain good control of blood glucose, blood pressure and cholesterol",
                "Report any sudden change in vision promptly",
            ],
            Self::Mild => &[
                "Repeat retinal screening in 6 to 12 months",
                "Optimise blood glucose and blood pressure control",
                "Discuss findings with the patient's diabetes care team",
            ],
            Self::Moderate => &[
                "Refer to an ophthalmologist within 3 to 6 months",
                "Tighten glycaemic and blood pressure management",
                "Screen for diabetic macular oedema",
            ],
            Self::Severe => &[
                "Urgent referral to an ophthalmologist within 2 to 4 weeks",
                "Evaluate for pan-retinal photocoagulation",
                "Review systemic risk factors with the diabetes care team",
            ],
            Self::Proliferative => &[
                "Immediate referral to a retinal specialist",
                "Assess for laser photocoagulation or anti-VEGF therapy",
                "Advise the patient to seek emergency care for sudden vision loss",
            ],
        }
    }
}

/// Recommendations used when a level falls outside 0-4.
const FALLBACK_RECOMMENDATIONS: &[&str] = &[
    "Consult an eye care professional for a full retinal examination",
    "Repeat the scan if image quality may have affected the result",
];

/// Recommendations for a raw numeric level, with a generic fallback for
/// values outside the 0-4 range.
pub fn recommendations_for_level(level: u8) -> Vec<String> {
    let table = SeverityLevel::from_value(level)
        .map(SeverityLevel::recommendations)
        .unwrap_or(FALLBACK_RECOMMENDATIONS);
    table.iter().map(|r| (*r).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Urgency
// ---------------------------------------------------------------------------

/// Clinical urgency label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Mild,
    Moderate,
    Urgent,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Urgent => "urgent",
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Result of [`map_severity`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityAssessment {
    pub level: SeverityLevel,
    pub urgency: Urgency,
    pub recommendations: Vec<String>,
}

/// Map the model's predictions to a severity assessment.
///
/// The condition with the strictly greatest confidence wins; on an exact
/// tie the earlier entry is kept. Entries with a NaN confidence are
/// ignored. An empty list, or a winning condition that is not recognised,
/// yields level 0.
pub fn map_severity(predictions: &[ModelPrediction]) -> SeverityAssessment {
    let mut best: Option<&ModelPrediction> = None;
    for p in predictions.iter().filter(|p| !p.confidence.is_nan()) {
        match best {
            Some(current) if p.confidence <= current.confidence => {}
            _ => best = Some(p),
        }
    }

    let level = best
        .and_then(|p| SeverityLevel::from_condition(&p.condition))
        .unwrap_or(SeverityLevel::NoRetinopathy);

    SeverityAssessment {
        level,
        urgency: level.urgency(),
        recommendations: recommendations_for_level(level.value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(condition: &str, confidence: f64) -> ModelPrediction {
        ModelPrediction {
            condition: condition.to_string(),
            confidence,
            probability: confidence,
        }
    }

    #[test]
    fn picks_highest_confidence_condition() {
        let result = map_severity(&[
            pred("No DR", 0.10),
            pred("Moderate Diabetic Retinopathy", 0.81),
            pred("Severe Diabetic Retinopathy", 0.09),
        ]);
        assert_eq!(result.level, SeverityLevel::Moderate);
        assert_eq!(result.level.value(), 2);
        assert_eq!(result.level.name(), "Moderate Diabetic Retinopathy");
        assert_eq!(result.urgency.as_str(), "moderate");
    }

    #[test]
    fn first_seen_wins_on_exact_tie() {
        let input = [pred("Mild DR", 0.5), pred("Proliferative DR", 0.5)];
        for _ in 0..10 {
            assert_eq!(map_severity(&input).level, SeverityLevel::Mild);
        }

        let reversed = [pred("Proliferative DR", 0.5), pred("Mild DR", 0.5)];
        assert_eq!(map_severity(&reversed).level, SeverityLevel::Proliferative);
    }

    #[test]
    fn unknown_condition_maps_to_level_zero() {
        let result = map_severity(&[pred("Glaucoma suspect", 0.97)]);
        assert_eq!(result.level, SeverityLevel::NoRetinopathy);
        assert_eq!(result.urgency, Urgency::Normal);
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn empty_predictions_map_to_level_zero() {
        let result = map_severity(&[]);
        assert_eq!(result.level, SeverityLevel::NoRetinopathy);
    }

    #[test]
    fn nan_confidence_never_wins() {
        let result = map_severity(&[pred("Severe DR", f64::NAN), pred("Mild DR", 0.2)]);
        assert_eq!(result.level, SeverityLevel::Mild);
    }

    #[test]
    fn urgency_follows_level() {
        assert_eq!(SeverityLevel::NoRetinopathy.urgency(), Urgency::Normal);
        assert_eq!(SeverityLevel::Mild.urgency(), Urgency::Mild);
        assert_eq!(SeverityLevel::Moderate.urgency(), Urgency::Moderate);
        assert_eq!(SeverityLevel::Severe.urgency(), Urgency::Urgent);
        assert_eq!(SeverityLevel::Proliferative.urgency(), Urgency::Urgent);
    }

    #[test]
    fn recognises_label_variants() {
        let cases = [
            ("No Diabetic Retinopathy", SeverityLevel::NoRetinopathy),
            ("normal", SeverityLevel::NoRetinopathy),
            ("Mild Non-Proliferative DR", SeverityLevel::Mild),
            ("moderate dr", SeverityLevel::Moderate),
            ("Severe Non-Proliferative Diabetic Retinopathy", SeverityLevel::Severe),
            ("Proliferative Diabetic Retinopathy", SeverityLevel::Proliferative),
            ("PDR", SeverityLevel::Proliferative),
            ("3", SeverityLevel::Severe),
        ];
        for (label, expected) in cases {
            assert_eq!(SeverityLevel::from_condition(label), Some(expected), "{label}");
        }
        assert_eq!(SeverityLevel::from_condition("7"), None);
        assert_eq!(SeverityLevel::from_condition("cataract"), None);
    }

    #[test]
    fn every_level_has_recommendations() {
        for value in 0..=4 {
            assert!(!recommendations_for_level(value).is_empty());
        }
    }

    #[test]
    fn out_of_range_level_uses_generic_fallback() {
        let recs = recommendations_for_level(9);
        assert_eq!(recs.len(), FALLBACK_RECOMMENDATIONS.len());
        assert!(recs[0].contains("eye care professional"));
    }
}
