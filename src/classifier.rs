//! Per-modality classification
//!
//! A [`Classifier`] maps a feature vector to a probability distribution over
//! the four severity classes. [`classify`] turns that distribution into an
//! [`AssessmentResult`]: the most likely class, its probability as confidence,
//! and a score placed inside the class's score band.
//!
//! [`ReferenceClassifier`] is a placeholder, not a trained model: it averages
//! bounded risk indices and looks the risk up in a fixed band table. The table
//! leans toward healthy/mild for weak or ambiguous signal, which can falsely
//! reassure. Swap in a trained model through the [`Classifier`] trait.

use crate::config::{ClassifierConfig, RiskBand, ScoreBands};
use crate::error::ScreeningError;
use crate::types::{AssessmentResult, FeatureVector, PostureFeatures, Severity, SpiralFeatures, VoiceFeatures};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probabilities for healthy, mild, moderate, severe (in that order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities([f64; 4]);

impl ClassProbabilities {
    /// Validate and wrap a distribution; it must be finite, non-negative and sum to 1
    pub fn new(probabilities: [f64; 4]) -> Result<Self, ScreeningError> {
        let total: f64 = probabilities.iter().sum();
        let valid = probabilities.iter().all(|p| p.is_finite() && *p >= 0.0)
            && (total - 1.0).abs() < 1e-6;
        if !valid {
            return Err(ScreeningError::InvalidInput(format!(
                "Class probabilities must be non-negative and sum to 1, got {probabilities:?}"
            )));
        }
        Ok(Self(probabilities))
    }

    pub fn probability(&self, severity: Severity) -> f64 {
        self.0[severity.index()]
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }

    /// Most probable class; ties resolve to the more severe class
    pub fn most_likely(&self) -> (Severity, f64) {
        let mut best = (Severity::Healthy, self.0[0]);
        for severity in Severity::ALL.into_iter().skip(1) {
            let p = self.probability(severity);
            if p >= best.1 {
                best = (severity, p);
            }
        }
        best
    }
}

/// Model mapping a feature vector to class probabilities
pub trait Classifier: Send + Sync {
    /// Model identifier recorded in reports
    fn name(&self) -> &str;

    fn predict(&self, features: &FeatureVector) -> Result<ClassProbabilities, ScreeningError>;
}

/// Placeholder classifier: weighted risk indices looked up in a band table
#[derive(Debug, Clone, Default)]
pub struct ReferenceClassifier {
    config: ClassifierConfig,
}

impl ReferenceClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Weighted mean of the modality's risk indices, in [0, 1]
    pub fn risk(&self, features: &FeatureVector) -> f64 {
        let indices = match features {
            FeatureVector::Spiral(f) => self.spiral_indices(f),
            FeatureVector::Voice(f) => self.voice_indices(f),
            FeatureVector::Posture(f) => self.posture_indices(f),
        };
        weighted_mean(&indices)
    }

    /// Distribution of the band containing `risk`
    pub fn band_probabilities(&self, risk: f64) -> [f64; 4] {
        let risk = risk.clamp(0.0, 1.0);
        let bands: &[RiskBand] = &self.config.risk_bands;
        bands
            .iter()
            .find(|band| risk < band.upper)
            .or_else(|| bands.last())
            .map(|band| band.probabilities)
            .unwrap_or([1.0, 0.0, 0.0, 0.0])
    }

    fn spiral_indices(&self, f: &SpiralFeatures) -> Vec<(f64, f64)> {
        let w = &self.config.spiral;
        vec![
            (w.tremor, f.tremor),
            (w.irregularity, f.irregularity),
            (w.roughness, 1.0 - f.smoothness),
            (w.slowness, 1.0 - f.speed),
            (w.pressure, f.pressure),
        ]
    }

    fn voice_indices(&self, f: &VoiceFeatures) -> Vec<(f64, f64)> {
        let r = &self.config.voice;
        vec![
            (r.jitter_weight, f.jitter / r.jitter_norm),
            (r.shimmer_weight, f.shimmer / r.shimmer_norm),
            (r.hnr_weight, 1.0 - f.hnr / r.hnr_norm_db),
            (r.monotone_weight, 1.0 - f.f0_variation / r.f0_variation_norm),
        ]
    }

    fn posture_indices(&self, f: &PostureFeatures) -> Vec<(f64, f64)> {
        let w = &self.config.posture;
        vec![
            (w.forward_head_posture, f.forward_head_posture),
            (w.shoulder_asymmetry, f.shoulder_asymmetry),
            (w.spinal_curvature, f.spinal_curvature),
            (w.arm_swing_asymmetry, f.arm_swing_asymmetry),
            (w.body_rigidity, f.body_rigidity),
            (w.balance_index, f.balance_index),
        ]
    }
}

impl Classifier for ReferenceClassifier {
    fn name(&self) -> &str {
        "reference"
    }

    fn predict(&self, features: &FeatureVector) -> Result<ClassProbabilities, ScreeningError> {
        if features.named_values().iter().any(|(_, v)| !v.is_finite()) {
            return Err(ScreeningError::InvalidInput(format!(
                "{} features contain non-finite values",
                features.modality()
            )));
        }
        let risk = self.risk(features);
        log::debug!("Reference risk for {}: {:.3}", features.modality(), risk);
        ClassProbabilities::new(self.band_probabilities(risk))
    }
}

/// Stand-in used when no model is loaded; every prediction fails
#[derive(Debug, Clone, Default)]
pub struct UnavailableClassifier;

impl Classifier for UnavailableClassifier {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn predict(&self, _features: &FeatureVector) -> Result<ClassProbabilities, ScreeningError> {
        Err(ScreeningError::ModelUnavailable(
            "no classifier model is loaded".to_string(),
        ))
    }
}

/// Where a score lands inside its class band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePlacement {
    /// Band midpoint, deterministic
    #[default]
    Midpoint,
    /// Uniform random within the band; display only
    Cosmetic,
}

/// Classify a feature vector into an assessment result
pub fn classify(
    features: &FeatureVector,
    classifier: &dyn Classifier,
    bands: &ScoreBands,
    placement: ScorePlacement,
) -> Result<AssessmentResult, ScreeningError> {
    let probabilities = classifier.predict(features)?;
    let (status, probability) = probabilities.most_likely();
    let band = bands.band(status);

    let score = match placement {
        ScorePlacement::Midpoint => band.midpoint(),
        ScorePlacement::Cosmetic => rand::thread_rng().gen_range(band.min..=band.max),
    };

    let mut details = features.details();
    let flags = features.quality_flags();
    if !flags.is_empty() {
        let names: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
        details.push_str(&format!("; flags: {}", names.join(", ")));
    }

    Ok(AssessmentResult {
        score,
        confidence: (probability * 100.0).round().clamp(0.0, 100.0) as u8,
        status,
        details,
    })
}

/// Σ wᵢ·clamp(xᵢ) / Σ wᵢ
fn weighted_mean(indices: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = indices.iter().map(|(w, _)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let sum: f64 = indices
        .iter()
        .map(|(w, x)| w * if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 })
        .sum();
    (sum / total_weight).clamp(0.0, 1.0)
}
