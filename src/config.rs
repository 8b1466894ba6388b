//! Calibration and runtime configuration
//!
//! Every constant that moves a class boundary lives here. The constants are
//! empirically chosen calibration parameters, not clinical ground truth; any change
//! to them must bump [`CALIBRATION_VERSION`] so stored results can be traced back to
//! the calibration that produced them.

use crate::error::ScreeningError;
use crate::types::{Modality, Severity};
use serde::{Deserialize, Serialize};

/// Version tag of the default calibration
pub const CALIBRATION_VERSION: &str = "reference-2";

/// Default bound on a single extraction call
pub const DEFAULT_EXTRACTION_TIMEOUT_MS: u64 = 5_000;

/// Lowest sample rate accepted for voice recordings by default (Hz)
pub const DEFAULT_MIN_SAMPLE_RATE_HZ: u32 = 4_000;

/// Highest sample rate accepted for voice recordings by default (Hz)
pub const DEFAULT_MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Top-level configuration for a screener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Identifies the set of constants below
    pub calibration_version: String,
    pub spiral: SpiralConfig,
    pub voice: VoiceConfig,
    pub posture: PostureConfig,
    pub classifier: ClassifierConfig,
    pub questionnaire: QuestionnaireConfig,
    pub aggregation: AggregationConfig,
    /// Upper bound on a single asynchronous extraction (milliseconds)
    pub extraction_timeout_ms: u64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            calibration_version: CALIBRATION_VERSION.to_string(),
            spiral: SpiralConfig::default(),
            voice: VoiceConfig::default(),
            posture: PostureConfig::default(),
            classifier: ClassifierConfig::default(),
            questionnaire: QuestionnaireConfig::default(),
            aggregation: AggregationConfig::default(),
            extraction_timeout_ms: DEFAULT_EXTRACTION_TIMEOUT_MS,
        }
    }
}

impl ScreeningConfig {
    /// Load a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, ScreeningError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ScreeningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency of all sections
    pub fn validate(&self) -> Result<(), ScreeningError> {
        if self.calibration_version.trim().is_empty() {
            return Err(ScreeningError::ConfigError(
                "calibration_version must not be empty".to_string(),
            ));
        }
        if self.extraction_timeout_ms == 0 {
            return Err(ScreeningError::ConfigError(
                "extraction_timeout_ms must be positive".to_string(),
            ));
        }
        self.spiral.validate()?;
        self.voice.validate()?;
        self.posture.validate()?;
        self.classifier.validate()?;
        self.aggregation.validate()?;
        Ok(())
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ScreeningError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ScreeningError::ConfigError(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

/// Spiral extractor calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiralConfig {
    /// Square analysis resolution in pixels
    pub resolution: u32,
    /// Gradient magnitude above which a pixel counts as a stroke edge
    pub edge_threshold: f64,
    /// Half-width of the structure tensor window used for stroke direction (pixels)
    pub orientation_radius: usize,
    /// Mean orientation incoherence of edge pixels mapped to tremor = 1
    pub tremor_norm: f64,
    /// Edge coefficient of variation mapped to irregularity = 1
    pub irregularity_norm: f64,
    /// Intensity variance mapped to pressure = 1
    pub pressure_norm: f64,
    /// Mean absolute Laplacian mapped to smoothness = 0
    pub smoothness_norm: f64,
    /// Mean squared gradient magnitude mapped to speed = 0
    pub speed_norm: f64,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            resolution: 224,
            edge_threshold: 0.1,
            orientation_radius: 2,
            tremor_norm: 0.5,
            irregularity_norm: 2.0,
            pressure_norm: 0.25,
            smoothness_norm: 1.0,
            speed_norm: 4.0,
        }
    }
}

impl SpiralConfig {
    fn validate(&self) -> Result<(), ScreeningError> {
        if self.resolution < 3 {
            return Err(ScreeningError::ConfigError(
                "spiral.resolution must be at least 3".to_string(),
            ));
        }
        if self.orientation_radius == 0 || 2 * self.orientation_radius >= self.resolution as usize {
            return Err(ScreeningError::ConfigError(
                "spiral.orientation_radius must be at least 1 and fit the analysis grid".to_string(),
            ));
        }
        require_positive("spiral.edge_threshold", self.edge_threshold)?;
        require_positive("spiral.tremor_norm", self.tremor_norm)?;
        require_positive("spiral.irregularity_norm", self.irregularity_norm)?;
        require_positive("spiral.pressure_norm", self.pressure_norm)?;
        require_positive("spiral.smoothness_norm", self.smoothness_norm)?;
        require_positive("spiral.speed_norm", self.speed_norm)
    }
}

/// Voice extractor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Analysis frame length (milliseconds)
    pub frame_ms: f64,
    /// Hop between frames (milliseconds)
    pub hop_ms: f64,
    /// Lowest plausible fundamental (Hz)
    pub min_f0_hz: f64,
    /// Highest plausible fundamental (Hz)
    pub max_f0_hz: f64,
    /// Minimum normalized autocorrelation peak for a voiced frame
    pub voicing_threshold: f64,
    /// Frame RMS below which a frame is treated as silence
    pub silence_rms: f64,
    /// Number of harmonics summed for harmonicity
    pub harmonics: usize,
    /// Bins either side of each harmonic counted as harmonic energy
    pub harmonic_bin_tolerance: usize,
    /// Energy fraction for spectral rolloff
    pub rolloff_fraction: f64,
    /// Triangular filters in the mel filterbank
    pub mel_filters: usize,
    /// Lowest accepted sample rate (Hz)
    pub min_sample_rate_hz: u32,
    /// Highest accepted sample rate (Hz)
    pub max_sample_rate_hz: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            frame_ms: 25.0,
            hop_ms: 10.0,
            min_f0_hz: 50.0,
            max_f0_hz: 500.0,
            voicing_threshold: 0.5,
            silence_rms: 1e-4,
            harmonics: 5,
            harmonic_bin_tolerance: 2,
            rolloff_fraction: 0.85,
            mel_filters: 26,
            min_sample_rate_hz: DEFAULT_MIN_SAMPLE_RATE_HZ,
            max_sample_rate_hz: DEFAULT_MAX_SAMPLE_RATE_HZ,
        }
    }
}

impl VoiceConfig {
    /// Sample rates the voice extractor will analyze
    pub fn sample_rates(&self) -> std::ops::RangeInclusive<u32> {
        self.min_sample_rate_hz..=self.max_sample_rate_hz
    }

    fn validate(&self) -> Result<(), ScreeningError> {
        if self.min_sample_rate_hz == 0 || self.max_sample_rate_hz <= self.min_sample_rate_hz {
            return Err(ScreeningError::ConfigError(
                "voice.max_sample_rate_hz must exceed a positive voice.min_sample_rate_hz"
                    .to_string(),
            ));
        }
        require_positive("voice.frame_ms", self.frame_ms)?;
        require_positive("voice.hop_ms", self.hop_ms)?;
        require_positive("voice.min_f0_hz", self.min_f0_hz)?;
        if self.max_f0_hz <= self.min_f0_hz {
            return Err(ScreeningError::ConfigError(
                "voice.max_f0_hz must exceed voice.min_f0_hz".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.voicing_threshold) {
            return Err(ScreeningError::ConfigError(
                "voice.voicing_threshold must be in [0, 1)".to_string(),
            ));
        }
        if self.harmonics == 0 {
            return Err(ScreeningError::ConfigError(
                "voice.harmonics must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rolloff_fraction) {
            return Err(ScreeningError::ConfigError(
                "voice.rolloff_fraction must be in [0, 1]".to_string(),
            ));
        }
        if self.mel_filters < 20 {
            return Err(ScreeningError::ConfigError(
                "voice.mel_filters must be at least 20".to_string(),
            ));
        }
        Ok(())
    }
}

/// Posture extractor calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Multiplier on shoulder height offset / shoulder width
    pub shoulder_asymmetry_scale: f64,
    /// Multiplier on spinal deviation / image height
    pub spinal_curvature_scale: f64,
    /// Joint angle variance (deg^2) at which rigidity falls to 0.5
    pub rigidity_variance_norm: f64,
    /// Multiplier on hip/ankle horizontal offset / shoulder width
    pub balance_scale: f64,
    /// Minimum frames for gait estimation
    pub min_gait_frames: usize,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            shoulder_asymmetry_scale: 4.0,
            spinal_curvature_scale: 10.0,
            rigidity_variance_norm: 400.0,
            balance_scale: 1.0,
            min_gait_frames: 8,
        }
    }
}

impl PostureConfig {
    fn validate(&self) -> Result<(), ScreeningError> {
        require_positive("posture.shoulder_asymmetry_scale", self.shoulder_asymmetry_scale)?;
        require_positive("posture.spinal_curvature_scale", self.spinal_curvature_scale)?;
        require_positive("posture.rigidity_variance_norm", self.rigidity_variance_norm)?;
        require_positive("posture.balance_scale", self.balance_scale)?;
        if self.min_gait_frames < 3 {
            return Err(ScreeningError::ConfigError(
                "posture.min_gait_frames must be at least 3".to_string(),
            ));
        }
        Ok(())
    }
}

/// Risk threshold band mapping to a class probability distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBand {
    /// Exclusive upper bound on risk (the last band also includes its bound)
    pub upper: f64,
    /// Probabilities for healthy, mild, moderate, severe
    pub probabilities: [f64; 4],
}

/// Inclusive score range assigned to a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: u8,
    pub max: u8,
}

impl ScoreBand {
    pub fn contains(&self, score: u8) -> bool {
        (self.min..=self.max).contains(&score)
    }

    pub fn midpoint(&self) -> u8 {
        ((self.min as u16 + self.max as u16) / 2) as u8
    }
}

/// Score bands per class; must be disjoint and descend with severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBands {
    pub healthy: ScoreBand,
    pub mild: ScoreBand,
    pub moderate: ScoreBand,
    pub severe: ScoreBand,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            healthy: ScoreBand { min: 85, max: 95 },
            mild: ScoreBand { min: 65, max: 80 },
            moderate: ScoreBand { min: 45, max: 60 },
            severe: ScoreBand { min: 25, max: 40 },
        }
    }
}

impl ScoreBands {
    pub fn band(&self, severity: Severity) -> ScoreBand {
        match severity {
            Severity::Healthy => self.healthy,
            Severity::Mild => self.mild,
            Severity::Moderate => self.moderate,
            Severity::Severe => self.severe,
        }
    }
}

/// Score thresholds partitioning 0-100 into severity bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub healthy_min: f64,
    pub mild_min: f64,
    pub moderate_min: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        // Midway between the class score bands so a band's own scores map back to it
        Self {
            healthy_min: 82.5,
            mild_min: 62.5,
            moderate_min: 42.5,
        }
    }
}

impl SeverityThresholds {
    /// Map a score to its severity band
    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.healthy_min {
            Severity::Healthy
        } else if score >= self.mild_min {
            Severity::Mild
        } else if score >= self.moderate_min {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }

    fn validate(&self) -> Result<(), ScreeningError> {
        let ordered = self.healthy_min > self.mild_min
            && self.mild_min > self.moderate_min
            && self.moderate_min > 0.0
            && self.healthy_min <= 100.0;
        if ordered {
            Ok(())
        } else {
            Err(ScreeningError::ConfigError(
                "severity thresholds must descend within (0, 100]".to_string(),
            ))
        }
    }
}

/// Spiral risk weights (applied to tremor, irregularity, 1-smoothness, 1-speed, pressure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiralWeights {
    pub tremor: f64,
    pub irregularity: f64,
    pub roughness: f64,
    pub slowness: f64,
    pub pressure: f64,
}

impl Default for SpiralWeights {
    fn default() -> Self {
        Self {
            tremor: 0.35,
            irregularity: 0.25,
            roughness: 0.2,
            slowness: 0.1,
            pressure: 0.1,
        }
    }
}

/// Voice risk weights and the normalizers that bound each raw measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRisk {
    pub jitter_weight: f64,
    pub shimmer_weight: f64,
    pub hnr_weight: f64,
    pub monotone_weight: f64,
    /// Jitter mapped to index 1
    pub jitter_norm: f64,
    /// Shimmer mapped to index 1
    pub shimmer_norm: f64,
    /// HNR (dB) at and above which the low-HNR index is 0
    pub hnr_norm_db: f64,
    /// f0 variation at and above which the monotone index is 0
    pub f0_variation_norm: f64,
}

impl Default for VoiceRisk {
    fn default() -> Self {
        Self {
            jitter_weight: 0.3,
            shimmer_weight: 0.3,
            hnr_weight: 0.25,
            monotone_weight: 0.15,
            jitter_norm: 0.02,
            shimmer_norm: 0.15,
            hnr_norm_db: 20.0,
            f0_variation_norm: 0.1,
        }
    }
}

/// Posture risk weights over the six posture indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureWeights {
    pub forward_head_posture: f64,
    pub shoulder_asymmetry: f64,
    pub spinal_curvature: f64,
    pub arm_swing_asymmetry: f64,
    pub body_rigidity: f64,
    pub balance_index: f64,
}

impl Default for PostureWeights {
    fn default() -> Self {
        Self {
            forward_head_posture: 0.2,
            shoulder_asymmetry: 0.15,
            spinal_curvature: 0.2,
            arm_swing_asymmetry: 0.2,
            body_rigidity: 0.1,
            balance_index: 0.15,
        }
    }
}

/// Reference classifier calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub spiral: SpiralWeights,
    pub voice: VoiceRisk,
    pub posture: PostureWeights,
    /// Ascending risk bands; weak signal is biased toward non-alarming classes
    pub risk_bands: Vec<RiskBand>,
    pub score_bands: ScoreBands,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            spiral: SpiralWeights::default(),
            voice: VoiceRisk::default(),
            posture: PostureWeights::default(),
            risk_bands: vec![
                RiskBand { upper: 0.30, probabilities: [0.80, 0.15, 0.04, 0.01] },
                RiskBand { upper: 0.50, probabilities: [0.55, 0.30, 0.10, 0.05] },
                RiskBand { upper: 0.60, probabilities: [0.20, 0.45, 0.25, 0.10] },
                RiskBand { upper: 0.70, probabilities: [0.10, 0.30, 0.45, 0.15] },
                RiskBand { upper: 0.85, probabilities: [0.05, 0.15, 0.45, 0.35] },
                RiskBand { upper: 1.00, probabilities: [0.02, 0.08, 0.30, 0.60] },
            ],
            score_bands: ScoreBands::default(),
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ScreeningError> {
        if self.risk_bands.is_empty() {
            return Err(ScreeningError::ConfigError(
                "classifier.risk_bands must not be empty".to_string(),
            ));
        }

        let mut previous = 0.0;
        for band in &self.risk_bands {
            if band.upper <= previous {
                return Err(ScreeningError::ConfigError(format!(
                    "classifier.risk_bands must ascend, {} follows {}",
                    band.upper, previous
                )));
            }
            previous = band.upper;

            let total: f64 = band.probabilities.iter().sum();
            if band.probabilities.iter().any(|p| *p < 0.0) || (total - 1.0).abs() > 1e-6 {
                return Err(ScreeningError::ConfigError(format!(
                    "risk band {} probabilities must be non-negative and sum to 1",
                    band.upper
                )));
            }
        }
        if previous < 1.0 {
            return Err(ScreeningError::ConfigError(
                "classifier.risk_bands must cover risk 1.0".to_string(),
            ));
        }

        let mut floor = u8::MAX as u16 + 1;
        for severity in Severity::ALL {
            let band = self.score_bands.band(severity);
            if band.min > band.max || band.max > 100 || band.max as u16 >= floor {
                return Err(ScreeningError::ConfigError(format!(
                    "score band for {severity} must be within 0-100 and below the previous band"
                )));
            }
            floor = band.min as u16;
        }
        Ok(())
    }
}

/// Questionnaire penalty table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionnaireConfig {
    /// Ages strictly above this draw the age penalty
    pub age_threshold: u32,
    pub age_penalty: f64,
    pub family_history_penalty: f64,
    pub tremor_per_point: f64,
    pub stiffness_per_point: f64,
    pub balance_per_point: f64,
    pub freeze_penalty: f64,
    pub sleep_penalty: f64,
    /// Fixed confidence reported for self-assessed answers
    pub confidence: u8,
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self {
            age_threshold: 60,
            age_penalty: 15.0,
            family_history_penalty: 20.0,
            tremor_per_point: 3.0,
            stiffness_per_point: 4.0,
            balance_per_point: 4.0,
            freeze_penalty: 15.0,
            sleep_penalty: 10.0,
            confidence: 80,
        }
    }
}

/// How present modality results are averaged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Every present modality counts equally
    Equal,
    /// Per-modality importance weights, renormalized over present modalities
    Weighted {
        spiral: f64,
        voice: f64,
        posture: f64,
        questionnaire: f64,
    },
}

impl AggregationPolicy {
    pub fn weight(&self, modality: Modality) -> f64 {
        match self {
            AggregationPolicy::Equal => 1.0,
            AggregationPolicy::Weighted {
                spiral,
                voice,
                posture,
                questionnaire,
            } => match modality {
                Modality::Spiral => *spiral,
                Modality::Voice => *voice,
                Modality::Posture => *posture,
                Modality::Questionnaire => *questionnaire,
            },
        }
    }
}

/// Aggregator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub policy: AggregationPolicy,
    pub thresholds: SeverityThresholds,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::Equal,
            thresholds: SeverityThresholds::default(),
        }
    }
}

impl AggregationConfig {
    fn validate(&self) -> Result<(), ScreeningError> {
        self.thresholds.validate()?;
        for modality in Modality::ALL {
            let weight = self.policy.weight(modality);
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ScreeningError::ConfigError(format!(
                    "aggregation weight for {modality} must be positive"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScreeningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_preserves_calibration() {
        let config = ScreeningConfig::default();
        let json = config.to_json().unwrap();
        let loaded = ScreeningConfig::from_json(&json).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let loaded = ScreeningConfig::from_json(r#"{"extraction_timeout_ms": 250}"#).unwrap();

        assert_eq!(loaded.extraction_timeout_ms, 250);
        assert_eq!(loaded.calibration_version, CALIBRATION_VERSION);
        assert_eq!(loaded.spiral.resolution, 224);
    }

    #[test]
    fn test_rejects_overlapping_score_bands() {
        let mut config = ScreeningConfig::default();
        config.classifier.score_bands.mild = ScoreBand { min: 60, max: 88 };

        assert!(matches!(
            config.validate(),
            Err(ScreeningError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_bands_not_covering_full_risk() {
        let mut config = ScreeningConfig::default();
        config.classifier.risk_bands.pop();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_map_band_edges_back_to_band() {
        let thresholds = SeverityThresholds::default();
        let bands = ScoreBands::default();

        for severity in Severity::ALL {
            let band = bands.band(severity);
            assert_eq!(thresholds.classify(band.min as f64), severity);
            assert_eq!(thresholds.classify(band.max as f64), severity);
        }
        assert_eq!(thresholds.classify(0.0), Severity::Severe);
        assert_eq!(thresholds.classify(100.0), Severity::Healthy);
    }

    #[test]
    fn test_weighted_policy_rejects_zero_weight() {
        let mut config = ScreeningConfig::default();
        config.aggregation.policy = AggregationPolicy::Weighted {
            spiral: 1.0,
            voice: 0.0,
            posture: 1.0,
            questionnaire: 1.0,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_sample_rate_bounds() {
        let mut config = ScreeningConfig::default();
        config.voice.min_sample_rate_hz = 48_000;
        config.voice.max_sample_rate_hz = 8_000;

        assert!(matches!(
            config.validate(),
            Err(ScreeningError::ConfigError(_))
        ));
    }
}
