//! Pipeline orchestration
//!
//! This module provides the public API for Neuroscreen. [`Screener`] owns the
//! configuration, the classifier and the optional keypoint detector, and runs
//! extractor → classifier for one submission. The free functions are one-shot
//! helpers with the default configuration.

use crate::aggregator::Aggregator;
use crate::classifier::{classify, Classifier, ReferenceClassifier, ScorePlacement};
use crate::config::ScreeningConfig;
use crate::error::ScreeningError;
use crate::extractors::{KeypointDetector, PostureExtractor, SpiralExtractor, VoiceExtractor};
use crate::questionnaire::{QuestionnaireScorer, SymptomQuestionnaire};
use crate::session::{AssessmentSession, ModalityRecord, Submission};
use crate::types::{AssessmentResult, FeatureVector, Modality, OverallAssessment, QualityFlag};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Assess a spiral drawing photograph.
///
/// # Example
/// ```ignore
/// let result = spiral_to_assessment(&std::fs::read("spiral.png")?)?;
/// println!("{} ({})", result.score, result.status);
/// ```
pub fn spiral_to_assessment(image_bytes: &[u8]) -> Result<AssessmentResult, ScreeningError> {
    Screener::new()
        .assess(&Submission::SpiralImage(image_bytes.to_vec()))
        .map(|a| a.result)
}

/// Assess a WAV voice recording.
pub fn voice_to_assessment(wav_bytes: &[u8]) -> Result<AssessmentResult, ScreeningError> {
    Screener::new()
        .assess(&Submission::VoiceWav(wav_bytes.to_vec()))
        .map(|a| a.result)
}

/// Score a symptom questionnaire.
pub fn questionnaire_to_assessment(
    answers: &SymptomQuestionnaire,
) -> Result<AssessmentResult, ScreeningError> {
    Screener::new()
        .assess(&Submission::Questionnaire(answers.clone()))
        .map(|a| a.result)
}

/// Features and result produced for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Absent for the questionnaire
    pub features: Option<FeatureVector>,
    pub result: AssessmentResult,
}

/// Synchronous screening engine.
///
/// Cheap to share behind an `Arc`; holds no per-session state.
#[derive(Clone)]
pub struct Screener {
    config: ScreeningConfig,
    spiral: SpiralExtractor,
    voice: VoiceExtractor,
    posture: PostureExtractor,
    questionnaire: QuestionnaireScorer,
    aggregator: Aggregator,
    classifier: Arc<dyn Classifier>,
    detector: Option<Arc<dyn KeypointDetector>>,
    placement: ScorePlacement,
    strict: bool,
}

impl Default for Screener {
    fn default() -> Self {
        Self::new()
    }
}

impl Screener {
    /// Create a screener with the reference calibration and classifier
    pub fn new() -> Self {
        Self::build(ScreeningConfig::default())
    }

    /// Create a screener from a validated configuration
    pub fn from_config(config: ScreeningConfig) -> Result<Self, ScreeningError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ScreeningConfig) -> Self {
        Self {
            spiral: SpiralExtractor::new(config.spiral.clone()),
            voice: VoiceExtractor::new(config.voice.clone()),
            posture: PostureExtractor::new(config.posture.clone()),
            questionnaire: QuestionnaireScorer::new(
                config.questionnaire.clone(),
                config.aggregation.thresholds.clone(),
            ),
            aggregator: Aggregator::new(config.aggregation.clone()),
            classifier: Arc::new(ReferenceClassifier::new(config.classifier.clone())),
            detector: None,
            placement: ScorePlacement::Midpoint,
            strict: false,
            config,
        }
    }

    /// Replace the classifier (e.g. with a trained model)
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Attach a keypoint detector for posture photographs
    pub fn with_keypoint_detector(mut self, detector: Arc<dyn KeypointDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Choose where scores land inside their class band
    pub fn with_placement(mut self, placement: ScorePlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Fail with `DegenerateSignal` instead of scoring blank or silent input
    pub fn with_strict_signals(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Run the extractor for a submission; `None` for the questionnaire
    pub fn extract(&self, submission: &Submission) -> Result<Option<FeatureVector>, ScreeningError> {
        let features = match submission {
            Submission::SpiralImage(bytes) => FeatureVector::Spiral(self.spiral.extract(bytes)?),
            Submission::VoiceWav(bytes) => FeatureVector::Voice(self.voice.extract_wav(bytes)?),
            Submission::VoiceSamples {
                samples,
                sample_rate,
            } => FeatureVector::Voice(self.voice.extract(samples, *sample_rate)?),
            Submission::PostureImage(bytes) => FeatureVector::Posture(
                self.posture.extract_image(bytes, self.detector.as_deref())?,
            ),
            Submission::PostureKeypoints { keypoints, frame } => {
                FeatureVector::Posture(self.posture.extract_keypoints(keypoints, *frame)?)
            }
            Submission::PostureSequence { frames, frame, fps } => {
                FeatureVector::Posture(self.posture.extract_sequence(frames, *frame, *fps)?)
            }
            Submission::Questionnaire(_) => return Ok(None),
        };

        if self.strict && features.quality_flags().contains(&QualityFlag::DegenerateSignal) {
            return Err(ScreeningError::DegenerateSignal(format!(
                "{} input carries no usable signal",
                features.modality()
            )));
        }
        Ok(Some(features))
    }

    /// Extract and classify one submission
    pub fn assess(&self, submission: &Submission) -> Result<Assessment, ScreeningError> {
        let modality = submission.modality();
        log::debug!("Assessing {} ({})", modality, submission.describe());

        let assessment = match submission {
            Submission::Questionnaire(answers) => Assessment {
                features: None,
                result: self.questionnaire.score(answers)?,
            },
            _ => {
                let features = self.extract(submission)?.ok_or_else(|| {
                    ScreeningError::InvalidInput(format!("{modality} produced no features"))
                })?;
                let result = classify(
                    &features,
                    self.classifier.as_ref(),
                    &self.config.classifier.score_bands,
                    self.placement,
                )?;
                Assessment {
                    features: Some(features),
                    result,
                }
            }
        };

        log::debug!(
            "{} assessed: score {}, status {}, confidence {}",
            modality,
            assessment.result.score,
            assessment.result.status,
            assessment.result.confidence
        );
        Ok(assessment)
    }

    /// Assess a submission and store it in the session.
    ///
    /// On error the session is left untouched.
    pub fn submit(
        &self,
        session: &mut AssessmentSession,
        submission: Submission,
    ) -> Result<AssessmentResult, ScreeningError> {
        let assessment = self.assess(&submission)?;
        let result = assessment.result.clone();
        session.store(into_record(submission, assessment));
        Ok(result)
    }

    /// Overall assessment over the session's present modalities
    pub fn overall(&self, session: &AssessmentSession) -> Option<OverallAssessment> {
        self.aggregate(&session.results())
    }

    pub fn aggregate(
        &self,
        results: &BTreeMap<Modality, AssessmentResult>,
    ) -> Option<OverallAssessment> {
        self.aggregator.aggregate(results)
    }
}

pub(crate) fn into_record(submission: Submission, assessment: Assessment) -> ModalityRecord {
    ModalityRecord {
        modality: submission.modality(),
        input: submission,
        features: assessment.features,
        result: assessment.result,
        submitted_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::UnavailableClassifier;
    use crate::extractors::FrameSize;
    use crate::synthetic::{encode_png, encode_wav, spiral_image, tone, upright_keypoints, FixedKeypointDetector};
    use crate::types::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spiral_to_assessment() {
        let png = encode_png(&spiral_image(224, 4.0, 0.0)).unwrap();
        let result = spiral_to_assessment(&png).unwrap();

        assert!(result.score <= 100);
        assert!(result.details.contains("tremor"));
    }

    #[test]
    fn test_voice_to_assessment() {
        let wav = encode_wav(&tone(200.0, 16_000, 1.0, 0.5), 16_000).unwrap();
        let result = voice_to_assessment(&wav).unwrap();

        assert_eq!(result.status, Severity::Healthy);
        assert!(result.details.contains("mfcc: ["));
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let screener = Screener::new();
        let submission = Submission::SpiralImage(encode_png(&spiral_image(200, 5.0, 2.0)).unwrap());

        assert_eq!(
            screener.assess(&submission).unwrap(),
            screener.assess(&submission).unwrap()
        );
    }

    #[test]
    fn test_submit_stores_and_replaces() {
        let screener = Screener::new();
        let mut session = AssessmentSession::new();
        let frame = FrameSize::new(640, 480);

        screener
            .submit(
                &mut session,
                Submission::PostureKeypoints {
                    keypoints: upright_keypoints(frame),
                    frame,
                },
            )
            .unwrap();
        let first = session.record(Modality::Posture).unwrap().submitted_at;

        screener
            .submit(
                &mut session,
                Submission::PostureKeypoints {
                    keypoints: upright_keypoints(frame),
                    frame,
                },
            )
            .unwrap();

        let record = session.record(Modality::Posture).unwrap();
        assert!(record.submitted_at >= first);
        assert_eq!(session.results().len(), 1);
        assert!(record.features.is_some());
    }

    #[test]
    fn test_failed_submission_keeps_previous_record() {
        let screener = Screener::new();
        let mut session = AssessmentSession::new();
        let png = encode_png(&spiral_image(224, 4.0, 0.0)).unwrap();
        let stored = screener.submit(&mut session, Submission::SpiralImage(png)).unwrap();

        let failed = screener.submit(&mut session, Submission::SpiralImage(b"not an image".to_vec()));

        assert!(matches!(failed, Err(ScreeningError::InvalidInput(_))));
        assert_eq!(session.record(Modality::Spiral).unwrap().result, stored);
    }

    #[test]
    fn test_posture_image_needs_detector() {
        let png = encode_png(&spiral_image(320, 2.0, 0.0)).unwrap();
        let submission = Submission::PostureImage(png);

        assert!(matches!(
            Screener::new().assess(&submission),
            Err(ScreeningError::ModelUnavailable(_))
        ));

        let detector = FixedKeypointDetector::new(upright_keypoints(FrameSize::new(320, 320)));
        let screener = Screener::new().with_keypoint_detector(Arc::new(detector));
        assert!(screener.assess(&submission).is_ok());
    }

    #[test]
    fn test_unavailable_classifier_does_not_block_questionnaire() {
        let screener = Screener::new().with_classifier(Arc::new(UnavailableClassifier));
        let png = encode_png(&spiral_image(224, 4.0, 0.0)).unwrap();

        assert!(matches!(
            screener.assess(&Submission::SpiralImage(png)),
            Err(ScreeningError::ModelUnavailable(_))
        ));
        assert!(screener
            .assess(&Submission::Questionnaire(SymptomQuestionnaire::default()))
            .is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_silence() {
        let silence = Submission::VoiceSamples {
            samples: vec![0.0; 16_000],
            sample_rate: 16_000,
        };

        assert!(Screener::new().assess(&silence).is_ok());
        assert!(matches!(
            Screener::new().with_strict_signals(true).assess(&silence),
            Err(ScreeningError::DegenerateSignal(_))
        ));
    }

    #[test]
    fn test_empty_session_has_no_overall() {
        let screener = Screener::new();
        assert!(screener.overall(&AssessmentSession::new()).is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScreeningConfig::default();
        config.extraction_timeout_ms = 0;

        assert!(matches!(
            Screener::from_config(config),
            Err(ScreeningError::ConfigError(_))
        ));
    }
}
