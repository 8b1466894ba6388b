//! Report encoding
//!
//! This module encodes a session snapshot into a versioned JSON report with
//! producer metadata, provenance timestamps, per-modality features and quality
//! flags, and the overall assessment.

use crate::error::ScreeningError;
use crate::pipeline::Screener;
use crate::session::AssessmentSession;
use crate::types::{AssessmentReport, ModalityReport, ReportProducer, ReportProvenance};
use crate::{NEUROSCREEN_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for session reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a session snapshot into a report
    pub fn encode(&self, screener: &Screener, session: &AssessmentSession) -> AssessmentReport {
        let computed_at = Utc::now();

        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: NEUROSCREEN_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            session_id: session.id().to_string(),
            session_created_at_utc: session.created_at().to_rfc3339(),
            computed_at_utc: computed_at.to_rfc3339(),
        };

        let modalities = session
            .records()
            .map(|record| ModalityReport {
                modality: record.modality,
                input: record.input.describe(),
                submitted_at_utc: record.submitted_at.to_rfc3339(),
                quality_flags: record
                    .features
                    .as_ref()
                    .map(|f| f.quality_flags().iter().map(|q| q.as_str().to_string()).collect())
                    .unwrap_or_default(),
                features: record.features.clone(),
                result: record.result.clone(),
            })
            .collect();

        AssessmentReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            calibration_version: screener.config().calibration_version.clone(),
            classifier: screener.classifier_name().to_string(),
            modalities,
            overall: screener.overall(session),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        screener: &Screener,
        session: &AssessmentSession,
    ) -> Result<String, ScreeningError> {
        let report = self.encode(screener, session);
        serde_json::to_string_pretty(&report).map_err(ScreeningError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CALIBRATION_VERSION;
    use crate::questionnaire::SymptomQuestionnaire;
    use crate::session::Submission;
    use crate::types::{Modality, Severity};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_session_report() {
        let screener = Screener::new();
        let mut session = AssessmentSession::new();
        screener
            .submit(
                &mut session,
                Submission::VoiceSamples {
                    samples: vec![0.0; 8_000],
                    sample_rate: 8_000,
                },
            )
            .unwrap();
        screener
            .submit(&mut session, Submission::Questionnaire(SymptomQuestionnaire::default()))
            .unwrap();

        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&screener, &session);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, NEUROSCREEN_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.provenance.session_id, session.id().to_string());
        assert_eq!(report.calibration_version, CALIBRATION_VERSION);
        assert_eq!(report.classifier, "reference");

        assert_eq!(report.modalities.len(), 2);
        let voice = &report.modalities[0];
        assert_eq!(voice.modality, Modality::Voice);
        assert_eq!(voice.input, "pcm, 8000 samples at 8000 Hz");
        assert_eq!(voice.quality_flags, vec!["degenerate_signal".to_string()]);

        let questionnaire = &report.modalities[1];
        assert!(questionnaire.features.is_none());
        assert!(questionnaire.quality_flags.is_empty());

        let overall = report.overall.unwrap();
        assert_eq!(overall.status, Severity::Healthy);
    }

    #[test]
    fn test_empty_session_report_has_no_overall() {
        let json = ReportEncoder::new()
            .encode_to_json(&Screener::new(), &AssessmentSession::new())
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed.get("producer").is_some());
        assert!(parsed.get("provenance").is_some());
        assert_eq!(parsed["modalities"], serde_json::json!([]));
        assert!(parsed["overall"].is_null());
    }
}
