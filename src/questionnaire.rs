//! Symptom questionnaire scoring
//!
//! Rule-based: the score starts at 100 and each reported risk factor subtracts
//! a configured penalty. The result is clipped to [0, 100] and banded with the
//! same thresholds as the overall assessment.

use crate::config::{QuestionnaireConfig, SeverityThresholds};
use crate::error::ScreeningError;
use crate::types::AssessmentResult;
use serde::{Deserialize, Serialize};

/// Highest value of a 0-10 symptom rating
pub const MAX_RATING: u8 = 10;

/// Self-reported symptom questionnaire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomQuestionnaire {
    pub age: u32,
    #[serde(alias = "familyHistory")]
    pub family_history: bool,
    /// Tremor severity, 0-10
    pub tremor: u8,
    /// Stiffness severity, 0-10
    pub stiffness: u8,
    /// Balance problems, 0-10
    pub balance: u8,
    #[serde(alias = "hasFreeze")]
    pub has_freeze: bool,
    #[serde(alias = "hasSleepIssues")]
    pub has_sleep_issues: bool,
    #[serde(default)]
    pub notes: String,
}

impl SymptomQuestionnaire {
    pub fn from_json(json: &str) -> Result<Self, ScreeningError> {
        let questionnaire: Self = serde_json::from_str(json)?;
        questionnaire.validate()?;
        Ok(questionnaire)
    }

    /// Reject ratings outside 0-10
    pub fn validate(&self) -> Result<(), ScreeningError> {
        for (name, rating) in [
            ("tremor", self.tremor),
            ("stiffness", self.stiffness),
            ("balance", self.balance),
        ] {
            if rating > MAX_RATING {
                return Err(ScreeningError::InvalidInput(format!(
                    "{name} rating must be 0-{MAX_RATING}, got {rating}"
                )));
            }
        }
        Ok(())
    }
}

/// Scores a questionnaire against the penalty table
#[derive(Debug, Clone, Default)]
pub struct QuestionnaireScorer {
    config: QuestionnaireConfig,
    thresholds: SeverityThresholds,
}

impl QuestionnaireScorer {
    pub fn new(config: QuestionnaireConfig, thresholds: SeverityThresholds) -> Self {
        Self { config, thresholds }
    }

    /// Named penalties that apply to the answers, in questionnaire order
    pub fn penalties(&self, q: &SymptomQuestionnaire) -> Vec<(&'static str, f64)> {
        let c = &self.config;
        let mut penalties = Vec::new();

        if q.age > c.age_threshold {
            penalties.push(("age", c.age_penalty));
        }
        if q.family_history {
            penalties.push(("family_history", c.family_history_penalty));
        }
        for (name, rating, per_point) in [
            ("tremor", q.tremor, c.tremor_per_point),
            ("stiffness", q.stiffness, c.stiffness_per_point),
            ("balance", q.balance, c.balance_per_point),
        ] {
            if rating > 0 {
                penalties.push((name, rating as f64 * per_point));
            }
        }
        if q.has_freeze {
            penalties.push(("freezing", c.freeze_penalty));
        }
        if q.has_sleep_issues {
            penalties.push(("sleep", c.sleep_penalty));
        }

        penalties
    }

    pub fn score(&self, q: &SymptomQuestionnaire) -> Result<AssessmentResult, ScreeningError> {
        q.validate()?;

        let penalties = self.penalties(q);
        let total: f64 = penalties.iter().map(|(_, p)| p).sum();
        let score = (100.0 - total).clamp(0.0, 100.0);
        let status = self.thresholds.classify(score);

        let details = if penalties.is_empty() {
            "no risk factors reported".to_string()
        } else {
            let listed: Vec<String> = penalties
                .iter()
                .map(|(name, penalty)| format!("{name}: -{penalty:.0}"))
                .collect();
            format!("{}; total penalty: {total:.0}", listed.join("; "))
        };

        log::debug!("Questionnaire penalty {total:.0}, score {score:.0}, status {status}");

        Ok(AssessmentResult {
            score: score.round() as u8,
            confidence: self.config.confidence.min(100),
            status,
            details,
        })
    }
}
