//! Combines per-modality results into an overall assessment
//!
//! The overall score and confidence are (weighted) means over the modalities
//! present. The status is banded from the mean score and then escalated to the
//! worst individual status, so one severe modality is never averaged away.

use crate::config::AggregationConfig;
use crate::types::{AssessmentResult, Modality, OverallAssessment, Severity};
use std::collections::BTreeMap;

/// Fixed recommendation text per overall status
pub fn recommendation(status: Severity) -> &'static str {
    match status {
        Severity::Healthy => {
            "No notable indicators were found. Keep up regular exercise and routine check-ups."
        }
        Severity::Mild => {
            "Some mild indicators were found. Consider repeating the screening in a few weeks \
             and mention the results at your next check-up."
        }
        Severity::Moderate => {
            "Several indicators were found. We recommend discussing these results with a \
             general practitioner."
        }
        Severity::Severe => {
            "Strong indicators were found. Please consult a neurologist for a clinical \
             evaluation. This screening is not a diagnosis."
        }
    }
}

/// Aggregates modality results under an [`AggregationConfig`]
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// `None` when no modality has a result
    pub fn aggregate(
        &self,
        results: &BTreeMap<Modality, AssessmentResult>,
    ) -> Option<OverallAssessment> {
        if results.is_empty() {
            return None;
        }

        let mut total_weight = 0.0;
        let mut score_sum = 0.0;
        let mut confidence_sum = 0.0;
        for (modality, result) in results {
            let weight = self.config.policy.weight(*modality);
            total_weight += weight;
            score_sum += weight * result.score as f64;
            confidence_sum += weight * result.confidence as f64;
        }
        if total_weight <= 0.0 {
            return None;
        }

        let mean_score = score_sum / total_weight;
        let mean_confidence = confidence_sum / total_weight;

        let banded = self.config.thresholds.classify(mean_score);
        let worst = results
            .values()
            .map(|r| r.status)
            .max()
            .unwrap_or(Severity::Healthy);
        let status = banded.max(worst);
        let escalated = status != banded;

        if escalated {
            log::debug!("Overall status escalated from {banded} to {worst}");
        }

        Some(OverallAssessment {
            score: mean_score.round().clamp(0.0, 100.0) as u8,
            confidence: mean_confidence.round().clamp(0.0, 100.0) as u8,
            status,
            recommendation: recommendation(status).to_string(),
            modalities: results.keys().copied().collect(),
            escalated,
        })
    }
}
