//! Asynchronous screening front
//!
//! [`ScreeningService`] shares one [`Screener`] and one [`AssessmentSession`]
//! between UI tasks. Each submission runs on the blocking pool under the
//! configured timeout. Submissions for the same modality are serialized; those
//! for different modalities run independently. A submission that started
//! before a reset is discarded rather than written into the cleared session.

use crate::error::ScreeningError;
use crate::pipeline::{into_record, Screener};
use crate::session::{AssessmentSession, Submission};
use crate::types::{AssessmentResult, Modality, OverallAssessment};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Shared, cloneable handle to a screening session
#[derive(Clone)]
pub struct ScreeningService {
    screener: Arc<Screener>,
    session: Arc<RwLock<AssessmentSession>>,
    in_flight: Arc<BTreeMap<Modality, Mutex<()>>>,
}

impl ScreeningService {
    pub fn new(screener: Screener) -> Self {
        let in_flight = Modality::ALL
            .into_iter()
            .map(|modality| (modality, Mutex::new(())))
            .collect();
        Self {
            screener: Arc::new(screener),
            session: Arc::new(RwLock::new(AssessmentSession::new())),
            in_flight: Arc::new(in_flight),
        }
    }

    pub fn screener(&self) -> &Screener {
        &self.screener
    }

    /// Assess a submission off the async runtime and record the result
    pub async fn submit(&self, submission: Submission) -> Result<AssessmentResult, ScreeningError> {
        let modality = submission.modality();
        let lock = self
            .in_flight
            .get(&modality)
            .ok_or_else(|| ScreeningError::InvalidInput(format!("unknown modality {modality}")))?;
        let _guard = lock.lock().await;

        let generation = self.session.read().await.generation();
        let timeout_ms = self.screener.config().extraction_timeout_ms;

        let screener = Arc::clone(&self.screener);
        let task = tokio::task::spawn_blocking(move || {
            let assessment = screener.assess(&submission)?;
            Ok::<_, ScreeningError>((submission, assessment))
        });

        let (submission, assessment) =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
                Err(_) => {
                    log::warn!("{modality} extraction exceeded {timeout_ms} ms");
                    return Err(ScreeningError::Timeout(timeout_ms));
                }
                Ok(Err(join_error)) => {
                    return Err(ScreeningError::TaskFailed(join_error.to_string()));
                }
                Ok(Ok(outcome)) => outcome?,
            };

        let mut session = self.session.write().await;
        if session.generation() != generation {
            log::warn!("Discarding {modality} result: session was reset during extraction");
            return Err(ScreeningError::SessionReset);
        }
        let result = assessment.result.clone();
        session.store(into_record(submission, assessment));
        Ok(result)
    }

    /// Overall assessment from a snapshot of the present results
    pub async fn overall(&self) -> Option<OverallAssessment> {
        let results = self.session.read().await.results();
        self.screener.aggregate(&results)
    }

    pub async fn results(&self) -> BTreeMap<Modality, AssessmentResult> {
        self.session.read().await.results()
    }

    /// Copy of the current session
    pub async fn snapshot(&self) -> AssessmentSession {
        self.session.read().await.clone()
    }

    /// Clear every record; in-flight submissions will be discarded
    pub async fn reset(&self) {
        self.session.write().await.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassProbabilities, Classifier};
    use crate::config::ScreeningConfig;
    use crate::questionnaire::SymptomQuestionnaire;
    use crate::synthetic::{encode_png, spiral_image};
    use crate::types::{FeatureVector, Severity};

    /// Classifier that sleeps before every prediction
    struct SlowClassifier(Duration);

    impl Classifier for SlowClassifier {
        fn name(&self) -> &str {
            "slow"
        }

        fn predict(&self, _features: &FeatureVector) -> Result<ClassProbabilities, ScreeningError> {
            std::thread::sleep(self.0);
            ClassProbabilities::new([0.7, 0.2, 0.05, 0.05])
        }
    }

    fn spiral_submission() -> Submission {
        Submission::SpiralImage(encode_png(&spiral_image(160, 3.0, 0.0)).unwrap())
    }

    fn slow_service(delay_ms: u64, timeout_ms: u64) -> ScreeningService {
        let mut config = ScreeningConfig::default();
        config.extraction_timeout_ms = timeout_ms;
        let screener = Screener::from_config(config)
            .unwrap()
            .with_classifier(Arc::new(SlowClassifier(Duration::from_millis(delay_ms))));
        ScreeningService::new(screener)
    }

    #[tokio::test]
    async fn test_submit_and_aggregate() {
        let service = ScreeningService::new(Screener::new());

        service.submit(spiral_submission()).await.unwrap();
        service
            .submit(Submission::Questionnaire(SymptomQuestionnaire::default()))
            .await
            .unwrap();

        let overall = service.overall().await.unwrap();
        assert_eq!(overall.modalities, vec![Modality::Spiral, Modality::Questionnaire]);
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let service = slow_service(300, 50);

        let result = service.submit(spiral_submission()).await;

        assert!(matches!(result, Err(ScreeningError::Timeout(50))));
        assert!(service.results().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_submission() {
        let service = slow_service(200, 5_000);

        let pending = {
            let service = service.clone();
            tokio::spawn(async move { service.submit(spiral_submission()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.reset().await;

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(ScreeningError::SessionReset)));
        assert!(service.overall().await.is_none());
    }

    #[tokio::test]
    async fn test_different_modalities_are_independent() {
        let service = slow_service(100, 5_000);

        let (spiral, questionnaire) = tokio::join!(
            service.submit(spiral_submission()),
            service.submit(Submission::Questionnaire(SymptomQuestionnaire::default())),
        );

        assert_eq!(spiral.unwrap().status, Severity::Healthy);
        assert_eq!(questionnaire.unwrap().score, 100);
        assert_eq!(service.results().await.len(), 2);
    }

    #[tokio::test]
    async fn test_last_submission_wins() {
        let service = ScreeningService::new(Screener::new());
        let mild = SymptomQuestionnaire {
            age: 70,
            tremor: 2,
            ..Default::default()
        };

        service
            .submit(Submission::Questionnaire(SymptomQuestionnaire::default()))
            .await
            .unwrap();
        service.submit(Submission::Questionnaire(mild)).await.unwrap();

        let results = service.results().await;
        // 100 - 15 - 6
        assert_eq!(results[&Modality::Questionnaire].score, 79);
    }
}
