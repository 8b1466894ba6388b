//! End-to-end screening scenarios through the public API

use std::collections::BTreeMap;

use neuroscreen::aggregator::recommendation;
use neuroscreen::synthetic::{
    encode_png, encode_wav, faltering_voice, spiral_image, tone, upright_keypoints, walking_sequence,
};
use neuroscreen::{
    AssessmentResult, AssessmentSession, FeatureVector, FrameSize, Modality, ReportEncoder,
    Screener, ScreeningError, Severity, Submission, SymptomQuestionnaire,
};
use pretty_assertions::assert_eq;

fn high_risk_answers() -> SymptomQuestionnaire {
    SymptomQuestionnaire {
        age: 65,
        family_history: true,
        tremor: 8,
        stiffness: 7,
        balance: 6,
        has_freeze: true,
        has_sleep_issues: true,
        notes: String::new(),
    }
}

fn result(score: u8, status: Severity) -> AssessmentResult {
    AssessmentResult {
        score,
        confidence: 80,
        status,
        details: String::new(),
    }
}

#[test]
fn test_healthy_spiral_and_severe_voice_is_severe() {
    let screener = Screener::new();
    let mut results = BTreeMap::new();
    results.insert(Modality::Spiral, result(92, Severity::Healthy));
    results.insert(Modality::Voice, result(20, Severity::Severe));

    let overall = screener.aggregate(&results).unwrap();

    assert_eq!(overall.score, 56);
    assert_eq!(overall.status, Severity::Severe);
    assert!(overall.escalated);
    assert_eq!(overall.recommendation, recommendation(Severity::Severe));
}

#[test]
fn test_extracted_clean_spiral_and_faltering_voice_escalate_to_severe() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();

    let spiral = encode_png(&spiral_image(224, 4.0, 0.0)).unwrap();
    let spiral_result = screener.submit(&mut session, Submission::SpiralImage(spiral)).unwrap();
    assert_eq!(spiral_result.status, Severity::Healthy);

    let voice = encode_wav(&faltering_voice(16_000, 1.0, 7), 16_000).unwrap();
    let voice_result = screener.submit(&mut session, Submission::VoiceWav(voice)).unwrap();
    assert_eq!(voice_result.status, Severity::Severe);

    let overall = screener.overall(&session).unwrap();
    assert_eq!(overall.status, Severity::Severe);
    assert!(overall.escalated);
    assert_eq!(overall.modalities, vec![Modality::Spiral, Modality::Voice]);
}

#[test]
fn test_wav_with_implausible_sample_rate_is_rejected() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    let wav = encode_wav(&tone(200.0, 8_000, 0.008, 0.5), u32::MAX / 2).unwrap();

    let result = screener.submit(&mut session, Submission::VoiceWav(wav));

    assert!(matches!(result, Err(ScreeningError::InvalidInput(_))));
    assert!(session.record(Modality::Voice).is_none());
}

#[test]
fn test_high_risk_questionnaire_dominates_session() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    let frame = FrameSize::new(640, 480);

    let voice = encode_wav(&tone(200.0, 16_000, 1.0, 0.5), 16_000).unwrap();
    let voice_result = screener.submit(&mut session, Submission::VoiceWav(voice)).unwrap();
    assert_eq!(voice_result.status, Severity::Healthy);

    screener
        .submit(
            &mut session,
            Submission::PostureKeypoints {
                keypoints: upright_keypoints(frame),
                frame,
            },
        )
        .unwrap();

    let questionnaire = screener
        .submit(&mut session, Submission::Questionnaire(high_risk_answers()))
        .unwrap();
    assert_eq!(questionnaire.score, 0);
    assert_eq!(questionnaire.status, Severity::Severe);

    let overall = screener.overall(&session).unwrap();
    assert_eq!(overall.status, Severity::Severe);
    assert_eq!(
        overall.modalities,
        vec![Modality::Voice, Modality::Posture, Modality::Questionnaire]
    );
}

#[test]
fn test_empty_session_then_reset() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    assert!(screener.overall(&session).is_none());

    screener
        .submit(&mut session, Submission::Questionnaire(SymptomQuestionnaire::default()))
        .unwrap();
    assert!(screener.overall(&session).is_some());

    let id = session.id();
    session.reset();

    assert_eq!(session.id(), id);
    assert!(screener.overall(&session).is_none());
}

#[test]
fn test_identical_spiral_images_give_identical_features() {
    let screener = Screener::new();
    let png = encode_png(&spiral_image(256, 5.0, 1.5)).unwrap();

    let first = screener.extract(&Submission::SpiralImage(png.clone())).unwrap();
    let second = screener.extract(&Submission::SpiralImage(png)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_silent_recording_scores_without_error() {
    let screener = Screener::new();
    let wav = encode_wav(&vec![0.0; 16_000], 16_000).unwrap();

    let features = screener.extract(&Submission::VoiceWav(wav)).unwrap();

    match features {
        Some(FeatureVector::Voice(voice)) => {
            assert_eq!(voice.jitter, 0.0);
            assert_eq!(voice.shimmer, 0.0);
        }
        other => panic!("expected voice features, got {other:?}"),
    }
}

#[test]
fn test_walking_sequence_reports_gait() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    let frame = FrameSize::new(640, 480);

    screener
        .submit(
            &mut session,
            Submission::PostureSequence {
                frames: walking_sequence(frame, 120, 30.0, 110.0, 1.0),
                frame,
                fps: 30.0,
            },
        )
        .unwrap();

    match &session.record(Modality::Posture).unwrap().features {
        Some(FeatureVector::Posture(posture)) => {
            let gait = posture.gait_parameters.as_ref().unwrap();
            assert!((gait.cadence - 110.0).abs() < 10.0);
        }
        other => panic!("expected posture features, got {other:?}"),
    }
}

#[test]
fn test_failed_modality_leaves_others_untouched() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    screener
        .submit(&mut session, Submission::Questionnaire(SymptomQuestionnaire::default()))
        .unwrap();

    let failed = screener.submit(&mut session, Submission::VoiceWav(b"RIFF".to_vec()));

    assert!(matches!(failed, Err(ScreeningError::InvalidInput(_))));
    assert_eq!(session.results().len(), 1);
    assert!(session.record(Modality::Voice).is_none());
}

#[test]
fn test_report_round_trips_through_json() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    screener
        .submit(&mut session, Submission::Questionnaire(high_risk_answers()))
        .unwrap();

    let json = ReportEncoder::new().encode_to_json(&screener, &session).unwrap();
    let report: neuroscreen::types::AssessmentReport = serde_json::from_str(&json).unwrap();

    assert_eq!(report.modalities.len(), 1);
    assert_eq!(report.overall.unwrap().status, Severity::Severe);
}
