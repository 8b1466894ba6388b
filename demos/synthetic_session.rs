//! Run a full screening session over synthetic inputs and print the report

use neuroscreen::synthetic::{encode_png, encode_wav, spiral_image, tremulous_voice, walking_sequence};
use neuroscreen::{
    AssessmentSession, FrameSize, ReportEncoder, Screener, Submission, SymptomQuestionnaire,
};

fn main() {
    let screener = Screener::new();
    let mut session = AssessmentSession::new();
    let frame = FrameSize::new(640, 480);

    let submissions = [
        encode_png(&spiral_image(320, 5.0, 3.0)).map(Submission::SpiralImage),
        encode_wav(&tremulous_voice(16_000, 2.0, 7), 16_000).map(Submission::VoiceWav),
        Ok(Submission::PostureSequence {
            frames: walking_sequence(frame, 90, 30.0, 110.0, 0.3),
            frame,
            fps: 30.0,
        }),
        Ok(Submission::Questionnaire(SymptomQuestionnaire {
            age: 68,
            tremor: 4,
            stiffness: 3,
            ..Default::default()
        })),
    ];

    for submission in submissions {
        match submission.and_then(|s| screener.submit(&mut session, s)) {
            Ok(result) => eprintln!("{} ({}): {}", result.score, result.status, result.details),
            Err(e) => eprintln!("Error: {e:?}"),
        }
    }

    match ReportEncoder::new().encode_to_json(&screener, &session) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
