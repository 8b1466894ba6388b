//! Screen CLI - Command-line interface for Neuroscreen
//!
//! Commands:
//! - spiral / voice / posture / questionnaire: assess a single modality
//! - assess: run a full session and print the report
//! - config: print the effective configuration
//! - doctor: diagnose configuration and run a synthetic self-test

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use neuroscreen::aggregator::recommendation;
use neuroscreen::synthetic::{encode_png, encode_wav, spiral_image, tone};
use neuroscreen::{
    AssessmentResult, FrameSize, Keypoints, ReportEncoder, Screener, ScreeningConfig,
    ScreeningError, ScreeningService, Submission, SymptomQuestionnaire, NEUROSCREEN_VERSION,
    PRODUCER_NAME,
};

/// Screen - On-device multi-modal screening engine
#[derive(Parser)]
#[command(name = "screen")]
#[command(version = NEUROSCREEN_VERSION)]
#[command(about = "Assess spiral, voice, posture and questionnaire inputs", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults to the reference calibration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail on blank or silent input instead of scoring it
    #[arg(long, global = true)]
    strict: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a spiral drawing photograph
    Spiral {
        /// Image file path (use - for stdin)
        input: PathBuf,
    },

    /// Assess a WAV voice recording
    Voice {
        /// WAV file path (use - for stdin)
        input: PathBuf,
    },

    /// Assess posture keypoints (single frame or walking sequence, JSON)
    Posture {
        /// Keypoints file path (use - for stdin)
        input: PathBuf,
    },

    /// Score a symptom questionnaire (JSON)
    Questionnaire {
        /// Questionnaire file path (use - for stdin)
        input: PathBuf,
    },

    /// Run a full session over any subset of modalities and print the report
    Assess {
        #[arg(long)]
        spiral: Option<PathBuf>,

        #[arg(long)]
        voice: Option<PathBuf>,

        /// Keypoints JSON
        #[arg(long)]
        posture: Option<PathBuf>,

        #[arg(long)]
        questionnaire: Option<PathBuf>,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,

    /// Diagnose configuration and run a synthetic self-test
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Keypoint input file: one frame or a walking sequence
#[derive(Deserialize)]
#[serde(untagged)]
enum PostureInput {
    Sequence {
        frames: Vec<Keypoints>,
        frame: FrameSize,
        fps: f64,
    },
    Single {
        keypoints: Keypoints,
        frame: FrameSize,
    },
}

impl From<PostureInput> for Submission {
    fn from(input: PostureInput) -> Self {
        match input {
            PostureInput::Sequence { frames, frame, fps } => {
                Submission::PostureSequence { frames, frame, fps }
            }
            PostureInput::Single { keypoints, frame } => {
                Submission::PostureKeypoints { keypoints, frame }
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ScreenCliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Spiral { input } => {
            let submission = Submission::SpiralImage(read_bytes(&input)?);
            cmd_single(config, cli.strict, submission, cli.pretty)
        }
        Commands::Voice { input } => {
            let submission = Submission::VoiceWav(read_bytes(&input)?);
            cmd_single(config, cli.strict, submission, cli.pretty)
        }
        Commands::Posture { input } => {
            let submission = read_posture(&input)?;
            cmd_single(config, cli.strict, submission, cli.pretty)
        }
        Commands::Questionnaire { input } => {
            let submission = read_questionnaire(&input)?;
            cmd_single(config, cli.strict, submission, cli.pretty)
        }
        Commands::Assess {
            spiral,
            voice,
            posture,
            questionnaire,
            output,
        } => {
            let mut submissions = Vec::new();
            if let Some(path) = spiral {
                submissions.push(Submission::SpiralImage(read_bytes(&path)?));
            }
            if let Some(path) = voice {
                submissions.push(Submission::VoiceWav(read_bytes(&path)?));
            }
            if let Some(path) = posture {
                submissions.push(read_posture(&path)?);
            }
            if let Some(path) = questionnaire {
                submissions.push(read_questionnaire(&path)?);
            }
            cmd_assess(config, cli.strict, submissions, output.as_deref())
        }
        Commands::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), config, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScreeningConfig, ScreenCliError> {
    match path {
        Some(path) => Ok(ScreeningConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(ScreeningConfig::default()),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ScreenCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(path)?)
    }
}

fn read_text(path: &Path) -> Result<String, ScreenCliError> {
    String::from_utf8(read_bytes(path)?).map_err(|e| ScreenCliError::Parse(e.to_string()))
}

fn read_posture(path: &Path) -> Result<Submission, ScreenCliError> {
    let input: PostureInput = serde_json::from_str(&read_text(path)?)?;
    Ok(input.into())
}

fn read_questionnaire(path: &Path) -> Result<Submission, ScreenCliError> {
    let answers = SymptomQuestionnaire::from_json(&read_text(path)?)?;
    Ok(Submission::Questionnaire(answers))
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, ScreenCliError> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn cmd_single(
    config: ScreeningConfig,
    strict: bool,
    submission: Submission,
    pretty: bool,
) -> Result<(), ScreenCliError> {
    let screener = Screener::from_config(config)?.with_strict_signals(strict);
    let result: AssessmentResult = screener.assess(&submission)?.result;
    println!("{}", to_json(&result, pretty)?);
    Ok(())
}

fn cmd_assess(
    config: ScreeningConfig,
    strict: bool,
    submissions: Vec<Submission>,
    output: Option<&Path>,
) -> Result<(), ScreenCliError> {
    if submissions.is_empty() {
        return Err(ScreenCliError::NoInputs);
    }

    let screener = Screener::from_config(config)?.with_strict_signals(strict);
    let service = ScreeningService::new(screener);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_time().build()?;
    let session = runtime.block_on(async {
        let tasks: Vec<_> = submissions
            .into_iter()
            .map(|submission| {
                let service = service.clone();
                tokio::spawn(async move {
                    let modality = submission.modality();
                    (modality, service.submit(submission).await)
                })
            })
            .collect();

        for task in tasks {
            match task.await {
                Ok((_, Ok(_))) => {}
                // A failed modality is left out of the overall assessment
                Ok((modality, Err(e))) => log::warn!("{modality} assessment failed: {e}"),
                Err(e) => log::warn!("Submission task failed: {e}"),
            }
        }
        service.snapshot().await
    });

    let report = ReportEncoder::new().encode_to_json(service.screener(), &session)?;

    match output {
        Some(path) => fs::write(path, report)?,
        None => println!("{}", report),
    }
    Ok(())
}

fn cmd_doctor(
    config_path: Option<&Path>,
    config: ScreeningConfig,
    json: bool,
) -> Result<(), ScreenCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "neuroscreen_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Neuroscreen version {}", NEUROSCREEN_VERSION),
    });

    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: match config_path {
            Some(path) => format!("Loaded {} (calibration {})", path.display(), config.calibration_version),
            None => format!("Reference calibration {}", config.calibration_version),
        },
    });

    let screener = Screener::from_config(config)?;
    checks.push(DoctorCheck {
        name: "classifier".to_string(),
        status: CheckStatus::Warning,
        message: format!(
            "Using '{}' classifier; scores are not clinically validated",
            screener.classifier_name()
        ),
    });

    checks.push(self_test("spiral_self_test", || {
        let png = encode_png(&spiral_image(224, 4.0, 0.0))?;
        screener.assess(&Submission::SpiralImage(png)).map(|a| a.result)
    }));
    checks.push(self_test("voice_self_test", || {
        let wav = encode_wav(&tone(180.0, 16_000, 1.0, 0.5), 16_000)?;
        screener.assess(&Submission::VoiceWav(wav)).map(|a| a.result)
    }));
    checks.push(self_test("questionnaire_self_test", || {
        screener
            .assess(&Submission::Questionnaire(SymptomQuestionnaire::default()))
            .map(|a| a.result)
    }));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NEUROSCREEN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Screen Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ScreenCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn self_test(
    name: &str,
    test: impl FnOnce() -> Result<AssessmentResult, ScreeningError>,
) -> DoctorCheck {
    match test() {
        Ok(result) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "score {} ({}): {}",
                result.score,
                result.status,
                recommendation(result.status)
            ),
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

// Error handling

enum ScreenCliError {
    Io(io::Error),
    Screening(ScreeningError),
    Json(serde_json::Error),
    Parse(String),
    NoInputs,
    DoctorFailed,
}

impl From<io::Error> for ScreenCliError {
    fn from(e: io::Error) -> Self {
        ScreenCliError::Io(e)
    }
}

impl From<ScreeningError> for ScreenCliError {
    fn from(e: ScreeningError) -> Self {
        ScreenCliError::Screening(e)
    }
}

impl From<serde_json::Error> for ScreenCliError {
    fn from(e: serde_json::Error) -> Self {
        ScreenCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ScreenCliError> for CliError {
    fn from(e: ScreenCliError) -> Self {
        match e {
            ScreenCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ScreenCliError::Screening(e) => {
                let hint = match &e {
                    ScreeningError::ConfigError(_) => Some("Run 'screen config' for a valid template"),
                    ScreeningError::DegenerateSignal(_) => Some("Retake the input or drop --strict"),
                    ScreeningError::ModelUnavailable(_) => Some("Submit keypoints instead of a photograph"),
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            ScreenCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ScreenCliError::Parse(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
            ScreenCliError::NoInputs => CliError {
                code: "NO_INPUTS".to_string(),
                message: "No modality inputs given".to_string(),
                hint: Some("Pass at least one of --spiral, --voice, --posture, --questionnaire".to_string()),
            },
            ScreenCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
