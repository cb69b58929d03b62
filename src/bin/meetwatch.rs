//! meetwatch CLI - Command-line interface for meetwatch
//!
//! Commands:
//! - run: Replay a host event script through a full meeting session
//! - score: Recompute the summary of an exported meeting log
//! - validate: Check that an exported meeting log is consistent
//! - doctor: Diagnose configuration and environment
//! - schema: Print the meeting log schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

use meetwatch::monitor::capture::{CaptureError, ScriptedCamera};
use meetwatch::monitor::export::DirectoryExporter;
use meetwatch::{
    parse_script, replay_session, ExportDocument, MonitorConfig, Session, SystemClock,
    MEETWATCH_VERSION, PRODUCER_NAME,
};

/// meetwatch - Behavior monitoring for video meeting sessions
#[derive(Parser)]
#[command(name = "meetwatch")]
#[command(version = MEETWATCH_VERSION)]
#[command(about = "Score meeting behavior and export meeting logs", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a host event script through a full meeting session
    Run {
        /// Participant display name
        #[arg(long)]
        name: String,

        /// Participant email
        #[arg(long)]
        email: String,

        /// Event script path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        script: PathBuf,

        /// Directory the meeting log is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Simulated capture device behavior
        #[arg(long, default_value = "granted")]
        camera: CameraMode,

        /// Configuration file (JSON)
        #[arg(long, env = "MEETWATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Export immediately instead of waiting for the configured delay
        #[arg(long)]
        no_delay: bool,
    },

    /// Recompute the summary of an exported meeting log
    Score {
        /// Meeting log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON) providing the point table
        #[arg(long, env = "MEETWATCH_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Check that an exported meeting log is consistent
    Validate {
        /// Meeting log path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON) providing the point table
        #[arg(long, env = "MEETWATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long, env = "MEETWATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the meeting log schema
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CameraMode {
    /// Capture is granted
    Granted,
    /// Permission is denied
    Denied,
    /// No capture device is present
    Unavailable,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), MeetwatchCliError> {
    match cli.command {
        Commands::Run {
            name,
            email,
            script,
            output_dir,
            camera,
            config,
            no_delay,
        } => cmd_run(
            Session::new(name, email),
            &script,
            &output_dir,
            camera,
            config.as_deref(),
            no_delay,
        ),

        Commands::Score { input, config } => cmd_score(&input, config.as_deref()),

        Commands::Validate {
            input,
            config,
            json,
        } => cmd_validate(&input, config.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_run(
    session: Session,
    script: &Path,
    output_dir: &Path,
    camera: CameraMode,
    config: Option<&Path>,
    no_delay: bool,
) -> Result<(), MeetwatchCliError> {
    let mut config = load_config(config)?;
    if no_delay {
        config = config.without_delay();
    }

    let steps = parse_script(&read_input(script)?)?;

    let mut device = match camera {
        CameraMode::Granted => ScriptedCamera::granting(),
        CameraMode::Denied => ScriptedCamera::failing(CaptureError::PermissionDenied),
        CameraMode::Unavailable => ScriptedCamera::failing(CaptureError::DeviceUnavailable),
    };
    let mut exporter = DirectoryExporter::new(output_dir);

    let report = replay_session(
        &session,
        &steps,
        &mut device,
        &mut exporter,
        Rc::new(SystemClock),
        config,
    )?;

    if !report.delivered {
        return Err(MeetwatchCliError::ExportFailed(report.file_name));
    }

    let output = RunReport {
        file: exporter
            .written()
            .last()
            .map(|p| p.display().to_string())
            .unwrap_or(report.file_name),
        summary: report.summary,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_score(input: &Path, config: Option<&Path>) -> Result<(), MeetwatchCliError> {
    let config = load_config(config)?;
    let document = ExportDocument::from_json(&read_input(input)?)?;

    let summary = document.recompute_summary(&config.points);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_validate(input: &Path, config: Option<&Path>, json: bool) -> Result<(), MeetwatchCliError> {
    let config = load_config(config)?;
    let document = ExportDocument::from_json(&read_input(input)?)?;

    let error = document.verify(&config.points).err().map(|e| e.to_string());
    let report = ValidationReport {
        user: document.user.name.clone(),
        total_events: document.events.len(),
        recorded: document.summary,
        expected: document.recompute_summary(&config.points),
        valid: error.is_none(),
        error,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("User:           {}", report.user);
        println!("Total events:   {}", report.total_events);
        println!(
            "Recorded:       windowControls={} copyPastes={} score={}",
            report.recorded.window_controls, report.recorded.copy_pastes, report.recorded.score
        );
        println!(
            "Recomputed:     windowControls={} copyPastes={} score={}",
            report.expected.window_controls, report.expected.copy_pastes, report.expected.score
        );
        if let Some(err) = &report.error {
            println!("\nError: {}", err);
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(MeetwatchCliError::ValidationFailed)
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), MeetwatchCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("meetwatch version {}", MEETWATCH_VERSION),
    });

    // Check configuration file if provided
    match config {
        Some(path) if path.exists() => match MonitorConfig::load(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration valid (export delay {} ms, audio={}, video={})",
                    config.export_delay_ms, config.capture.audio, config.capture.video
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist; defaults apply".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No configuration file; defaults apply".to_string(),
        }),
    }

    // Check stdin is available (for piped scripts)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --script to replay a file)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (script can be streamed)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MEETWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("meetwatch Doctor Report");
        println!("=======================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MeetwatchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), MeetwatchCliError> {
    if json_schema {
        println!("{}", get_log_json_schema());
    } else {
        println!("Meeting log: <name>_meeting_log.json");
        println!();
        println!("- user: {{ name, email }}");
        println!("- events: ordered array of {{ type, timestamp }}");
        println!("  - type: windowControl | tabSwitch | copyPaste | cameraOff");
        println!("  - timestamp: ISO-8601 UTC with milliseconds");
        println!("- summary: {{ windowControls, copyPastes, score }}");
        println!("  - score: sum of per-event points capped at 100");
        println!("    (windowControl 10, tabSwitch 10, copyPaste 5, cameraOff 20)");
    }
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, MeetwatchCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, MeetwatchCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::load(path)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn get_log_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "meeting_log",
        "description": "meetwatch meeting log export",
        "type": "object",
        "required": ["user", "events", "summary"],
        "properties": {
            "user": {
                "type": "object",
                "required": ["name", "email"],
                "properties": {
                    "name": { "type": "string" },
                    "email": { "type": "string", "format": "email" }
                }
            },
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type", "timestamp"],
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["windowControl", "tabSwitch", "copyPaste", "cameraOff"]
                        },
                        "timestamp": { "type": "string", "format": "date-time" }
                    }
                }
            },
            "summary": {
                "type": "object",
                "required": ["windowControls", "copyPastes", "score"],
                "properties": {
                    "windowControls": { "type": "integer", "minimum": 0 },
                    "copyPastes": { "type": "integer", "minimum": 0 },
                    "score": { "type": "integer", "minimum": 0, "maximum": 100 }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum MeetwatchCliError {
    Io(io::Error),
    Monitor(meetwatch::MonitorError),
    Json(serde_json::Error),
    ExportFailed(String),
    ValidationFailed,
    DoctorFailed,
}

impl From<io::Error> for MeetwatchCliError {
    fn from(e: io::Error) -> Self {
        MeetwatchCliError::Io(e)
    }
}

impl From<meetwatch::MonitorError> for MeetwatchCliError {
    fn from(e: meetwatch::MonitorError) -> Self {
        MeetwatchCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for MeetwatchCliError {
    fn from(e: serde_json::Error) -> Self {
        MeetwatchCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MeetwatchCliError> for CliError {
    fn from(e: MeetwatchCliError) -> Self {
        match e {
            MeetwatchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MeetwatchCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the script, session fields and configuration".to_string()),
            },
            MeetwatchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MeetwatchCliError::ExportFailed(file) => CliError {
                code: "EXPORT_FAILED".to_string(),
                message: format!("Could not write {}", file),
                hint: Some("Check that the output directory is writable".to_string()),
            },
            MeetwatchCliError::ValidationFailed => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: "Meeting log summary does not match its events".to_string(),
                hint: Some("Run 'meetwatch score' to see the recomputed summary".to_string()),
            },
            MeetwatchCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct RunReport {
    file: String,
    summary: meetwatch::ExportSummary,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    user: String,
    total_events: usize,
    recorded: meetwatch::ExportSummary,
    expected: meetwatch::ExportSummary,
    valid: bool,
    error: Option<String>,
}

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
