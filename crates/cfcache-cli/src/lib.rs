// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

mod commands;

use cfcache::CacheConfig;
use cfcache_core::{ExitCode, MachineError, ENV_CFCACHE_LOG_LEVEL};
use cfcache_store::{StoreError, StoreErrorCode};
use clap::{error::ErrorKind, ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const CRATE_NAME: &str = "cfcache-cli";

#[derive(Parser)]
#[command(name = "cfcache")]
#[command(version, about = "Inspect and verify convolution-function cache roots")]
#[command(
    after_help = "Environment:\n  CFCACHE_DIR         Default cache root\n  CFCACHE_LOG_LEVEL   Log filter override (falls back to RUST_LOG)"
)]
struct Cli {
    /// Machine-readable output on stdout, JSON logs and errors on stderr.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the index, plane files and aggregate image under a root.
    Inspect {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Cross-check the index against plane files; exits non-zero on findings.
    Verify {
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Clone, Copy)]
pub(crate) struct OutputMode {
    pub(crate) json: bool,
}

#[derive(Debug)]
pub(crate) struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    pub(crate) fn validation(code: &str, message: &str) -> Self {
        Self {
            exit_code: ExitCode::Validation,
            machine: MachineError::new(code, message),
        }
    }

    fn internal(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            machine: MachineError::new("internal_error", message),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let exit_code = match err.code {
            StoreErrorCode::StorageUnavailable | StoreErrorCode::Conflict => {
                ExitCode::DependencyFailure
            }
            StoreErrorCode::CorruptMetadata
            | StoreErrorCode::CorruptPayload
            | StoreErrorCode::IncompleteEntry
            | StoreErrorCode::Validation => ExitCode::Validation,
            StoreErrorCode::NotFound | StoreErrorCode::Io | StoreErrorCode::Internal => {
                ExitCode::Internal
            }
        };
        let mut machine = MachineError::new(err.code.as_str(), &err.message);
        if let Some(path) = &err.path {
            machine = machine.with_detail("path", &path.display().to_string());
        }
        Self { exit_code, machine }
    }
}

impl From<cfcache::CacheError> for CliError {
    fn from(err: cfcache::CacheError) -> Self {
        match err {
            cfcache::CacheError::Store(store) => store.into(),
            other => Self {
                exit_code: ExitCode::Validation,
                machine: MachineError::new(other.code().as_str(), &other.to_string()),
            },
        }
    }
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(code) => ProcessExitCode::from(code as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn run() -> Result<ExitCode, CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(ExitCode::Success);
            }
            _ => {
                return Err(CliError {
                    exit_code: ExitCode::Usage,
                    machine: MachineError::new("usage_error", "invalid command line arguments")
                        .with_detail("error", &err.to_string()),
                })
            }
        },
    };
    init_logging(&cli);
    let output_mode = OutputMode { json: cli.json };

    match cli.command {
        Commands::Inspect { root } => commands::inspect(&config_for(root)?, output_mode),
        Commands::Verify { root } => commands::verify(&config_for(root)?, output_mode),
    }
}

fn config_for(root: Option<PathBuf>) -> Result<CacheConfig, CliError> {
    let mut config = CacheConfig::from_env();
    if let Some(root) = root {
        config.root = root;
    }
    config.validate()?;
    Ok(config)
}

fn log_filter(cli: &Cli) -> EnvFilter {
    let from_flags = if cli.verbose > 1 {
        Some("trace")
    } else if cli.verbose == 1 {
        Some("debug")
    } else if cli.quiet {
        Some("error")
    } else {
        None
    };
    if let Some(level) = from_flags {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_env(ENV_CFCACHE_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(cli: &Cli) {
    let filter = log_filter(cli);
    let result = if cli.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("log subscriber already installed: {e}");
    }
}

pub(crate) fn emit_ok(
    output_mode: OutputMode,
    payload: &serde_json::Value,
    text: &str,
) -> Result<(), CliError> {
    if output_mode.json {
        let line =
            serde_json::to_string(payload).map_err(|e| CliError::internal(&e.to_string()))?;
        println!("{line}");
    } else {
        print!("{text}");
    }
    Ok(())
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match serde_json::to_string(&error.machine) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("{}", error.machine);
        for (key, value) in &error.machine.details {
            eprintln!("  {key}: {value}");
        }
    }
}
