// crates/coinload-cli/src/main.rs
// ============================================================================
// Module: Coinload CLI Entry Point
// Description: Command dispatcher for load-test runs and config checks.
// Purpose: Load config, apply flag overrides, run the harness, report.
// Dependencies: clap, coinload-config, coinload-core, serde_jcs, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `coinload run` loads `coinload.toml` (or the `--config` path, or
//! `COINLOAD_CONFIG`), applies command-line overrides, validates the result
//! and drives the harness against the target API. The exit code reflects the
//! failure threshold. `coinload validate` only loads and validates.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use coinload_config::CoinloadConfig;
use coinload_config::LoggingConfig;
use coinload_core::EventSink;
use coinload_core::FileEventSink;
use coinload_core::Harness;
use coinload_core::NoopEventSink;
use coinload_core::ReqwestExecutor;
use coinload_core::RunReport;
use coinload_core::StderrEventSink;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "coinload", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a load test against the target API.
    Run(RunCommand),
    /// Load and validate a config file without sending traffic.
    Validate(ValidateCommand),
}

/// Arguments for `run`. Flags override the config file.
#[derive(Args, Debug)]
struct RunCommand {
    /// Optional config file path (defaults to coinload.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// API base URL, including the `/api` prefix.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
    /// Number of synthetic users.
    #[arg(long, value_name = "N")]
    users: Option<usize>,
    /// Iterations started per second.
    #[arg(long, value_name = "R")]
    rate: Option<f64>,
    /// Run duration in seconds.
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,
    /// Workers allocated before the run starts.
    #[arg(long, value_name = "N")]
    pre_allocated: Option<usize>,
    /// Upper bound on concurrent workers.
    #[arg(long, value_name = "N")]
    max_workers: Option<usize>,
    /// Pause after each scenario step, in milliseconds.
    #[arg(long, value_name = "MS")]
    step_delay_ms: Option<u64>,
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Optional config file path (defaults to coinload.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Output formats for the run report.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Run(command) => command_run(&command).await,
        Commands::Validate(command) => command_validate(&command),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes a load-test run and maps the verdict to an exit code.
async fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let mut config = CoinloadConfig::load_unvalidated(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    apply_run_overrides(&mut config, command);
    let settings = config
        .harness_settings()
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let events = build_event_sink(&config.logging)?;
    let executor = ReqwestExecutor::new(&config.executor_config())
        .map_err(|err| CliError::new(format!("failed to build http client: {err}")))?;

    let harness = Harness::new(settings, Arc::new(executor), events);
    let report =
        harness.run().await.map_err(|err| CliError::new(format!("run failed to start: {err}")))?;
    write_report(&report, command.format)?;
    Ok(if report.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes the config validation command.
fn command_validate(command: &ValidateCommand) -> CliResult<ExitCode> {
    let _config = CoinloadConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Run Helpers
// ============================================================================

/// Applies command-line overrides on top of file values.
fn apply_run_overrides(config: &mut CoinloadConfig, command: &RunCommand) {
    if let Some(base_url) = &command.base_url {
        config.target.base_url.clone_from(base_url);
    }
    if let Some(users) = command.users {
        config.users.pool_size = users;
    }
    if let Some(rate) = command.rate {
        config.load.rate_per_second = rate;
    }
    if let Some(duration) = command.duration {
        config.load.duration_seconds = duration;
    }
    if let Some(pre_allocated) = command.pre_allocated {
        config.load.pre_allocated_workers = pre_allocated;
    }
    if let Some(max_workers) = command.max_workers {
        config.load.max_workers = max_workers;
    }
    if let Some(step_delay_ms) = command.step_delay_ms {
        config.scenario.inter_step_delay_ms = step_delay_ms;
    }
}

/// Builds the event sink selected by the `[logging]` section.
fn build_event_sink(logging: &LoggingConfig) -> CliResult<Arc<dyn EventSink>> {
    if !logging.enabled {
        return Ok(Arc::new(NoopEventSink));
    }
    match &logging.path {
        Some(path) => {
            let sink = FileEventSink::new(path).map_err(|err| {
                CliError::new(format!("failed to open event log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrEventSink)),
    }
}

/// Writes the run report in the requested format.
fn write_report(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Text => write_stdout_line(&report.render_text())
            .map_err(|err| CliError::new(output_error("stdout", &err))),
        OutputFormat::Json => {
            let mut bytes = serde_jcs::to_vec(report)
                .map_err(|err| CliError::new(format!("failed to serialize report: {err}")))?;
            bytes.push(b'\n');
            write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
