// crates/ava-cli/src/main.rs
// ============================================================================
// Module: AVA CLI Entry Point
// Description: Operator command dispatcher over a SQLite-backed store: job
//              runs, session inspection, scoring-config cache
//              administration, rollout control, and drift checks.
// ============================================================================

//! ## Overview
//! Every subcommand opens its own [`SqliteStore`] against `--db` (or
//! `AVA_DB_PATH`), wires the one or two `ava-control`/`ava-config`
//! collaborators it needs, and prints its result as pretty JSON to stdout.
//! There is no resident process behind this binary: each invocation is a
//! single request against the store, matching `ava-control`'s job runner
//! and rollout controller, which are themselves built to be driven either
//! by their own timers or by an operator's explicit call.

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use ava_config::loader::ConfigLoader;
use ava_control::DriftDetector;
use ava_control::DriftThresholds;
use ava_control::JobRunner;
use ava_control::RolloutController;
use ava_core::clock::Clock;
use ava_core::clock::SystemClock;
use ava_core::identifiers::RolloutId;
use ava_core::identifiers::ScoringConfigId;
use ava_core::identifiers::SessionId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::job_run::TriggeredBy;
use ava_core::repo::RolloutRepo;
use ava_core::repo::SessionRepo;
use ava_core::telemetry::NoopTelemetry;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

mod store;

#[cfg(test)]
mod main_tests;

use store::open_store;

// ============================================================================
// SECTION: CLI Surface
// ============================================================================

/// Operator command-line surface for the AVA control plane and store.
#[derive(Parser, Debug)]
#[command(name = "ava", disable_help_subcommand = true)]
struct Cli {
    /// Path to the SQLite database file (defaults to `AVA_DB_PATH`, or
    /// `ava.db` if that is unset).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Job-runner subtask family operations.
    Job {
        /// Selected job subcommand.
        #[command(subcommand)]
        command: JobCommand,
    },
    /// Session inspection.
    Session {
        /// Selected session subcommand.
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Scoring-config cache administration.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Staged rollout lifecycle control.
    Rollout {
        /// Selected rollout subcommand.
        #[command(subcommand)]
        command: RolloutCommand,
    },
    /// Drift detection.
    Drift {
        /// Selected drift subcommand.
        #[command(subcommand)]
        command: DriftCommand,
    },
}

/// Job subcommands.
#[derive(Subcommand, Debug)]
enum JobCommand {
    /// Runs one job family immediately, as if triggered by an operator
    /// rather than its scheduled timer.
    Run(JobRunArgs),
}

/// Arguments for `job run`.
#[derive(clap::Args, Debug)]
struct JobRunArgs {
    /// Which job family to run.
    #[arg(long, value_enum)]
    job: JobFamily,
}

/// The three job families the job runner schedules.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum JobFamily {
    /// Quality stats, eval-harness regression, drift check, rollout health,
    /// summary, and retention cleanup.
    Nightly,
    /// A single hourly drift snapshot.
    Hourly,
    /// A single rollout health canary check.
    Canary,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Shows a session's current state.
    Show(SessionShowArgs),
}

/// Arguments for `session show`.
#[derive(clap::Args, Debug)]
struct SessionShowArgs {
    /// Session identifier to look up.
    #[arg(long = "session-id", value_name = "SESSION_ID")]
    session_id: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Resolves and prints the active scoring config for a site (or the
    /// global scope).
    Get(ConfigGetArgs),
    /// Clears the scoring-config cache.
    ///
    /// This process holds no cache of its own: the cache this command
    /// demonstrates is always empty at invocation, since each CLI run
    /// opens a fresh [`ConfigLoader`]. Run against a resident process
    /// sharing the same store, this is the operation an admin scoring-config
    /// edit triggers automatically.
    Invalidate,
}

/// Arguments for `config get`.
#[derive(clap::Args, Debug)]
struct ConfigGetArgs {
    /// Storefront origin to resolve a scoring config for (global scope if
    /// omitted).
    #[arg(long = "site-url", value_name = "SITE_URL")]
    site_url: Option<String>,
    /// Specific config id to fetch, bypassing active-config resolution.
    #[arg(long = "config-id", value_name = "CONFIG_ID")]
    config_id: Option<String>,
}

/// Rollout subcommands.
#[derive(Subcommand, Debug)]
enum RolloutCommand {
    /// Shows a rollout's current state.
    Status(RolloutIdArgs),
    /// Advances a rollout to its next stage, or completes it at the final
    /// stage.
    Promote(RolloutIdArgs),
    /// Rolls a rollout back and ends its linked experiment.
    Rollback(RolloutRollbackArgs),
}

/// Arguments identifying a rollout.
#[derive(clap::Args, Debug)]
struct RolloutIdArgs {
    /// Rollout identifier.
    #[arg(long = "rollout-id", value_name = "ROLLOUT_ID")]
    rollout_id: String,
}

/// Arguments for `rollout rollback`.
#[derive(clap::Args, Debug)]
struct RolloutRollbackArgs {
    /// Rollout identifier.
    #[arg(long = "rollout-id", value_name = "ROLLOUT_ID")]
    rollout_id: String,
    /// Operator-supplied reason, recorded in the command's own output only;
    /// no repository field currently persists it.
    #[arg(long, value_name = "REASON")]
    reason: String,
}

/// Drift subcommands.
#[derive(Subcommand, Debug)]
enum DriftCommand {
    /// Runs a platform-wide drift check and prints any newly raised alerts.
    Check,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper, distinguishing a bad configuration (store path,
/// missing env) from any other operation failure.
#[derive(Debug, Error)]
enum CliError {
    /// The store could not be opened or an argument failed to parse into
    /// the identifier it was meant to denote.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A repository call or control-plane operation failed.
    #[error("{0}")]
    Failed(String),
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Maps this error to the exit code spec'd for the job-runner CLI
    /// wrapper: 1 for an unhandled error, 2 for bad configuration.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Failed(_) => 1,
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err),
    }
}

/// Resolves the `--db` argument (or `AVA_DB_PATH`, or the documented
/// default) into a concrete path.
fn resolve_db_path(db: Option<PathBuf>) -> PathBuf {
    db.or_else(|| std::env::var_os("AVA_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("ava.db"))
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db);

    match cli.command {
        Commands::Job {
            command,
        } => command_job(command, &db_path).await,
        Commands::Session {
            command,
        } => command_session(command, &db_path).await,
        Commands::Config {
            command,
        } => command_config(command, &db_path).await,
        Commands::Rollout {
            command,
        } => command_rollout(command, &db_path).await,
        Commands::Drift {
            command,
        } => command_drift(command, &db_path).await,
    }
}

// ============================================================================
// SECTION: Job Command
// ============================================================================

/// Executes a `job` subcommand.
async fn command_job(command: JobCommand, db_path: &Path) -> CliResult<()> {
    let JobCommand::Run(args) = command;
    let store = open_store(db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let drift_detector = Arc::new(DriftDetector::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        Arc::new(NoopTelemetry),
        DriftThresholds::default(),
    ));
    let rollout_controller = Arc::new(RolloutController::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    ));
    let runner = JobRunner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        drift_detector,
        rollout_controller,
        clock,
        Arc::new(NoopTelemetry),
    );

    let result = match args.job {
        JobFamily::Nightly => runner.run_nightly_batch(TriggeredBy::Api).await,
        JobFamily::Hourly => runner.run_hourly_snapshot(TriggeredBy::Api).await,
        JobFamily::Canary => runner.run_canary_check(TriggeredBy::Api).await,
    };
    let job_run = result.map_err(CliError::Failed)?;
    print_json(&job_run)
}

// ============================================================================
// SECTION: Session Command
// ============================================================================

/// Executes a `session` subcommand.
async fn command_session(command: SessionCommand, db_path: &Path) -> CliResult<()> {
    let SessionCommand::Show(args) = command;
    let store = open_store(db_path)?;
    let session_id = SessionId::from(args.session_id.as_str());
    let session = SessionRepo::get(store.as_ref(), &session_id)
        .await
        .map_err(|err| CliError::Failed(err.to_string()))?;
    print_json(&session)
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes a `config` subcommand.
async fn command_config(command: ConfigCommand, db_path: &Path) -> CliResult<()> {
    let store = open_store(db_path)?;
    let loader = ConfigLoader::new(store, Arc::new(NoopTelemetry));

    match command {
        ConfigCommand::Get(args) => {
            let site_url = args.site_url.as_deref().map(SiteUrl::from);
            let config_id = args.config_id.as_deref().map(ScoringConfigId::from);
            let config = loader.load(site_url.as_ref(), config_id.as_ref()).await;
            print_json(&config)
        }
        ConfigCommand::Invalidate => {
            loader.invalidate();
            print_json(&json!({ "invalidated": true }))
        }
    }
}

// ============================================================================
// SECTION: Rollout Command
// ============================================================================

/// Executes a `rollout` subcommand.
async fn command_rollout(command: RolloutCommand, db_path: &Path) -> CliResult<()> {
    let store = open_store(db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        RolloutCommand::Status(args) => {
            let rollout_id = RolloutId::from(args.rollout_id.as_str());
            let rollout = RolloutRepo::get(store.as_ref(), &rollout_id)
                .await
                .map_err(|err| CliError::Failed(err.to_string()))?;
            print_json(&rollout)
        }
        RolloutCommand::Promote(args) => {
            let controller =
                RolloutController::new(store.clone(), store.clone(), store.clone(), store, clock);
            let rollout_id = RolloutId::from(args.rollout_id.as_str());
            let rollout =
                controller.promote(&rollout_id).await.map_err(|err| CliError::Failed(err.to_string()))?;
            print_json(&rollout)
        }
        RolloutCommand::Rollback(args) => {
            let controller =
                RolloutController::new(store.clone(), store.clone(), store.clone(), store, clock);
            let rollout_id = RolloutId::from(args.rollout_id.as_str());
            let rollout = controller
                .rollback(&rollout_id, &args.reason)
                .await
                .map_err(|err| CliError::Failed(err.to_string()))?;
            print_json(&rollout)
        }
    }
}

// ============================================================================
// SECTION: Drift Command
// ============================================================================

/// Executes a `drift` subcommand.
async fn command_drift(command: DriftCommand, db_path: &Path) -> CliResult<()> {
    let DriftCommand::Check = command;
    let store = open_store(db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let detector = DriftDetector::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        clock,
        Arc::new(NoopTelemetry),
        DriftThresholds::default(),
    );
    let alerts = detector.run_drift_check().await.map_err(|err| CliError::Failed(err.to_string()))?;
    print_json(&alerts)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes `value` to pretty JSON and writes it to stdout, terminated by
/// a newline.
fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::Failed(format!("failed to render output: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::Failed(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns the exit code spec'd for
/// the job-runner CLI wrapper.
fn emit_error(err: &CliError) -> ExitCode {
    let _ = write_stderr_line(&err.to_string());
    ExitCode::from(err.exit_code())
}
