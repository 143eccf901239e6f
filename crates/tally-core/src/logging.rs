//! Logging infrastructure for tally.
//!
//! Structured logging using the `tracing` ecosystem. The REPL owns stdout, so
//! human-readable logs go to stderr and machine-readable JSON lines go to a
//! daily-rolling file under `~/.tally/logs/`.
//!
//! ## Example
//!
//! ```no_run
//! use tally_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("tally started");
//! tracing::debug!(model = "gpt-4", "model selected");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Result, TallyError};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the tally logging system.
///
/// This sets up:
/// - File logging to `<log_dir>/tally.log` (JSON lines format)
/// - Console logging to stderr (compact format)
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.tally/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses WARN on the
///   console and INFO in the file filter.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| TallyError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "tally.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .with_filter(console_filter(verbose));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("tally={level},tally_core={level},tally_cost={level},tally_chat={level}")
}

/// Targets whose failures the REPL already shows to the user.
const REPL_REPORTED_TARGETS: &[&str] = &["tally::repl", "tally_chat::backend"];

/// Filter for the stderr layer.
///
/// The console shares the terminal with the chat transcript, so only
/// warnings reach it, and none from the targets in
/// [`REPL_REPORTED_TARGETS`]. Verbose mode shows everything from DEBUG up.
pub fn console_filter(verbose: bool) -> Targets {
    if verbose {
        return Targets::new().with_default(LevelFilter::DEBUG);
    }
    REPL_REPORTED_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::WARN), |filter, target| {
            filter.with_target(*target, LevelFilter::OFF)
        })
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the tally state directory.
///
/// Returns `~/.tally/`
pub fn tally_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TallyError::internal("could not determine home directory"))?;

    Ok(home.join(".tally"))
}

/// Get the default log directory path.
///
/// Returns `~/.tally/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(tally_dir()?.join("logs"))
}

/// Convenience macro for logging per-exchange cost events.
///
/// # Example
///
/// ```ignore
/// log_cost_event!(model = "gpt-4", input_tokens = 12, output_tokens = 40, cost_usd = 0.0028);
/// ```
#[macro_export]
macro_rules! log_cost_event {
    ($($field:tt)*) => {
        tracing::info!(
            target: "tally::cost",
            $($field)*,
            "cost event"
        )
    };
}
