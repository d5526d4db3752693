//! Logging configuration for sqlgrade.
//!
//! Logs never go to stdout: the grader prints its summary there and the
//! worker uses it as its reply channel.

use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::error::{GraderError, Result};

/// Default filter for the grading process.
pub const DEFAULT_FILTER: &str = "info";

/// Default filter for worker processes. Their stderr ends up in error
/// verdicts, so only real problems are logged.
pub const WORKER_FILTER: &str = "warn";

/// Builds the filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to stderr.
pub fn init_stderr_logging(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initializes logging to the file at `path`, truncating it.
pub fn init_file_logging(path: &Path) -> Result<()> {
    let log_file = open_log_file(path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_writer(log_file)
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            GraderError::config(format!(
                "Could not create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    File::create(path).map_err(|e| {
        GraderError::config(format!("Could not create log file {}: {e}", path.display()))
    })
}
