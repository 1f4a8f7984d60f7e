//! Tracing setup: `RUST_LOG`-filtered stdout output plus an optional daily
//! rolling log file.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::ConfigError;

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "email-triage.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
            Ok(None)
        }
    }
}

/// Non-blocking writer to a daily rolling file under `dir`, creating the
/// directory if needed.
pub fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), ConfigError> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}
