//! Tracing subscriber setup.
//!
//! Installs a global subscriber with:
//! - an `EnvFilter` built from `RUST_LOG`, falling back to the configured level
//! - local-time timestamps
//! - a daily rolling log file written through a non-blocking worker
//! - optional stderr output
//!
//! # Example
//!
//! ```ignore
//! use livetransit::config::LoggingConfig;
//! use livetransit::logging::init_logging;
//!
//! let _guard = init_logging(&LoggingConfig::default().with_directory(log_dir))?;
//! tracing::info!("started");
//! // Buffered lines are flushed when the guard is dropped.
//! ```

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, time::LocalTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Keeps the log file writer alive. Dropping it flushes buffered lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
            filter: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
                path: directory.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer.clone());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(timer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per test binary, so
    // every assertion that needs it lives in this one test.
    #[test]
    fn test_init_logging_writes_rolling_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig::default()
            .with_level("debug")
            .with_directory(log_dir.clone());

        let guard = init_logging(&config).unwrap();
        tracing::info!(route_id = "1A", "logging test line");
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(files.iter().any(|f| f.starts_with("livetransit.log")));

        let second = init_logging(&LoggingConfig::default());
        assert!(matches!(second, Err(LoggingError::AlreadyInstalled)));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig::default().with_level("livetransit=notalevel");
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(
                init_logging(&config),
                Err(LoggingError::Filter { .. })
            ));
        }
    }
}
