//! CLI error type.

use livetransit::config::ConfigError;
use livetransit::logging::LoggingError;
use livetransit::{EngineError, ServiceError};
use thiserror::Error;

/// Errors reported by CLI commands. Every variant exits with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or argument problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// The backend could not be reached or answered with an error.
    #[error("Backend error: {0}")]
    Service(#[from] ServiceError),

    /// An engine action was rejected.
    #[error("{0}")]
    Engine(EngineError),

    /// An engine action failed; the message is the banner text.
    #[error("{0}")]
    Action(String),

    /// The async runtime or signal handler could not be set up.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Service(e) => CliError::Service(e),
            e => CliError::Engine(e),
        }
    }
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(1);
    }
}
