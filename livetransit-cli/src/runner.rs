//! Shared setup for commands that talk to the backend.

use std::sync::Arc;

use livetransit::config::ConfigFile;
use livetransit::logging::{init_logging, LoggingGuard};
use livetransit::{EngineConfig, HttpTransitService, MapEngine};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Loads the config, installs logging and builds the engine.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// # Arguments
    ///
    /// * `backend` - Backend URL overriding the config file
    /// * `verbose` - Also log to stderr at `debug`
    pub fn new(backend: Option<String>, verbose: bool) -> Result<Self, CliError> {
        let mut config = ConfigFile::load()?;
        if let Some(url) = backend {
            config.backend.url = url;
        }

        let mut logging = config.logging_config().with_stderr(verbose);
        if verbose {
            logging = logging.with_level("livetransit=debug,info");
        }
        let guard = init_logging(&logging)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))?;

        Ok(Self {
            config,
            runtime,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = livetransit::VERSION,
            backend = %self.config.backend.url,
            "LiveTransit CLI starting"
        );
    }

    /// Build an engine against the configured backend.
    pub fn engine(&self, engine_config: EngineConfig) -> Result<MapEngine, CliError> {
        let service =
            HttpTransitService::with_timeout(&self.config.backend.url, self.config.backend.timeout())?;
        Ok(MapEngine::new(Arc::new(service), engine_config))
    }
}
