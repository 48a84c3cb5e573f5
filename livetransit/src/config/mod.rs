//! Configuration.
//!
//! - [`EngineConfig`]: typed engine settings with builder methods.
//! - [`ConfigFile`]: the INI file at `~/.livetransit/config.ini`.
//! - [`ConfigKey`]: `section.key` names for `config get/set/list`.
//!
//! # Example
//!
//! ```ignore
//! use livetransit::config::ConfigFile;
//!
//! let file = ConfigFile::load()?;
//! let engine_config = file.engine_config();
//! let service = HttpTransitService::with_timeout(&file.backend.url, file.backend.timeout())?;
//! ```

mod engine;
mod file;
mod keys;

pub use engine::{
    EngineConfig, LoggingConfig, DEFAULT_BBOX_PRECISION, DEFAULT_FANOUT_CONCURRENCY,
    DEFAULT_FIT_PADDING, DEFAULT_FOCUS_ZOOM, DEFAULT_LIVE_FRESHNESS_SECS, DEFAULT_LOG_FILE,
    DEFAULT_LOG_LEVEL, DEFAULT_MIN_STOP_ZOOM, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_PROBE_CACHE_CAPACITY, DEFAULT_PROBE_FRESHNESS_SECS, DEFAULT_ROUTE_FRESHNESS_SECS,
    MIN_POLL_INTERVAL,
};
pub use file::{
    config_dir, config_file_path, BackendSettings, CacheSettings, ConfigFile, LiveSettings,
    LoggingSettings, MapSettings, DEFAULT_BACKEND_URL,
};
pub use keys::ConfigKey;

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read or parsed.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The config file could not be written.
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be parsed or is out of range.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not a known `section.key` name.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}
