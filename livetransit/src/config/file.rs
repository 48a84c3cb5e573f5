//! INI configuration file.
//!
//! ```ini
//! [backend]
//! url = http://localhost:8080/api
//! timeout = 30
//!
//! [map]
//! min_stop_zoom = 16
//! bbox_precision = 5
//! focus_zoom = 16
//! fit_padding = 0.1
//!
//! [live]
//! enabled = true
//! poll_interval = 5
//! freshness = 60
//! route_freshness = 84600
//! probe_freshness = 84600
//! fanout_concurrency = 0
//!
//! [cache]
//! max_entries =
//! ttl =
//! probe_capacity = 1024
//!
//! [logging]
//! level = info
//! directory = /home/user/.livetransit/logs
//! file = livetransit.log
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use super::engine::{
    EngineConfig, LoggingConfig, DEFAULT_BBOX_PRECISION, DEFAULT_FANOUT_CONCURRENCY,
    DEFAULT_FIT_PADDING, DEFAULT_FOCUS_ZOOM, DEFAULT_LIVE_FRESHNESS_SECS, DEFAULT_LOG_FILE,
    DEFAULT_LOG_LEVEL, DEFAULT_MIN_STOP_ZOOM, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_PROBE_CACHE_CAPACITY, DEFAULT_PROBE_FRESHNESS_SECS, DEFAULT_ROUTE_FRESHNESS_SECS,
};
use super::{ConfigError, ConfigKey};
use crate::cache::CachePolicy;
use crate::service::DEFAULT_TIMEOUT_SECS;

/// Backend URL used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api";

/// The `~/.livetransit` directory.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".livetransit")
}

/// The default config file location, `~/.livetransit/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub min_stop_zoom: u8,
    pub bbox_precision: u32,
    pub focus_zoom: u8,
    pub fit_padding: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSettings {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    pub freshness_secs: u64,
    pub route_freshness_secs: u64,
    pub probe_freshness_secs: u64,
    pub fanout_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub max_entries: Option<usize>,
    pub ttl_secs: Option<u64>,
    pub probe_capacity: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: PathBuf,
    pub file: String,
}

/// Contents of the config file, one struct per INI section.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub backend: BackendSettings,
    pub map: MapSettings,
    pub live: LiveSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            backend: BackendSettings {
                url: DEFAULT_BACKEND_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            map: MapSettings {
                min_stop_zoom: DEFAULT_MIN_STOP_ZOOM,
                bbox_precision: DEFAULT_BBOX_PRECISION,
                focus_zoom: DEFAULT_FOCUS_ZOOM,
                fit_padding: DEFAULT_FIT_PADDING,
            },
            live: LiveSettings {
                enabled: true,
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                freshness_secs: DEFAULT_LIVE_FRESHNESS_SECS,
                route_freshness_secs: DEFAULT_ROUTE_FRESHNESS_SECS,
                probe_freshness_secs: DEFAULT_PROBE_FRESHNESS_SECS,
                fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
            },
            cache: CacheSettings {
                max_entries: None,
                ttl_secs: None,
                probe_capacity: DEFAULT_PROBE_CACHE_CAPACITY,
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                directory: config_dir().join("logs"),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults; keys absent from
    /// the file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(config);
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Write every key to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Write every key to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(write_error)
    }

    /// The engine configuration these settings describe.
    pub fn engine_config(&self) -> EngineConfig {
        let policy = CachePolicy {
            max_entries: self.cache.max_entries,
            ttl: self.cache.ttl_secs.map(Duration::from_secs),
        };

        EngineConfig::new()
            .with_min_stop_zoom(self.map.min_stop_zoom)
            .with_bbox_precision(self.map.bbox_precision)
            .with_focus_zoom(self.map.focus_zoom)
            .with_fit_padding(self.map.fit_padding)
            .with_live_polling(self.live.enabled)
            .with_poll_interval(Duration::from_secs(self.live.poll_interval_secs))
            .with_live_freshness_secs(self.live.freshness_secs)
            .with_route_freshness_secs(self.live.route_freshness_secs)
            .with_probe_freshness_secs(self.live.probe_freshness_secs)
            .with_fanout_concurrency(self.live.fanout_concurrency)
            .with_cache_policy(policy)
            .with_probe_cache_capacity(self.cache.probe_capacity)
    }

    /// The logging configuration these settings describe.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            directory: Some(self.logging.directory.clone()),
            file_name: self.logging.file.clone(),
            stderr: false,
        }
    }
}
