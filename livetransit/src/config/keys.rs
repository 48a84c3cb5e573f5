//! `section.key` names of the config file.

use std::path::PathBuf;
use std::str::FromStr;

use reqwest::Url;

use super::{ConfigError, ConfigFile};

/// Highest zoom level accepted for zoom settings.
const MAX_ZOOM: u8 = 22;

/// A configuration setting addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    BackendUrl,
    BackendTimeout,
    MapMinStopZoom,
    MapBboxPrecision,
    MapFocusZoom,
    MapFitPadding,
    LiveEnabled,
    LivePollInterval,
    LiveFreshness,
    LiveRouteFreshness,
    LiveProbeFreshness,
    LiveFanoutConcurrency,
    CacheMaxEntries,
    CacheTtl,
    CacheProbeCapacity,
    LoggingLevel,
    LoggingDirectory,
    LoggingFile,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::BackendUrl,
            ConfigKey::BackendTimeout,
            ConfigKey::MapMinStopZoom,
            ConfigKey::MapBboxPrecision,
            ConfigKey::MapFocusZoom,
            ConfigKey::MapFitPadding,
            ConfigKey::LiveEnabled,
            ConfigKey::LivePollInterval,
            ConfigKey::LiveFreshness,
            ConfigKey::LiveRouteFreshness,
            ConfigKey::LiveProbeFreshness,
            ConfigKey::LiveFanoutConcurrency,
            ConfigKey::CacheMaxEntries,
            ConfigKey::CacheTtl,
            ConfigKey::CacheProbeCapacity,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
            ConfigKey::LoggingFile,
        ]
    }

    /// Full name, e.g. `live.poll_interval`.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::BackendUrl => "backend.url",
            ConfigKey::BackendTimeout => "backend.timeout",
            ConfigKey::MapMinStopZoom => "map.min_stop_zoom",
            ConfigKey::MapBboxPrecision => "map.bbox_precision",
            ConfigKey::MapFocusZoom => "map.focus_zoom",
            ConfigKey::MapFitPadding => "map.fit_padding",
            ConfigKey::LiveEnabled => "live.enabled",
            ConfigKey::LivePollInterval => "live.poll_interval",
            ConfigKey::LiveFreshness => "live.freshness",
            ConfigKey::LiveRouteFreshness => "live.route_freshness",
            ConfigKey::LiveProbeFreshness => "live.probe_freshness",
            ConfigKey::LiveFanoutConcurrency => "live.fanout_concurrency",
            ConfigKey::CacheMaxEntries => "cache.max_entries",
            ConfigKey::CacheTtl => "cache.ttl",
            ConfigKey::CacheProbeCapacity => "cache.probe_capacity",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or((name, ""))
    }

    /// Current value as written to the file. Unset optional values are
    /// empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::BackendUrl => config.backend.url.clone(),
            ConfigKey::BackendTimeout => config.backend.timeout_secs.to_string(),
            ConfigKey::MapMinStopZoom => config.map.min_stop_zoom.to_string(),
            ConfigKey::MapBboxPrecision => config.map.bbox_precision.to_string(),
            ConfigKey::MapFocusZoom => config.map.focus_zoom.to_string(),
            ConfigKey::MapFitPadding => config.map.fit_padding.to_string(),
            ConfigKey::LiveEnabled => config.live.enabled.to_string(),
            ConfigKey::LivePollInterval => config.live.poll_interval_secs.to_string(),
            ConfigKey::LiveFreshness => config.live.freshness_secs.to_string(),
            ConfigKey::LiveRouteFreshness => config.live.route_freshness_secs.to_string(),
            ConfigKey::LiveProbeFreshness => config.live.probe_freshness_secs.to_string(),
            ConfigKey::LiveFanoutConcurrency => config.live.fanout_concurrency.to_string(),
            ConfigKey::CacheMaxEntries => optional(config.cache.max_entries),
            ConfigKey::CacheTtl => optional(config.cache.ttl_secs),
            ConfigKey::CacheProbeCapacity => config.cache.probe_capacity.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
            ConfigKey::LoggingFile => config.logging.file.clone(),
        }
    }

    /// Parse and validate `value`, then store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::BackendUrl => {
                Url::parse(value).map_err(|e| self.invalid(value, e))?;
                config.backend.url = value.to_string();
            }
            ConfigKey::BackendTimeout => config.backend.timeout_secs = self.positive(value)?,
            ConfigKey::MapMinStopZoom => config.map.min_stop_zoom = self.zoom(value)?,
            ConfigKey::MapBboxPrecision => {
                let precision: u32 = self.parse(value)?;
                if precision > 9 {
                    return Err(self.invalid(value, "must be at most 9"));
                }
                config.map.bbox_precision = precision;
            }
            ConfigKey::MapFocusZoom => config.map.focus_zoom = self.zoom(value)?,
            ConfigKey::MapFitPadding => {
                let padding: f64 = self.parse(value)?;
                if !padding.is_finite() || padding < 0.0 {
                    return Err(self.invalid(value, "must be a non-negative number"));
                }
                config.map.fit_padding = padding;
            }
            ConfigKey::LiveEnabled => config.live.enabled = self.boolean(value)?,
            ConfigKey::LivePollInterval => config.live.poll_interval_secs = self.positive(value)?,
            ConfigKey::LiveFreshness => config.live.freshness_secs = self.positive(value)?,
            ConfigKey::LiveRouteFreshness => {
                config.live.route_freshness_secs = self.positive(value)?
            }
            ConfigKey::LiveProbeFreshness => {
                config.live.probe_freshness_secs = self.positive(value)?
            }
            ConfigKey::LiveFanoutConcurrency => config.live.fanout_concurrency = self.parse(value)?,
            ConfigKey::CacheMaxEntries => config.cache.max_entries = self.optional(value)?,
            ConfigKey::CacheTtl => config.cache.ttl_secs = self.optional(value)?,
            ConfigKey::CacheProbeCapacity => config.cache.probe_capacity = self.positive(value)?,
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => config.logging.directory = PathBuf::from(value),
            ConfigKey::LoggingFile => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.logging.file = value.to_string();
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl ToString) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e))
    }

    fn positive<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: ToString,
    {
        let parsed: T = self.parse(value)?;
        if parsed == T::default() {
            return Err(self.invalid(value, "must be greater than zero"));
        }
        Ok(parsed)
    }

    fn optional<T>(&self, value: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        if value.is_empty() {
            Ok(None)
        } else {
            self.parse(value).map(Some)
        }
    }

    fn zoom(&self, value: &str) -> Result<u8, ConfigError> {
        let zoom: u8 = self.parse(value)?;
        if zoom > MAX_ZOOM {
            return Err(self.invalid(value, format!("must be at most {}", MAX_ZOOM)));
        }
        Ok(zoom)
    }

    fn boolean(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .find(|key| key.name() == s)
            .copied()
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
