//! Typed engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CachePolicy;

/// Minimum viewport zoom at which stops are queried.
pub const DEFAULT_MIN_STOP_ZOOM: u8 = 16;

/// Decimals kept in rectangle query keys.
pub const DEFAULT_BBOX_PRECISION: u32 = crate::cache::DEFAULT_BBOX_PRECISION;

/// Freshness of the vehicle lookup when a route is selected (23.5 h).
pub const DEFAULT_ROUTE_FRESHNESS_SECS: u64 = 84_600;

/// Freshness of the periodic vehicle refresh.
pub const DEFAULT_LIVE_FRESHNESS_SECS: u64 = 60;

/// Freshness of the active-route probe lookups.
pub const DEFAULT_PROBE_FRESHNESS_SECS: u64 = 84_600;

/// Interval between vehicle refreshes.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Shortest accepted live poll interval. Shorter values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fan-out concurrency; 0 runs every item at once.
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 0;

/// Minimum zoom when flying to a vehicle.
pub const DEFAULT_FOCUS_ZOOM: u8 = 16;

/// Padding ratio applied to fitted bounds.
pub const DEFAULT_FIT_PADDING: f64 = 0.1;

/// Number of stops whose probe results are kept.
pub const DEFAULT_PROBE_CACHE_CAPACITY: u64 = 1024;

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log file name (a date suffix is appended on rotation).
pub const DEFAULT_LOG_FILE: &str = "livetransit.log";

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub min_stop_zoom: u8,
    pub bbox_precision: u32,
    pub route_freshness_secs: u64,
    pub live_freshness_secs: u64,
    pub probe_freshness_secs: u64,
    pub poll_interval: Duration,
    /// Start the live poller after a route's vehicles are loaded.
    pub live_polling: bool,
    pub fanout_concurrency: usize,
    pub focus_zoom: u8,
    pub fit_padding: f64,
    pub cache_policy: CachePolicy,
    pub probe_cache_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_stop_zoom: DEFAULT_MIN_STOP_ZOOM,
            bbox_precision: DEFAULT_BBOX_PRECISION,
            route_freshness_secs: DEFAULT_ROUTE_FRESHNESS_SECS,
            live_freshness_secs: DEFAULT_LIVE_FRESHNESS_SECS,
            probe_freshness_secs: DEFAULT_PROBE_FRESHNESS_SECS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            live_polling: true,
            fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
            fit_padding: DEFAULT_FIT_PADDING,
            cache_policy: CachePolicy::default(),
            probe_cache_capacity: DEFAULT_PROBE_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum zoom for stop queries.
    pub fn with_min_stop_zoom(mut self, zoom: u8) -> Self {
        self.min_stop_zoom = zoom;
        self
    }

    /// Set the decimals kept in rectangle query keys.
    pub fn with_bbox_precision(mut self, precision: u32) -> Self {
        self.bbox_precision = precision;
        self
    }

    /// Set the freshness used for the initial vehicle lookup of a route.
    pub fn with_route_freshness_secs(mut self, secs: u64) -> Self {
        self.route_freshness_secs = secs;
        self
    }

    /// Set the freshness used by the live poller.
    pub fn with_live_freshness_secs(mut self, secs: u64) -> Self {
        self.live_freshness_secs = secs;
        self
    }

    /// Set the freshness used by the active-route probe.
    pub fn with_probe_freshness_secs(mut self, secs: u64) -> Self {
        self.probe_freshness_secs = secs;
        self
    }

    /// Set the live poll interval, raised to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Enable or disable the live poller.
    pub fn with_live_polling(mut self, enabled: bool) -> Self {
        self.live_polling = enabled;
        self
    }

    /// Set the fan-out concurrency (0 = unbounded).
    pub fn with_fanout_concurrency(mut self, concurrency: usize) -> Self {
        self.fanout_concurrency = concurrency;
        self
    }

    /// Set the minimum fly-to zoom.
    pub fn with_focus_zoom(mut self, zoom: u8) -> Self {
        self.focus_zoom = zoom;
        self
    }

    /// Set the fit-bounds padding ratio.
    pub fn with_fit_padding(mut self, padding: f64) -> Self {
        self.fit_padding = padding;
        self
    }

    /// Set the cache eviction policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Set the number of stops whose probe results are kept.
    pub fn with_probe_cache_capacity(mut self, capacity: u64) -> Self {
        self.probe_cache_capacity = capacity;
        self
    }
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `livetransit=debug`.
    pub level: String,
    /// Directory of the rolling log file. `None` disables file output.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// Also log to stderr.
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            file_name: DEFAULT_LOG_FILE.to_string(),
            stderr: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: PathBuf) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }
}
