//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// Immutable copy of [`super::EngineMetrics`] counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_coalesced: u64,
    pub cache_evictions: u64,
    pub fanout_items: u64,
    pub fanout_failures: u64,
    pub stale_discards: u64,
    pub poll_ticks: u64,
    pub poll_batches_failed: u64,
    pub probes_run: u64,
    pub probes_reused: u64,
}

impl TelemetrySnapshot {
    /// Share of cache lookups served without a new request (hits and
    /// coalesced joins), in `0.0..=1.0`.
    pub fn cache_hit_rate(&self) -> f64 {
        let served = self.cache_hits + self.cache_coalesced;
        let total = served + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Share of fan-out items that failed, in `0.0..=1.0`.
    pub fn fanout_failure_rate(&self) -> f64 {
        if self.fanout_items == 0 {
            0.0
        } else {
            self.fanout_failures as f64 / self.fanout_items as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cache {} hit / {} miss / {} coalesced ({:.0}%), fan-out {} items / {} failed, \
             {} stale discarded, {} poll ticks",
            self.cache_hits,
            self.cache_misses,
            self.cache_coalesced,
            self.cache_hit_rate() * 100.0,
            self.fanout_items,
            self.fanout_failures,
            self.stale_discards,
            self.poll_ticks,
        )
    }
}
