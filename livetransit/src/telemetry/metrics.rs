//! Atomic engine counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;

/// Counters for engine activity.
///
/// All updates use relaxed atomics; a snapshot is a consistent-enough view
/// for display, not a transactional one.
#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_coalesced: AtomicU64,
    cache_evictions: AtomicU64,
    fanout_items: AtomicU64,
    fanout_failures: AtomicU64,
    stale_discards: AtomicU64,
    poll_ticks: AtomicU64,
    poll_batches_failed: AtomicU64,
    probes_run: AtomicU64,
    probes_reused: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_coalesced: AtomicU64::new(0),
            cache_evictions: AtomicU64::new(0),
            fanout_items: AtomicU64::new(0),
            fanout_failures: AtomicU64::new(0),
            stale_discards: AtomicU64::new(0),
            poll_ticks: AtomicU64::new(0),
            poll_batches_failed: AtomicU64::new(0),
            probes_run: AtomicU64::new(0),
            probes_reused: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// A fetch was answered from a ready entry.
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch invoked its producer.
    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch joined a request already in flight.
    pub fn cache_coalesced(&self) {
        self.cache_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// A settled entry was evicted by the cache policy.
    pub fn cache_evicted(&self) {
        self.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Fan-out and fencing
    // =========================================================================

    /// A fan-out batch finished with `items` operations of which `failures`
    /// failed.
    pub fn fanout_completed(&self, items: usize, failures: usize) {
        self.fanout_items.fetch_add(items as u64, Ordering::Relaxed);
        self.fanout_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    /// A result was dropped because its generation was no longer current.
    pub fn stale_discarded(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Live data
    // =========================================================================

    /// The poller ran one refresh.
    pub fn poll_tick(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Every lookup of a poller refresh failed.
    pub fn poll_batch_failed(&self) {
        self.poll_batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// An active-route probe queried the service.
    pub fn probe_run(&self) {
        self.probes_run.fetch_add(1, Ordering::Relaxed);
    }

    /// An active-route probe was answered from the per-stop cache.
    pub fn probe_reused(&self) {
        self.probes_reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.started_at.elapsed(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_coalesced: self.cache_coalesced.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            fanout_items: self.fanout_items.load(Ordering::Relaxed),
            fanout_failures: self.fanout_failures.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            poll_batches_failed: self.poll_batches_failed.load(Ordering::Relaxed),
            probes_run: self.probes_run.load(Ordering::Relaxed),
            probes_reused: self.probes_reused.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let snapshot = EngineMetrics::new().snapshot();
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.poll_ticks, 0);
        assert_eq!(snapshot.stale_discards, 0);
    }

    #[test]
    fn test_fanout_accumulates() {
        let metrics = EngineMetrics::new();
        metrics.fanout_completed(4, 1);
        metrics.fanout_completed(3, 3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fanout_items, 7);
        assert_eq!(snapshot.fanout_failures, 4);
    }

    #[test]
    fn test_cache_counters() {
        let metrics = EngineMetrics::new();
        metrics.cache_miss();
        metrics.cache_coalesced();
        metrics.cache_hit();
        metrics.cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_coalesced, 1);
    }
}
