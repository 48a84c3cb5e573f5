//! Engine telemetry for observability and diagnostics.
//!
//! Lock-free atomic counters shared by the cache, the fan-out users, the
//! poller, the probe and the state machine.
//!
//! # Architecture
//!
//! ```text
//! DataCache ─────┐
//! Poller ────────┼──► EngineMetrics ─────► TelemetrySnapshot ─────► CLI / logs
//! StateStore ────┘    (atomic counters)   (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use livetransit::telemetry::EngineMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(EngineMetrics::new());
//! metrics.cache_hit();
//! metrics.poll_tick();
//!
//! let snapshot = metrics.snapshot();
//! println!("Cache hit rate: {:.1}%", snapshot.cache_hit_rate() * 100.0);
//! ```

mod metrics;
mod snapshot;

pub use metrics::EngineMetrics;
pub use snapshot::TelemetrySnapshot;
