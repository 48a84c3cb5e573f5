//! Request memoization with coalescing.
//!
//! [`DataCache`] memoizes the outcome of a fetch per key. While a fetch is
//! in flight every further caller for the same key joins it instead of
//! issuing a second request. [`TransitCacheClient`] wraps the transit
//! service with one `DataCache` per request kind and translates request
//! parameters into normalized keys.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   TransitCacheClient                     │
//! │                                                          │
//! │  BoundingBox → BboxKey     stop id / route id / trip id  │
//! │  (stop, route, date) → ScheduleKey                       │
//! └──────────────┬───────────────────────────────────────────┘
//!                │ fetch(key, producer)
//!                ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                 DataCache<K, V> (DashMap)                │
//! │                                                          │
//! │   absent ──fetch──► Pending ──ok──► Ready(Arc<V>)        │
//! │                        │                                 │
//! │                        └──err──► Failed ──fetch──► ...   │
//! └──────────────┬───────────────────────────────────────────┘
//!                │ producer()
//!                ▼
//!        Arc<dyn TransitService>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use livetransit::cache::{CachePolicy, TransitCacheClient};
//!
//! let client = TransitCacheClient::new(service, CachePolicy::default(), 5, metrics);
//! let trips = client.trips_by_route("1A").await?;
//! // Second call is answered from the cache.
//! let again = client.trips_by_route("1A").await?;
//! ```

mod client;
mod data;
mod keys;

pub use client::TransitCacheClient;
pub use data::{CacheEntry, DataCache, EntryState};
pub use keys::{BboxKey, ScheduleKey, DEFAULT_BBOX_PRECISION};

use std::time::Duration;

/// Eviction policy of a [`DataCache`].
///
/// The default keeps every entry for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum number of entries. When exceeded, the settled entry with the
    /// oldest fetch time is evicted. Pending entries are never evicted.
    pub max_entries: Option<usize>,

    /// Age after which a ready entry is treated as absent.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    /// No bound and no expiry.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the entry bound.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Set the time-to-live of ready entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}
