//! Coalescing key/value memo of fetch outcomes.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

use super::CachePolicy;
use crate::service::{ServiceError, ServiceResult};
use crate::telemetry::EngineMetrics;

type SharedFetch<V> = Shared<BoxFuture<'static, ServiceResult<Arc<V>>>>;
type Entries<K, V> = DashMap<K, Stored<V>>;

enum Slot<V> {
    Pending { id: u64, fetch: SharedFetch<V> },
    Ready(Arc<V>),
    Failed(ServiceError),
}

struct Stored<V> {
    fetched_at: Instant,
    slot: Slot<V>,
}

/// Public view of an entry's state.
#[derive(Debug, Clone)]
pub enum EntryState<V> {
    /// A fetch is in flight.
    Pending,
    /// The last fetch succeeded.
    Ready(Arc<V>),
    /// The last fetch failed. The next `fetch` retries.
    Failed(ServiceError),
}

impl<V> EntryState<V> {
    pub fn is_pending(&self) -> bool {
        matches!(self, EntryState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EntryState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EntryState::Failed(_))
    }
}

/// Snapshot of a cache entry returned by [`DataCache::get`].
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    /// When the fetch was issued (pending) or settled (ready/failed).
    pub fetched_at: Instant,
    pub state: EntryState<V>,
}

enum Lookup<V> {
    Hit(Arc<V>),
    Join(SharedFetch<V>),
    Issued(SharedFetch<V>),
}

/// Memo of in-flight and completed fetches, keyed by normalized request
/// parameters.
///
/// At most one request per key is outstanding. Concurrent callers share the
/// same outcome, including the same error. The transition out of `Pending`
/// is performed by the in-flight request itself, which is driven on the
/// Tokio runtime, so it completes even if every caller stops waiting.
pub struct DataCache<K, V> {
    name: &'static str,
    entries: Arc<Entries<K, V>>,
    policy: CachePolicy,
    metrics: Option<Arc<EngineMetrics>>,
    next_id: AtomicU64,
}

impl<K, V> DataCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a cache without metrics.
    ///
    /// # Arguments
    ///
    /// * `name` - Short name used in logs (e.g. `"trips"`)
    /// * `policy` - Eviction policy
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            entries: Arc::new(DashMap::new()),
            policy,
            metrics: None,
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a cache that reports hits, misses and coalesced joins.
    pub fn with_metrics(name: &'static str, policy: CachePolicy, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(name, policy)
        }
    }

    /// The eviction policy.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Look up an entry without fetching.
    ///
    /// A ready entry older than the policy TTL is reported as absent.
    pub fn get(&self, key: &K) -> Option<CacheEntry<K, V>> {
        let stored = self.entries.get(key)?;
        if self.is_expired(&stored) {
            return None;
        }
        let state = match &stored.slot {
            Slot::Pending { .. } => EntryState::Pending,
            Slot::Ready(value) => EntryState::Ready(Arc::clone(value)),
            Slot::Failed(e) => EntryState::Failed(e.clone()),
        };
        Some(CacheEntry {
            key: key.clone(),
            fetched_at: stored.fetched_at,
            state,
        })
    }

    /// Return the memoized value for `key`, fetching it with `producer` if
    /// there is no pending or ready entry.
    ///
    /// `producer` is only invoked when a new request is issued: for an
    /// absent, failed or expired entry.
    pub async fn fetch<F, Fut>(&self, key: K, producer: F) -> ServiceResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<V>> + Send + 'static,
    {
        let lookup = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = match &occupied.get().slot {
                    Slot::Ready(value) if !self.is_expired(occupied.get()) => {
                        Some(Lookup::Hit(Arc::clone(value)))
                    }
                    Slot::Pending { fetch, .. } => Some(Lookup::Join(fetch.clone())),
                    _ => None,
                };
                match existing {
                    Some(lookup) => lookup,
                    None => {
                        let (stored, fetch) = self.issue(&key, producer);
                        occupied.insert(stored);
                        Lookup::Issued(fetch)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let (stored, fetch) = self.issue(&key, producer);
                vacant.insert(stored);
                Lookup::Issued(fetch)
            }
        };

        match lookup {
            Lookup::Hit(value) => {
                if let Some(ref m) = self.metrics {
                    m.cache_hit();
                }
                Ok(value)
            }
            Lookup::Join(fetch) => {
                debug!(cache = self.name, key = ?key, "Request coalesced");
                if let Some(ref m) = self.metrics {
                    m.cache_coalesced();
                }
                fetch.await
            }
            Lookup::Issued(fetch) => {
                if let Some(ref m) = self.metrics {
                    m.cache_miss();
                }
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(fetch.clone());
                }
                self.enforce_bound();
                fetch.await
            }
        }
    }

    /// Remove an entry. A pending request for it still completes but is no
    /// longer memoized.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, in any state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn issue<F, Fut>(&self, key: &K, producer: F) -> (Stored<V>, SharedFetch<V>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<V>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = key.clone();
        let entries = Arc::downgrade(&self.entries);
        let name = self.name;
        let request = producer();

        debug!(cache = name, key = ?key, "Fetching");

        let fetch = async move {
            let result = request.await.map(Arc::new);
            settle(&entries, &key, id, &result);
            if let Err(ref e) = result {
                debug!(cache = name, key = ?key, error = %e, "Fetch failed");
            }
            result
        }
        .boxed()
        .shared();

        let stored = Stored {
            fetched_at: Instant::now(),
            slot: Slot::Pending {
                id,
                fetch: fetch.clone(),
            },
        };
        (stored, fetch)
    }

    fn is_expired(&self, stored: &Stored<V>) -> bool {
        match (self.policy.ttl, &stored.slot) {
            (Some(ttl), Slot::Ready(_)) => stored.fetched_at.elapsed() >= ttl,
            _ => false,
        }
    }

    fn enforce_bound(&self) {
        let Some(max_entries) = self.policy.max_entries else {
            return;
        };

        while self.entries.len() > max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|e| !matches!(e.slot, Slot::Pending { .. }))
                .min_by_key(|e| e.fetched_at)
                .map(|e| e.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    debug!(cache = self.name, key = ?key, "Evicted");
                    if let Some(ref m) = self.metrics {
                        m.cache_evicted();
                    }
                }
                None => break,
            }
        }
    }
}

/// Move the entry out of `Pending` if it still belongs to request `id`.
fn settle<K, V>(entries: &Weak<Entries<K, V>>, key: &K, id: u64, result: &ServiceResult<Arc<V>>)
where
    K: Eq + Hash,
{
    let Some(entries) = entries.upgrade() else {
        return;
    };
    if let Some(mut stored) = entries.get_mut(key) {
        if matches!(stored.slot, Slot::Pending { id: pending, .. } if pending == id) {
            stored.slot = match result {
                Ok(value) => Slot::Ready(Arc::clone(value)),
                Err(e) => Slot::Failed(e.clone()),
            };
            stored.fetched_at = Instant::now();
        }
    };
}
