//! Fetch-once image cache shared by the preview strategies.

use dashmap::DashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;

/// Values that finished loading stay in `ready` for the cache's lifetime.
/// Loads in progress sit in `in_flight` so concurrent callers share them.
pub struct TileCache<K, V> {
    ready: DashMap<K, V>,
    in_flight: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for TileCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TileCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            ready: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.ready.get(key).map(|v| v.value().clone())
    }

    /// True when the key is loaded or a load is running.
    pub fn contains(&self, key: &K) -> bool {
        self.ready.contains_key(key) || self.in_flight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Get a cached value or load it exactly once even under concurrent
    /// requests. Failures are logged and reported as `None`; nothing is
    /// cached so a later call retries.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        // Fast path: already cached
        if let Some(value) = self.get(&key) {
            return Some(value);
        }

        // Slow path: get-or-create an in-flight cell for this key
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        // Clears the in-flight entry however this call ends, cancellation included.
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: &key,
            cell: &cell,
        };

        // A load may have finished between the fast path and the cell lookup.
        if let Some(value) = self.get(&key) {
            return Some(value);
        }

        match cell.get_or_try_init(fetch).await {
            Ok(value) => {
                // Published before the guard drops so `contains` never flickers.
                self.ready.insert(key.clone(), value.clone());
                Some(value.clone())
            }
            Err(e) => {
                debug!(key = ?key, error = %e, "tile fetch failed");
                None
            }
        }
    }
}

struct InFlightGuard<'a, K, V>
where
    K: Eq + Hash,
{
    in_flight: &'a DashMap<K, Arc<OnceCell<V>>>,
    key: &'a K,
    cell: &'a Arc<OnceCell<V>>,
}

impl<K, V> Drop for InFlightGuard<'_, K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.in_flight
            .remove_if(self.key, |_, c| Arc::ptr_eq(c, self.cell));
    }
}
