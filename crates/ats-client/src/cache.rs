//! TTL caches for slow-changing API data.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ats_core::Category;
use tokio::time::Instant;

/// Default lifetime of cached category listings; matches the API's own
/// server-side cache.
pub const DEFAULT_CATEGORY_TTL: Duration = Duration::from_secs(30 * 60);

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// A thread-safe map whose entries expire `ttl` after insertion.
///
/// Expired entries are dropped lazily on access.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a clone of the live entry for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including any not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Category listings keyed by the requested limit (`None` for unlimited).
pub type CategoryCache = TtlCache<Option<u32>, Vec<Category>>;

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY_TTL)
    }
}
