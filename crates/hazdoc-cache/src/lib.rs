//! Bounded key/value cache whose entries expire after a fixed time-to-live.
//!
//! Expiry is checked lazily on access; there is no background sweeper. Callers that know a
//! cached value went stale (for example after appending a reference-data row) call
//! [`TtlCache::invalidate`] or [`TtlCache::clear`] instead of waiting for the TTL.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

/// One hour, matching the refresh cadence of the reference spreadsheet.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

#[derive(Debug)]
pub struct TtlCache<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V> TtlCache<K, V> {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including ones that expired but were not yet touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a live entry. Expired entries are evicted and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = self.entries.peek(key)?.is_expired(self.ttl, Instant::now());
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Insert or replace, restarting the entry's TTL. Returns the displaced entry: the old
    /// value under `key`, or the least recently used entry when capacity forced an eviction.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries
            .push(key, entry)
            .map(|(evicted_key, evicted)| (evicted_key, evicted.value))
    }

    /// Drop one entry. Returns whether anything was cached under `key`.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    /// Return the cached value or compute, store and return a fresh one.
    ///
    /// Errors from `load` are passed through and nothing is cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value.clone());
        }
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
