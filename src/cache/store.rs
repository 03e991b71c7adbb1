//! In-process TTL cache with hit/miss/eviction accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::SharedClock;
use crate::observability::metrics;

/// Stand-in expiry when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

struct Inner<V> {
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    max_entries: usize,
    clock: SharedClock,
}

/// A thread-safe key/value store whose entries expire.
///
/// Cloning is cheap and every clone shares the same table and counters.
/// Expired entries are removed when a lookup sees them or on
/// [`TtlCache::sweep_expired`]; each such removal counts as an eviction.
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entries.len())
            .field("max_entries", &self.inner.max_entries)
            .finish()
    }
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Missing,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache. `max_entries = 0` means unbounded.
    pub fn new(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                max_entries,
                clock,
            }),
        }
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.now();

        // The read guard must be released before removing.
        let lookup = match self.inner.entries.get(key) {
            Some(entry) if entry.is_valid(now) => {
                tracing::trace!(key, age_ms = now.duration_since(entry.created_at).as_millis() as u64, "Cache hit");
                Lookup::Hit(entry.value.clone())
            }
            Some(_) => Lookup::Expired,
            None => Lookup::Missing,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_hit();
                Some(value)
            }
            Lookup::Expired => {
                if self
                    .inner
                    .entries
                    .remove_if(key, |_, entry| !entry.is_valid(now))
                    .is_some()
                {
                    self.record_evictions(1);
                }
                self.record_miss();
                None
            }
            Lookup::Missing => {
                self.record_miss();
                None
            }
        }
    }

    /// Store `value` for `ttl`, replacing any previous entry.
    ///
    /// A `ttl` too large to represent is clamped to roughly a century.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let now = self.inner.clock.now();

        if self.inner.max_entries > 0
            && self.inner.entries.len() >= self.inner.max_entries
            && !self.inner.entries.contains_key(key)
        {
            self.make_room(now);
        }

        self.inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: expiry(now, ttl),
            },
        );
        metrics::record_cache_size(self.inner.entries.len());
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let existed = self.inner.entries.remove(key).is_some();
        metrics::record_cache_size(self.inner.entries.len());
        existed
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner.entries.clear();
        metrics::record_cache_size(0);
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let removed = self.remove_expired(self.inner.clock.now());
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
        metrics::record_cache_size(self.inner.entries.len());
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.inner.entries.len(),
            hits,
            misses,
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Time until `key` expires, without touching the counters.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = self.inner.clock.now();
        self.inner
            .entries
            .get(key)
            .filter(|entry| entry.is_valid(now))
            .map(|entry| entry.expires_at.duration_since(now))
    }

    fn remove_expired(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.inner.entries.retain(|_, entry| {
            let keep = entry.is_valid(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.record_evictions(removed as u64);
        removed
    }

    /// Free a slot: expired entries first, then whatever expires soonest.
    fn make_room(&self, now: Instant) {
        if self.remove_expired(now) > 0 {
            return;
        }

        let victim = self
            .inner
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            if self.inner.entries.remove(&key).is_some() {
                tracing::debug!(key = %key, "Cache full, evicted entry nearest expiry");
                self.record_evictions(1);
            }
        }
    }

    fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
    }

    fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.inner.evictions.fetch_add(count, Ordering::Relaxed);
            metrics::record_cache_evictions(count);
        }
    }
}
