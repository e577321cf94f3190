//! Bounded, thread-safe key → value store with least-recently-used eviction.
//!
//! A single store-wide [`Mutex`] serializes every operation. Lock scopes cover
//! exactly one in-memory map operation; nothing awaits or performs I/O while
//! the lock is held, so the store is safe to call from async tasks and plain
//! threads alike.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::ConfigError;

/// A single stored value plus the time it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Write time, compared against the store's TTL.
    pub created_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

/// Point-in-time snapshot of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that found nothing, expired entries included.
    pub misses: u64,
    pub insertions: u64,
    /// Entries pushed out by the capacity bound.
    pub evictions: u64,
    pub expirations: u64,
    /// Explicit removals that found an entry.
    pub removals: u64,
}

impl CacheStats {
    /// Fraction of lookups that were served from the store.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    removals: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

/// Bounded LRU store shared across request tasks.
///
/// Values are handed out as clones; the store keeps sole ownership of its
/// entries. Share it between tasks with an [`Arc`](std::sync::Arc).
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheStore;
///
/// let store = CacheStore::new(2).unwrap();
/// store.set("/a", "one".to_string());
/// store.set("/b", "two".to_string());
/// store.get("/a"); // `/a` is now the most recently used
/// store.set("/c", "three".to_string());
///
/// assert_eq!(store.get("/b"), None);
/// assert_eq!(store.get("/a").as_deref(), Some("one"));
/// ```
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Option<Duration>,
    counters: Counters,
}

impl<V: Clone> CacheStore<V> {
    /// Creates an empty store holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: None,
            counters: Counters::default(),
        })
    }

    /// Entries older than `ttl` are treated as absent and dropped on lookup.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns a clone of the value stored under `key`, marking it most
    /// recently used. Expired entries are removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(self.ttl),
            None => {
                Counters::bump(&self.counters.misses);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            drop(entries);
            trace!(key, "cache entry expired");
            Counters::bump(&self.counters.expirations);
            Counters::bump(&self.counters.misses);
            return None;
        }

        let value = entries.get(key).map(|entry| entry.value.clone());
        Counters::bump(&self.counters.hits);
        value
    }

    /// Inserts or overwrites the value for `key`. At capacity the least
    /// recently used entry is evicted first; this never fails.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let displaced = self
            .entries
            .lock()
            .push(key.clone(), CacheEntry::new(value));

        Counters::bump(&self.counters.insertions);
        // `push` also hands back the previous value when overwriting a key;
        // only a different key means something was evicted.
        if let Some((evicted, _)) = displaced {
            if evicted != key {
                debug!(key = %evicted, "evicted least recently used entry");
                Counters::bump(&self.counters.evictions);
            }
        }
    }

    /// Deletes the entry for `key`. Returns `true` if one was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.lock().pop(key).is_some();
        if removed {
            Counters::bump(&self.counters.removals);
        }
        removed
    }

    /// Drops every entry. Counters are left untouched.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Snapshot of the keys currently held, for diagnostics only.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Number of entries currently held, expired ones included until a `get`
    /// notices them.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of entries before the least recently used one is
    /// evicted.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// The entry lifetime, or `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Snapshot of the counters accumulated since the store was created.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::cache::CacheStore;
    ///
    /// let store = CacheStore::new(4).unwrap();
    /// store.set("/test/1", "body");
    /// assert!(store.get("/test/1").is_some());
    /// assert!(store.get("/test/2").is_none());
    ///
    /// let stats = store.stats();
    /// assert_eq!((stats.hits, stats.misses, stats.insertions), (1, 1, 1));
    /// ```
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
