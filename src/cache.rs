//! Sharded concurrent cache façade.
//!
//! [`Cache`] routes every operation through a single key hash: the high bits
//! of the 64-bit fingerprint pick a shard, the shard's `parking_lot::Mutex`
//! is the only blocking point, and the locked [`S3FifoCore`] does the rest.
//! Two keys on different shards never contend.
//!
//! ```text
//! get/insert/remove(key)
//!     │ hash once
//!     ▼
//! fp ──► (fp >> 32) & (shards-1) ──► Mutex<S3FifoCore> ──► S3-FIFO engine
//! ```
//!
//! Optional collaborators:
//!
//! - a [`Store`] mirror, written on insert/remove and read once at
//!   construction for warm-loading; failures are logged and swallowed;
//! - a [`Clock`] driving TTL deadlines, injectable for deterministic tests.
//!
//! ## Example
//!
//! ```
//! use fifokit::builder::CacheBuilder;
//!
//! let cache = CacheBuilder::new(10_000).build().unwrap();
//!
//! cache.insert("user:1", 42u64);
//! assert_eq!(cache.get(&"user:1"), Some(42));
//!
//! cache.remove(&"user:1");
//! assert_eq!(cache.get(&"user:1"), None);
//! ```

use std::hash::Hash;
#[cfg(feature = "metrics")]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::ds::fingerprint::{shard_for_fingerprint, Fingerprinter};
#[cfg(feature = "metrics")]
use crate::metrics::CacheMetricsSnapshot;
use crate::policy::S3FifoCore;
use crate::store::Store;

/// Concurrent, capacity-bounded key-value cache.
///
/// Cheap to clone (clones share the same shards). All methods take `&self`;
/// the cache is `Send + Sync` whenever `K` and `V` are.
///
/// Construct via [`CacheBuilder`](crate::builder::CacheBuilder).
pub struct Cache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<K, V> {
    shards: Vec<Mutex<S3FifoCore<K, V>>>,
    fingerprinter: Fingerprinter,
    capacity: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn Store<K, V>>>,
    closed: AtomicBool,
    #[cfg(feature = "metrics")]
    store_failures: AtomicU64,
}

impl<K, V> Cache<K, V>
where
    K: Hash,
{
    pub(crate) fn from_parts(
        capacity: usize,
        shards: usize,
        default_ttl: Duration,
        fp_rate: f64,
        clock: Arc<dyn Clock>,
        store: Option<Arc<dyn Store<K, V>>>,
    ) -> Self {
        debug_assert!(shards.is_power_of_two());
        let shard_capacity = capacity.div_ceil(shards).max(1);

        Self {
            inner: Arc::new(CacheInner {
                shards: (0..shards)
                    .map(|_| Mutex::new(S3FifoCore::new(shard_capacity, fp_rate)))
                    .collect(),
                fingerprinter: Fingerprinter::default(),
                capacity,
                default_ttl,
                clock,
                store,
                closed: AtomicBool::new(false),
                #[cfg(feature = "metrics")]
                store_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Replays persisted entries into memory, tolerating a failed backend.
    pub(crate) fn warm_load(&self) {
        let Some(store) = self.inner.store.clone() else {
            return;
        };

        match store.load() {
            Ok(entries) => {
                let count = entries.len();
                let now = self.inner.clock.now();
                for (key, value, ttl) in entries {
                    self.insert_entry(key, value, ttl.map(|remaining| now + remaining));
                }
                debug!(entries = count, "warm-loaded cache from store");
            },
            Err(err) => {
                self.note_store_failure();
                warn!(error = %err, "store load failed; starting empty");
            },
        }
    }

    /// Retrieves a cloned value, bumping the entry's frequency.
    ///
    /// Expired entries count as misses and are lazily removed. For
    /// non-cloneable values use [`get_with`](Self::get_with).
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Applies `f` to the cached value under the shard lock.
    ///
    /// Bumps the entry's frequency like [`get`](Self::get) but avoids a
    /// clone.
    ///
    /// # Example
    ///
    /// ```
    /// use fifokit::builder::CacheBuilder;
    ///
    /// let cache = CacheBuilder::new(10).build().unwrap();
    /// cache.insert("key", vec![1, 2, 3]);
    ///
    /// assert_eq!(cache.get_with(&"key", |v| v.len()), Some(3));
    /// ```
    pub fn get_with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }

        let fp = self.inner.fingerprinter.fingerprint(key);
        let now = self.inner.clock.now();
        let mut core = self.shard(fp).lock();
        core.get(fp, now).map(f)
    }

    /// Returns `true` if `key` maps to a live, unexpired entry.
    ///
    /// Does not bump the frequency.
    pub fn contains(&self, key: &K) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let fp = self.inner.fingerprinter.fingerprint(key);
        let now = self.inner.clock.now();
        self.shard(fp).lock().contains(fp, now)
    }

    /// Inserts or overwrites `key` with the cache's default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, Duration::ZERO);
    }

    /// Inserts or overwrites `key` with an explicit TTL.
    ///
    /// A zero `ttl` falls back to the configured default; a zero default
    /// means the entry never expires. When a store is configured the write
    /// is mirrored first; a backend failure is logged and the in-memory
    /// insert proceeds regardless.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }

        let effective = if ttl.is_zero() {
            self.inner.default_ttl
        } else {
            ttl
        };

        if let Some(store) = &self.inner.store {
            let persisted_ttl = (!effective.is_zero()).then_some(effective);
            if let Err(err) = store.put(&key, &value, persisted_ttl) {
                self.note_store_failure();
                warn!(error = %err, "store put failed; cached in memory only");
            }
        }

        let expiry = (!effective.is_zero()).then(|| self.inner.clock.now() + effective);
        self.insert_entry(key, value, expiry);
    }

    /// Removes `key`, returning whether a live entry was dropped.
    ///
    /// A removed key is recorded in the shard's ghost filter, so an early
    /// re-insert is admitted straight to the Main queue. The backend delete
    /// (when configured) runs even if the key was already evicted from
    /// memory.
    pub fn remove(&self, key: &K) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let fp = self.inner.fingerprinter.fingerprint(key);
        let removed = self.shard(fp).lock().remove(fp).is_some();

        if let Some(store) = &self.inner.store {
            if let Err(err) = store.delete(key) {
                self.note_store_failure();
                warn!(error = %err, "store delete failed");
            }
        }

        removed
    }

    /// Approximate number of live entries (sum of per-shard counts, taken
    /// one shard at a time).
    pub fn len(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| shard.lock().len())
            .sum()
    }

    /// Returns `true` if no shard holds a live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// Live entries across every shard's Small queue.
    pub fn small_len(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| shard.lock().small_len())
            .sum()
    }

    /// Live entries across every shard's Main queue.
    pub fn main_len(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| shard.lock().main_len())
            .sum()
    }

    /// Drops every shard's contents and marks the cache closed.
    ///
    /// After `close`, `get` returns `None` and `insert`/`remove` are silent
    /// no-ops. Closing twice is harmless. The persistence backend is left
    /// untouched, so a future cache can warm-load from it.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for shard in &self.inner.shards {
            shard.lock().clear();
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Aggregated operation counters plus point-in-time gauges.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        let mut snap = CacheMetricsSnapshot::default();
        for shard in &self.inner.shards {
            let core = shard.lock();
            core.counters.merge_into(&mut snap);
            snap.cache_len += core.len();
        }
        snap.capacity = self.inner.capacity;
        snap.shards = self.inner.shards.len();
        snap.store_failures = self.inner.store_failures.load(Ordering::Relaxed);
        snap
    }

    /// In-memory insert shared by the public path and warm-loading.
    fn insert_entry(&self, key: K, value: V, expiry: Option<Duration>) {
        let fp = self.inner.fingerprinter.fingerprint(&key);
        let mut core = self.shard(fp).lock();
        // Re-checked under the lock so a racing close() cannot leave
        // entries behind in an already-cleared shard.
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        core.insert(fp, key, value, expiry);
    }

    #[inline]
    fn shard(&self, fp: u64) -> &Mutex<S3FifoCore<K, V>> {
        &self.inner.shards[shard_for_fingerprint(fp, self.inner.shards.len())]
    }

    fn note_store_failure(&self) {
        #[cfg(feature = "metrics")]
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.inner.capacity)
            .field("shards", &self.inner.shards.len())
            .field("default_ttl", &self.inner.default_ttl)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
