//! Cache construction and configuration.
//!
//! [`CacheBuilder`] validates every knob before any shard is allocated, so a
//! misconfigured cache is a [`ConfigError`] instead of a half-built handle.
//!
//! ## Options
//!
//! | Option        | Default                  | Constraint                  |
//! |---------------|--------------------------|-----------------------------|
//! | `capacity`    | required                 | `>= 1`                      |
//! | `default_ttl` | `Duration::ZERO` (never) | any                         |
//! | `fp_rate`     | `0.01`                   | in `(0, 1)`                 |
//! | `shards`      | derived from capacity    | power of two                |
//! | `clock`       | [`SystemClock`]          | -                           |
//! | `store`       | none                     | -                           |
//!
//! When unset, the shard count targets a few thousand entries per shard:
//! `min(64, max(1, next_pow2(capacity / 1024)))`.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use fifokit::builder::CacheBuilder;
//!
//! let cache = CacheBuilder::new(10_000)
//!     .default_ttl(Duration::from_secs(60))
//!     .fp_rate(0.01)
//!     .build()
//!     .unwrap();
//!
//! cache.insert("session:1", 1u64);
//! assert_eq!(cache.get(&"session:1"), Some(1));
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::store::Store;

const DEFAULT_FP_RATE: f64 = 0.01;

/// Maximum automatically chosen shard count.
const MAX_AUTO_SHARDS: usize = 64;

/// Target live entries per shard when the shard count is derived.
const ENTRIES_PER_SHARD: usize = 1024;

/// Builder for [`Cache`].
pub struct CacheBuilder<K, V> {
    capacity: usize,
    default_ttl: Duration,
    fp_rate: f64,
    shards: Option<usize>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn Store<K, V>>>,
}

impl<K, V> CacheBuilder<K, V> {
    /// Starts a builder for a cache bounded to `capacity` live entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            default_ttl: Duration::ZERO,
            fp_rate: DEFAULT_FP_RATE,
            shards: None,
            clock: None,
            store: None,
        }
    }

    /// TTL applied when an insert passes `Duration::ZERO`. Zero (the
    /// default) disables expiry.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Target false-positive rate of each shard's ghost filter.
    pub fn fp_rate(mut self, fp_rate: f64) -> Self {
        self.fp_rate = fp_rate;
        self
    }

    /// Fixes the shard count instead of deriving it from capacity. Must be
    /// a power of two.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Injects the clock driving TTL deadlines.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Attaches a persistence backend, mirrored on writes and replayed at
    /// construction.
    pub fn store(mut self, store: Arc<dyn Store<K, V>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validates the configuration and constructs the cache.
    ///
    /// When a store is attached, its contents are replayed into memory
    /// before the cache is returned; a failing backend logs a warning and
    /// yields an empty cache.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when `capacity < 1`, `fp_rate` is outside `(0, 1)`,
    /// or an explicit shard count is not a power of two.
    pub fn build(self) -> Result<Cache<K, V>, ConfigError>
    where
        K: Hash,
    {
        if self.capacity < 1 {
            return Err(ConfigError::new(format!(
                "capacity must be >= 1, got {}",
                self.capacity
            )));
        }

        if !self.fp_rate.is_finite() || self.fp_rate <= 0.0 || self.fp_rate >= 1.0 {
            return Err(ConfigError::new(format!(
                "fp_rate must be in (0, 1), got {}",
                self.fp_rate
            )));
        }

        let shards = match self.shards {
            Some(shards) => {
                if shards == 0 || !shards.is_power_of_two() {
                    return Err(ConfigError::new(format!(
                        "shards must be a nonzero power of two, got {}",
                        shards
                    )));
                }
                shards
            },
            None => auto_shards(self.capacity),
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);

        let cache = Cache::from_parts(
            self.capacity,
            shards,
            self.default_ttl,
            self.fp_rate,
            clock,
            self.store,
        );
        cache.warm_load();
        Ok(cache)
    }
}

/// Derives a shard count that keeps each shard in the thousands of entries.
fn auto_shards(capacity: usize) -> usize {
    (capacity / ENTRIES_PER_SHARD)
        .next_power_of_two()
        .clamp(1, MAX_AUTO_SHARDS)
}
