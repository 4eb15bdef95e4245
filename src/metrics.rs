//! Operation counters for the cache (`metrics` feature).
//!
//! Each shard keeps a plain-integer [`ShardCounters`] mutated only under its
//! lock; [`Cache::metrics`](crate::cache::Cache::metrics) folds the shards
//! into one [`CacheMetricsSnapshot`] together with façade-level gauges.

use std::fmt;

/// Per-shard counters. Mutated under the owning shard's lock, so plain
/// integers suffice.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShardCounters {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    /// Misses caused by a deadline that had already passed.
    pub expired_misses: u64,

    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_updates: u64,
    /// New inserts admitted straight to Main because of a ghost hit.
    pub ghost_admits: u64,

    pub promotions: u64,
    pub main_requeues: u64,
    pub small_evictions: u64,
    pub main_evictions: u64,
    /// Queue handles popped whose entry was already tombstoned.
    pub stale_skips: u64,

    pub removes: u64,
    pub ghost_resets: u64,
}

impl ShardCounters {
    pub(crate) fn merge_into(&self, snap: &mut CacheMetricsSnapshot) {
        snap.get_calls += self.get_calls;
        snap.get_hits += self.get_hits;
        snap.get_misses += self.get_misses;
        snap.expired_misses += self.expired_misses;
        snap.insert_calls += self.insert_calls;
        snap.insert_new += self.insert_new;
        snap.insert_updates += self.insert_updates;
        snap.ghost_admits += self.ghost_admits;
        snap.promotions += self.promotions;
        snap.main_requeues += self.main_requeues;
        snap.small_evictions += self.small_evictions;
        snap.main_evictions += self.main_evictions;
        snap.stale_skips += self.stale_skips;
        snap.removes += self.removes;
        snap.ghost_resets += self.ghost_resets;
    }
}

/// Point-in-time metrics aggregated across every shard.
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct CacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub expired_misses: u64,

    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_updates: u64,
    pub ghost_admits: u64,

    pub promotions: u64,
    pub main_requeues: u64,
    pub small_evictions: u64,
    pub main_evictions: u64,
    pub stale_skips: u64,

    pub removes: u64,
    pub ghost_resets: u64,

    /// Persistence calls that failed and were degraded to a log line.
    pub store_failures: u64,

    // Gauges captured at snapshot time.
    pub cache_len: usize,
    pub capacity: usize,
    pub shards: usize,
}

impl CacheMetricsSnapshot {
    /// Fraction of `get` calls that hit, in `[0, 1]`. Zero when no gets ran.
    pub fn hit_rate(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}

impl fmt::Display for CacheMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheMetrics {{ gets: {} (hits: {}, misses: {}, expired: {}), hit_rate: {:.2}%, \
             inserts: {} (new: {}, updates: {}, ghost_admits: {}), promotions: {}, \
             main_requeues: {}, evictions: {}/{} (small/main), stale_skips: {}, removes: {}, \
             ghost_resets: {}, store_failures: {}, len: {}/{} over {} shards }}",
            self.get_calls,
            self.get_hits,
            self.get_misses,
            self.expired_misses,
            self.hit_rate() * 100.0,
            self.insert_calls,
            self.insert_new,
            self.insert_updates,
            self.ghost_admits,
            self.promotions,
            self.main_requeues,
            self.small_evictions,
            self.main_evictions,
            self.stale_skips,
            self.removes,
            self.ghost_resets,
            self.store_failures,
            self.cache_len,
            self.capacity,
            self.shards
        )
    }
}
