//! S3-FIFO (Simple, Scalable, Scan-resistant FIFO) eviction core.
//!
//! [`S3FifoCore`] is the single-shard engine behind the cache: a fingerprint
//! index over a slot arena, two FIFO queues, and a Bloom-backed ghost set.
//! It is not synchronized; [`Cache`](crate::cache::Cache) wraps one core per
//! shard in a `parking_lot::Mutex`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        S3FifoCore<K, V> Layout                       │
//! │                                                                      │
//! │   index: FxHashMap<u64, SlotId>       slots: Vec<Slot<K, V>>         │
//! │                                                                      │
//! │   ┌──────────────┬────────┐          ┌────────┬───────────────────┐  │
//! │   │ fingerprint  │ SlotId │          │  slot  │ key, value, freq, │  │
//! │   ├──────────────┼────────┤          │        │ expiry, queue     │  │
//! │   │ 0x7a2f…      │   0    │─────────►│   0    │ Occupied(…)       │  │
//! │   │ 0x91c4…      │   2    │─────────►│   2    │ Occupied(…)       │  │
//! │   └──────────────┴────────┘          │   1    │ Tombstone         │  │
//! │                                      └────────┴───────────────────┘  │
//! │                                                                      │
//! │   SMALL (entrance FIFO, ~10%)        MAIN (long-lived FIFO, ~90%)    │
//! │   head ──► [s0][s1][s2] ◄── tail     head ──► [m0][m1] … ◄── tail    │
//! │   evict/promote here    insert       evict/requeue     promote and   │
//! │                         here         here              insert here   │
//! │                                                                      │
//! │   GHOST: BlockedBloom over fingerprints of evicted entries           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm
//!
//! ```text
//! insert(fp, key, value, expiry):
//!   1. fp already indexed?  overwrite value/expiry, reset freq to 0, stay put
//!   2. fp in ghost?         append to Main tail (ghost-guided admission)
//!      otherwise            append to Small tail
//!   3. while |Small| > small_cap:      evict_small
//!   4. while |Small|+|Main| > capacity: evict_main
//!
//! evict_small:  pop Small head
//!   freq >= 1   move to Main tail, frequency retained
//!   freq == 0   drop entry, record fingerprint in ghost
//!
//! evict_main:   pop Main head
//!   freq >= 1   decrement freq, requeue at Main tail (second chance)
//!   freq == 0   drop entry, record fingerprint in ghost
//!
//! get(fp, now): index lookup; expired deadline counts as a miss and lazily
//! removes the entry; a hit bumps freq (saturating at 3) without moving the
//! entry between queues.
//! ```
//!
//! Queue nodes are slot indices, never pointers. An entry that is removed
//! while its queue handle is still enqueued (delete, lazy expiry) leaves a
//! `Tombstone` in its slot; the handle is skipped and the slot reclaimed
//! when eviction drains it. Slots are reused only after their handle drains,
//! so a queue never references a recycled slot.
//!
//! ## References
//!
//! - Yang et al., "FIFO queues are all you need for cache eviction", SOSP 2023

use std::collections::VecDeque;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::ds::BlockedBloom;
#[cfg(feature = "metrics")]
use crate::metrics::ShardCounters;

/// Maximum frequency value (2 bits, saturating).
const MAX_FREQ: u8 = 3;

/// Handle into the slot arena.
type SlotId = u32;

/// Which FIFO currently owns an entry. Ghost membership is implicit in the
/// Bloom filter; a ghost is never a live entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum QueueKind {
    Small,
    Main,
}

/// One cached record.
#[derive(Debug)]
struct Entry<K, V> {
    fp: u64,
    key: K,
    value: V,
    freq: u8,
    /// Monotonic deadline against the cache clock; `None` never expires.
    expiry: Option<Duration>,
    queue: QueueKind,
}

impl<K, V> Entry<K, V> {
    #[inline]
    fn is_expired(&self, now: Duration) -> bool {
        self.expiry.is_some_and(|deadline| deadline <= now)
    }
}

/// Arena cell. The index only ever points at `Occupied` slots.
#[derive(Debug)]
enum Slot<K, V> {
    Occupied(Entry<K, V>),
    /// Dropped from the index while its queue handle is still enqueued.
    Tombstone,
    /// On the free list; no queue handle references it.
    Free,
}

/// Single-shard S3-FIFO engine over 64-bit key fingerprints.
///
/// The fingerprint is the identity: callers hash the key once (see
/// [`Fingerprinter`](crate::ds::Fingerprinter)) and pass the same value to
/// every operation. All methods take `&mut self`; the façade provides the
/// locking.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use fifokit::policy::s3_fifo::S3FifoCore;
///
/// let mut core: S3FifoCore<u64, &str> = S3FifoCore::new(100, 0.01);
///
/// core.insert(1, 1, "hello", None);
/// assert_eq!(core.get(1, Duration::ZERO), Some(&"hello"));
/// assert_eq!(core.len(), 1);
/// ```
pub struct S3FifoCore<K, V> {
    /// Fingerprint -> slot handle for every live entry.
    index: FxHashMap<u64, SlotId>,

    /// Slot arena; queue handles index into it.
    slots: Vec<Slot<K, V>>,
    free: Vec<SlotId>,

    /// Entrance FIFO: head is evicted/promoted first.
    small: VecDeque<SlotId>,
    /// Long-lived FIFO: head is evicted/requeued first.
    main: VecDeque<SlotId>,

    /// Live (non-tombstoned) entries per queue.
    small_live: usize,
    main_live: usize,

    capacity: usize,
    small_cap: usize,

    /// Fingerprints of recently evicted entries.
    ghost: BlockedBloom,
    ghost_cap: usize,

    #[cfg(feature = "metrics")]
    pub(crate) counters: ShardCounters,
}

impl<K, V> S3FifoCore<K, V> {
    /// Creates a core bounded to `capacity` live entries, with a ghost filter
    /// targeting `fp_rate`.
    ///
    /// The Small queue is capped at `max(1, capacity / 10)`; the ghost filter
    /// is sized for the full capacity and reset once it has absorbed that
    /// many evictions.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. The builder validates configuration
    /// before any core is constructed.
    pub fn new(capacity: usize, fp_rate: f64) -> Self {
        assert!(capacity > 0, "shard capacity must be greater than zero");

        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            small: VecDeque::new(),
            main: VecDeque::new(),
            small_live: 0,
            main_live: 0,
            capacity,
            small_cap: (capacity / 10).max(1),
            ghost: BlockedBloom::new(capacity, fp_rate),
            ghost_cap: capacity,
            #[cfg(feature = "metrics")]
            counters: ShardCounters::default(),
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no live entries remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Maximum live entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live entries in the Small queue.
    #[inline]
    pub fn small_len(&self) -> usize {
        self.small_live
    }

    /// Live entries in the Main queue.
    #[inline]
    pub fn main_len(&self) -> usize {
        self.main_live
    }

    /// Maximum live entries in the Small queue.
    #[inline]
    pub fn small_capacity(&self) -> usize {
        self.small_cap
    }

    /// Evictions absorbed by the ghost filter since its last reset.
    #[inline]
    pub fn ghost_entries(&self) -> usize {
        self.ghost.entries()
    }

    /// Looks up a live, unexpired entry and bumps its frequency.
    ///
    /// An entry whose deadline has passed is removed from the index here
    /// (its queue handle is tombstoned for later drain) and reported as a
    /// miss. A hit never moves the entry between queues.
    pub fn get(&mut self, fp: u64, now: Duration) -> Option<&V> {
        #[cfg(feature = "metrics")]
        {
            self.counters.get_calls += 1;
        }

        let slot = match self.index.get(&fp) {
            Some(&slot) => slot,
            None => {
                #[cfg(feature = "metrics")]
                {
                    self.counters.get_misses += 1;
                }
                return None;
            },
        };

        if self.occupied(slot).is_expired(now) {
            self.tombstone(fp, slot);
            #[cfg(feature = "metrics")]
            {
                self.counters.get_misses += 1;
                self.counters.expired_misses += 1;
            }
            return None;
        }

        #[cfg(feature = "metrics")]
        {
            self.counters.get_hits += 1;
        }

        let entry = self.occupied_mut(slot);
        entry.freq = (entry.freq + 1).min(MAX_FREQ);
        Some(&entry.value)
    }

    /// Returns `true` if `fp` maps to a live, unexpired entry.
    ///
    /// Unlike [`get`](Self::get), this neither bumps the frequency nor
    /// performs lazy expiry.
    pub fn contains(&self, fp: u64, now: Duration) -> bool {
        match self.index.get(&fp) {
            Some(&slot) => !self.occupied(slot).is_expired(now),
            None => false,
        }
    }

    /// Inserts or overwrites the entry for `fp`.
    ///
    /// - Existing fingerprint: the value and deadline are replaced, the
    ///   frequency resets to 0, and the entry stays in its current queue.
    /// - New fingerprint: admitted at the Main tail when the ghost filter
    ///   remembers it, otherwise at the Small tail; then the queues are
    ///   rebalanced (Small trimmed to its cap first, then total trimmed to
    ///   capacity).
    ///
    /// Returns the previous value when the fingerprint was already indexed.
    pub fn insert(&mut self, fp: u64, key: K, value: V, expiry: Option<Duration>) -> Option<V> {
        #[cfg(feature = "metrics")]
        {
            self.counters.insert_calls += 1;
        }

        if let Some(&slot) = self.index.get(&fp) {
            #[cfg(feature = "metrics")]
            {
                self.counters.insert_updates += 1;
            }
            let entry = self.occupied_mut(slot);
            entry.key = key;
            entry.expiry = expiry;
            entry.freq = 0;
            return Some(std::mem::replace(&mut entry.value, value));
        }

        let ghost_hit = self.ghost.contains(fp);
        #[cfg(feature = "metrics")]
        {
            self.counters.insert_new += 1;
            if ghost_hit {
                self.counters.ghost_admits += 1;
            }
        }

        let queue = if ghost_hit {
            QueueKind::Main
        } else {
            QueueKind::Small
        };

        let slot = self.alloc(Entry {
            fp,
            key,
            value,
            freq: 0,
            expiry,
            queue,
        });
        self.index.insert(fp, slot);
        match queue {
            QueueKind::Small => {
                self.small.push_back(slot);
                self.small_live += 1;
            },
            QueueKind::Main => {
                self.main.push_back(slot);
                self.main_live += 1;
            },
        }

        // Small overflows are resolved first, then total capacity. Each
        // round performs exactly one promotion, requeue, or eviction.
        while self.small_live > self.small_cap {
            if !self.evict_small() {
                break;
            }
        }
        while self.small_live + self.main_live > self.capacity {
            if !self.evict_main() {
                break;
            }
        }

        None
    }

    /// Removes the entry for `fp`, recording it in the ghost filter.
    ///
    /// The queue handle stays behind as a tombstone and is reclaimed when
    /// eviction drains it.
    pub fn remove(&mut self, fp: u64) -> Option<V> {
        let slot = match self.index.get(&fp) {
            Some(&slot) => slot,
            None => return None,
        };

        let entry = self.tombstone(fp, slot);
        self.ghost_record(fp);
        #[cfg(feature = "metrics")]
        {
            self.counters.removes += 1;
        }
        Some(entry.value)
    }

    /// Iterates over live entries in unspecified order.
    ///
    /// Entries past their deadline that no operation has touched yet are
    /// still yielded; expiry is reclaimed lazily.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some((&entry.key, &entry.value)),
            _ => None,
        })
    }

    /// Drops every entry and resets the ghost filter.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.small.clear();
        self.main.clear();
        self.small_live = 0;
        self.main_live = 0;
        self.ghost.reset();
    }

    /// One round of Small-queue pressure relief.
    ///
    /// Skips drained tombstones, then either promotes the head into Main
    /// (frequency retained) or evicts it into ghost. Returns `false` only
    /// when the queue had no live entry left.
    fn evict_small(&mut self) -> bool {
        while let Some(slot) = self.small.pop_front() {
            let freq = match &self.slots[slot as usize] {
                Slot::Tombstone => {
                    self.release(slot);
                    #[cfg(feature = "metrics")]
                    {
                        self.counters.stale_skips += 1;
                    }
                    continue;
                },
                Slot::Occupied(entry) => entry.freq,
                Slot::Free => panic!("small queue handle points at a freed slot"),
            };

            if freq >= 1 {
                let entry = self.occupied_mut(slot);
                entry.queue = QueueKind::Main;
                self.small_live -= 1;
                self.main_live += 1;
                self.main.push_back(slot);
                #[cfg(feature = "metrics")]
                {
                    self.counters.promotions += 1;
                }
            } else {
                let entry = self.vacate(slot);
                self.index.remove(&entry.fp);
                self.small_live -= 1;
                self.ghost_record(entry.fp);
                #[cfg(feature = "metrics")]
                {
                    self.counters.small_evictions += 1;
                }
            }
            return true;
        }

        debug_assert_eq!(self.small_live, 0, "small queue drained but live count nonzero");
        false
    }

    /// One round of Main-queue pressure relief.
    ///
    /// Skips drained tombstones, then either requeues the head with its
    /// frequency decremented (second chance) or evicts it into ghost. Falls
    /// back to the Small queue if Main has nothing live.
    fn evict_main(&mut self) -> bool {
        while let Some(slot) = self.main.pop_front() {
            let freq = match &self.slots[slot as usize] {
                Slot::Tombstone => {
                    self.release(slot);
                    #[cfg(feature = "metrics")]
                    {
                        self.counters.stale_skips += 1;
                    }
                    continue;
                },
                Slot::Occupied(entry) => entry.freq,
                Slot::Free => panic!("main queue handle points at a freed slot"),
            };

            if freq >= 1 {
                self.occupied_mut(slot).freq = freq - 1;
                self.main.push_back(slot);
                #[cfg(feature = "metrics")]
                {
                    self.counters.main_requeues += 1;
                }
            } else {
                let entry = self.vacate(slot);
                self.index.remove(&entry.fp);
                self.main_live -= 1;
                self.ghost_record(entry.fp);
                #[cfg(feature = "metrics")]
                {
                    self.counters.main_evictions += 1;
                }
            }
            return true;
        }

        debug_assert_eq!(self.main_live, 0, "main queue drained but live count nonzero");
        self.evict_small()
    }

    /// Records an evicted fingerprint, resetting the filter once it has
    /// absorbed a full capacity's worth of history.
    fn ghost_record(&mut self, fp: u64) {
        self.ghost.add(fp);
        if self.ghost.entries() > self.ghost_cap {
            self.ghost.reset();
            #[cfg(feature = "metrics")]
            {
                self.counters.ghost_resets += 1;
            }
        }
    }

    /// Drops a live entry from the index, leaving its queue handle behind as
    /// a tombstone. Returns the entry.
    fn tombstone(&mut self, fp: u64, slot: SlotId) -> Entry<K, V> {
        self.index.remove(&fp);
        match std::mem::replace(&mut self.slots[slot as usize], Slot::Tombstone) {
            Slot::Occupied(entry) => {
                match entry.queue {
                    QueueKind::Small => self.small_live -= 1,
                    QueueKind::Main => self.main_live -= 1,
                }
                entry
            },
            _ => panic!("tombstoned a slot without a live entry"),
        }
    }

    /// Stores an entry in a free slot (reusing drained slots first).
    fn alloc(&mut self, entry: Entry<K, V>) -> SlotId {
        match self.free.pop() {
            Some(slot) => {
                debug_assert!(matches!(self.slots[slot as usize], Slot::Free));
                self.slots[slot as usize] = Slot::Occupied(entry);
                slot
            },
            None => {
                let slot = self.slots.len() as SlotId;
                self.slots.push(Slot::Occupied(entry));
                slot
            },
        }
    }

    /// Reclaims a tombstoned slot whose queue handle has just drained.
    fn release(&mut self, slot: SlotId) {
        debug_assert!(matches!(self.slots[slot as usize], Slot::Tombstone));
        self.slots[slot as usize] = Slot::Free;
        self.free.push(slot);
    }

    /// Frees an occupied slot whose queue handle has just drained, returning
    /// the entry.
    fn vacate(&mut self, slot: SlotId) -> Entry<K, V> {
        match std::mem::replace(&mut self.slots[slot as usize], Slot::Free) {
            Slot::Occupied(entry) => {
                self.free.push(slot);
                entry
            },
            _ => panic!("vacated a slot without a live entry"),
        }
    }

    #[inline]
    fn occupied(&self, slot: SlotId) -> &Entry<K, V> {
        match &self.slots[slot as usize] {
            Slot::Occupied(entry) => entry,
            _ => panic!("index handle points at a vacated slot"),
        }
    }

    #[inline]
    fn occupied_mut(&mut self, slot: SlotId) -> &mut Entry<K, V> {
        match &mut self.slots[slot as usize] {
            Slot::Occupied(entry) => entry,
            _ => panic!("index handle points at a vacated slot"),
        }
    }

    /// Validates internal data-structure invariants.
    ///
    /// Checks queue/live-count agreement, index-to-slot consistency, queue
    /// tags, frequency bounds, free-list accounting, and the capacity bound.
    /// Returns a description of the first violated invariant.
    #[cfg(debug_assertions)]
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.index.len() != self.small_live + self.main_live {
            return Err(format!(
                "index len {} != small_live {} + main_live {}",
                self.index.len(),
                self.small_live,
                self.main_live
            ));
        }

        if self.index.len() > self.capacity {
            return Err(format!(
                "live entries {} > capacity {}",
                self.index.len(),
                self.capacity
            ));
        }

        if self.small_live > self.small_cap {
            return Err(format!(
                "small_live {} > small_cap {}",
                self.small_live, self.small_cap
            ));
        }

        for (queue, handles, expected_live) in [
            (QueueKind::Small, &self.small, self.small_live),
            (QueueKind::Main, &self.main, self.main_live),
        ] {
            let mut live = 0;
            for &slot in handles {
                match &self.slots[slot as usize] {
                    Slot::Occupied(entry) => {
                        live += 1;
                        if entry.queue != queue {
                            return Err(format!(
                                "slot {} enqueued in {:?} but tagged {:?}",
                                slot, queue, entry.queue
                            ));
                        }
                        if entry.freq > MAX_FREQ {
                            return Err(format!(
                                "slot {} freq {} > {}",
                                slot, entry.freq, MAX_FREQ
                            ));
                        }
                        match self.index.get(&entry.fp) {
                            Some(&indexed) if indexed == slot => {},
                            Some(&indexed) => {
                                return Err(format!(
                                    "index maps fp {:#x} to slot {} but entry lives in {}",
                                    entry.fp, indexed, slot
                                ));
                            },
                            None => {
                                return Err(format!(
                                    "live slot {} (fp {:#x}) missing from index",
                                    slot, entry.fp
                                ));
                            },
                        }
                    },
                    Slot::Tombstone => {},
                    Slot::Free => {
                        return Err(format!("{:?} queue references freed slot {}", queue, slot));
                    },
                }
            }
            if live != expected_live {
                return Err(format!(
                    "{:?} queue holds {} live entries but counter says {}",
                    queue, live, expected_live
                ));
            }
        }

        let vacant = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Free))
            .count();
        if vacant != self.free.len() {
            return Err(format!(
                "free list holds {} slots but {} are vacant",
                self.free.len(),
                vacant
            ));
        }

        Ok(())
    }
}

impl<K, V> std::fmt::Debug for S3FifoCore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FifoCore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("small_live", &self.small_live)
            .field("small_cap", &self.small_cap)
            .field("main_live", &self.main_live)
            .field("ghost_entries", &self.ghost.entries())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Duration = Duration::ZERO;

    /// Well-mixed fingerprints for small test indices.
    fn fp(i: u64) -> u64 {
        i.wrapping_mul(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(0x6a09_e667_f3bc_c908)
    }

    fn insert(core: &mut S3FifoCore<u64, u64>, i: u64) {
        core.insert(fp(i), i, i, None);
    }

    // ==============================================
    // Basic Operations
    // ==============================================

    mod basic_operations {
        use super::*;

        #[test]
        fn new_core_is_empty() {
            let core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);
            assert!(core.is_empty());
            assert_eq!(core.len(), 0);
            assert_eq!(core.capacity(), 100);
            assert_eq!(core.small_capacity(), 10);
        }

        #[test]
        fn insert_and_get() {
            let mut core = S3FifoCore::new(100, 0.01);
            core.insert(fp(1), 1u64, "value", None);

            assert_eq!(core.len(), 1);
            assert_eq!(core.get(fp(1), NOW), Some(&"value"));
        }

        #[test]
        fn get_missing_fingerprint_returns_none() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);
            insert(&mut core, 1);

            assert_eq!(core.get(fp(999), NOW), None);
        }

        #[test]
        fn overwrite_returns_old_value_and_resets_freq() {
            let mut core = S3FifoCore::new(100, 0.01);
            core.insert(fp(1), 1u64, "first", None);
            core.get(fp(1), NOW);
            core.get(fp(1), NOW);

            let old = core.insert(fp(1), 1u64, "second", None);
            assert_eq!(old, Some("first"));
            assert_eq!(core.len(), 1);
            assert_eq!(core.get(fp(1), NOW), Some(&"second"));

            // Frequency was reset: a single small-pressure round must not
            // find this entry hot enough to promote twice over.
            core.check_invariants().unwrap();
        }

        #[test]
        fn remove_returns_value_once() {
            let mut core = S3FifoCore::new(100, 0.01);
            core.insert(fp(1), 1u64, 42u64, None);

            assert_eq!(core.remove(fp(1)), Some(42));
            assert_eq!(core.remove(fp(1)), None);
            assert!(core.is_empty());
            core.check_invariants().unwrap();
        }

        #[test]
        fn clear_empties_everything() {
            let mut core = S3FifoCore::new(100, 0.01);
            for i in 0..50 {
                insert(&mut core, i);
            }
            core.clear();

            assert!(core.is_empty());
            assert_eq!(core.small_len(), 0);
            assert_eq!(core.main_len(), 0);
            assert_eq!(core.ghost_entries(), 0);
            core.check_invariants().unwrap();
        }

        #[test]
        fn iter_yields_live_entries_with_their_keys() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);
            for i in 0..5 {
                insert(&mut core, i);
            }
            core.remove(fp(2));

            let mut keys: Vec<u64> = core.iter().map(|(&k, _)| k).collect();
            keys.sort_unstable();
            assert_eq!(keys, vec![0, 1, 3, 4]);
            assert!(core.iter().all(|(&k, &v)| k == v));
        }

        #[test]
        #[should_panic(expected = "shard capacity must be greater than zero")]
        fn zero_capacity_panics_at_construction() {
            let _core: S3FifoCore<u64, u64> = S3FifoCore::new(0, 0.01);
        }
    }

    // ==============================================
    // Queue Behavior
    // ==============================================

    mod queue_behavior {
        use super::*;

        #[test]
        fn new_insert_goes_to_small() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);
            insert(&mut core, 1);

            assert_eq!(core.small_len(), 1);
            assert_eq!(core.main_len(), 0);
        }

        #[test]
        fn small_overflow_evicts_cold_head() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);

            // small_cap = 10; the 11th insert pushes the cold head out.
            for i in 0..11 {
                insert(&mut core, i);
            }

            assert!(!core.contains(fp(0), NOW));
            assert_eq!(core.small_len(), 10);
            core.check_invariants().unwrap();
        }

        #[test]
        fn accessed_head_promotes_to_main_instead() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);

            insert(&mut core, 0);
            core.get(fp(0), NOW);

            for i in 1..11 {
                insert(&mut core, i);
            }

            assert!(core.contains(fp(0), NOW));
            assert_eq!(core.main_len(), 1);
            core.check_invariants().unwrap();
        }

        #[test]
        fn promotion_retains_frequency() {
            // capacity 10, small_cap 1, ghost_cap 10
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(10, 0.01);

            // freq 3 before promotion; the next insert overflows Small and
            // promotes entry 0 into Main.
            insert(&mut core, 0);
            for _ in 0..3 {
                core.get(fp(0), NOW);
            }
            insert(&mut core, 1);
            assert_eq!(core.main_len(), 1);

            // Cold churn evicts keys 1..=9 into ghost.
            for i in 2..10 {
                insert(&mut core, i);
            }
            insert(&mut core, 20);

            // Re-admitting the nine ghosted keys overfills Main with freq-0
            // entries behind entry 0; the overflow round meets entry 0 at
            // the head first. Retained frequency means it is requeued and a
            // freq-0 ghost admission dies instead; had promotion zeroed the
            // frequency, entry 0 itself would have been the victim.
            for i in 1..10 {
                insert(&mut core, i);
            }
            assert!(core.contains(fp(0), NOW));
            core.check_invariants().unwrap();
        }

        #[test]
        fn capacity_bound_holds_under_churn() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(50, 0.01);

            for i in 0..1000 {
                insert(&mut core, i);
                if i % 3 == 0 {
                    core.get(fp(i / 2), NOW);
                }
            }

            assert!(core.len() <= 50);
            core.check_invariants().unwrap();
        }

        #[test]
        fn freq_saturates_at_three() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(10, 0.01);
            insert(&mut core, 1);

            for _ in 0..10 {
                core.get(fp(1), NOW);
            }
            core.check_invariants().unwrap();
        }
    }

    // ==============================================
    // Ghost-Guided Admission
    // ==============================================

    mod ghost_behavior {
        use super::*;

        #[test]
        fn eviction_records_fingerprint_in_ghost() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);

            for i in 0..11 {
                insert(&mut core, i);
            }

            // Entry 0 was evicted cold from Small.
            assert!(!core.contains(fp(0), NOW));
            assert_eq!(core.ghost_entries(), 1);
        }

        #[test]
        fn ghost_hit_admits_directly_to_main() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);

            for i in 0..11 {
                insert(&mut core, i);
            }
            let main_before = core.main_len();

            // Re-inserting the evicted fingerprint lands in Main.
            insert(&mut core, 0);
            assert!(core.contains(fp(0), NOW));
            assert_eq!(core.main_len(), main_before + 1);
            core.check_invariants().unwrap();
        }

        #[test]
        fn delete_records_fingerprint_in_ghost() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);
            insert(&mut core, 1);

            core.remove(fp(1));
            assert_eq!(core.ghost_entries(), 1);

            insert(&mut core, 1);
            assert_eq!(core.main_len(), 1);
        }

        #[test]
        fn ghost_resets_after_absorbing_capacity() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(10, 0.01);

            // Cold churn: every insert past the first ten evicts one entry
            // into ghost; after `capacity` evictions the filter resets.
            for i in 0..200 {
                insert(&mut core, i);
            }

            assert!(core.ghost_entries() <= 10);
            core.check_invariants().unwrap();
        }
    }

    // ==============================================
    // Expiry
    // ==============================================

    mod expiry {
        use super::*;

        #[test]
        fn expired_entry_is_a_miss() {
            let mut core = S3FifoCore::new(10, 0.01);
            core.insert(fp(1), 1u64, "v", Some(Duration::from_millis(50)));

            assert_eq!(core.get(fp(1), Duration::from_millis(10)), Some(&"v"));
            assert_eq!(core.get(fp(1), Duration::from_millis(60)), None);
            assert_eq!(core.len(), 0);
            core.check_invariants().unwrap();
        }

        #[test]
        fn deadline_is_inclusive() {
            let mut core = S3FifoCore::new(10, 0.01);
            core.insert(fp(1), 1u64, "v", Some(Duration::from_millis(50)));

            assert!(!core.contains(fp(1), Duration::from_millis(50)));
        }

        #[test]
        fn expired_slot_is_reclaimed_by_queue_drain() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(10, 0.01);
            core.insert(fp(0), 0, 0, Some(Duration::from_millis(1)));
            assert_eq!(core.get(fp(0), Duration::from_millis(5)), None);

            // Churn enough that the tombstoned handle drains.
            for i in 1..40 {
                insert(&mut core, i);
            }
            core.check_invariants().unwrap();
        }

        #[test]
        fn reinsert_after_expiry_starts_in_small() {
            let mut core = S3FifoCore::new(10, 0.01);
            core.insert(fp(1), 1u64, "v", Some(Duration::from_millis(1)));
            assert_eq!(core.get(fp(1), Duration::from_millis(5)), None);

            // Expiry is not an eviction: no ghost record, so the fresh
            // insert is unproven again.
            core.insert(fp(1), 1u64, "v2", None);
            assert_eq!(core.small_len(), 1);
            assert_eq!(core.main_len(), 0);
        }
    }

    // ==============================================
    // Tombstone Discipline
    // ==============================================

    mod tombstones {
        use super::*;

        #[test]
        fn removed_slot_survives_queue_drain() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(10, 0.01);

            for i in 0..5 {
                insert(&mut core, i);
            }
            core.remove(fp(2));
            core.remove(fp(3));

            for i in 5..50 {
                insert(&mut core, i);
            }

            assert!(!core.contains(fp(2), NOW));
            assert!(!core.contains(fp(3), NOW));
            core.check_invariants().unwrap();
        }

        #[test]
        fn slot_reuse_does_not_confuse_queues() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(4, 0.01);

            // Interleave inserts and removes to force slot recycling.
            for round in 0..50u64 {
                insert(&mut core, round);
                if round % 2 == 0 {
                    core.remove(fp(round));
                }
                core.check_invariants().unwrap();
            }
        }

        #[cfg(feature = "metrics")]
        #[test]
        fn stale_skips_are_counted() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(4, 0.01);

            insert(&mut core, 0);
            core.remove(fp(0));
            // Drain the tombstone via small pressure.
            for i in 1..10 {
                insert(&mut core, i);
            }

            assert!(core.counters.stale_skips >= 1);
        }
    }

    // ==============================================
    // Scan Resistance
    // ==============================================

    mod scan_resistance {
        use super::*;

        #[test]
        fn working_set_survives_one_shot_scan() {
            let mut core: S3FifoCore<u64, u64> = S3FifoCore::new(100, 0.01);

            // Hot set, accessed enough to promote.
            for i in 0..30 {
                insert(&mut core, i);
                core.get(fp(i), NOW);
                core.get(fp(i), NOW);
            }

            // One-shot scan of cold keys.
            for i in 1000..1300 {
                insert(&mut core, i);
            }

            let survivors = (0..30).filter(|&i| core.contains(fp(i), NOW)).count();
            assert!(
                survivors >= 27,
                "only {}/30 hot entries survived the scan",
                survivors
            );
            core.check_invariants().unwrap();
        }
    }
}
