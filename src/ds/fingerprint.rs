//! Key fingerprinting and shard selection.
//!
//! Every public cache operation hashes its key exactly once into a 64-bit
//! fingerprint. The fingerprint is the key's identity inside the engine: the
//! full 64 bits index the shard map and both Bloom probes, while the high
//! 32 bits pick the shard.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Fingerprint Derivation                      │
//! │                                                                  │
//! │   key: K ──► SipHash(seed, key) ──► splitmix64 finalizer ──► fp  │
//! │                                                                  │
//! │   fp (64 bits)                                                   │
//! │   ├── high 32 bits ──► (fp >> 32) & (shards - 1)  shard routing  │
//! │   └── full 64 bits ──► shard index / ghost Bloom probes          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The finalizer (multiply by a large odd constant, xor-shift) spreads dense
//! integer keys across the whole 64-bit range, so sequential IDs do not
//! cluster into a handful of shards or Bloom blocks.
//!
//! ## Key Concepts
//!
//! - **Deterministic per process**: the same `(seed, key)` pair always yields
//!   the same fingerprint for the lifetime of a cache. Stability across runs
//!   is not promised.
//! - **Collision tolerance**: SipHash keeps key collisions far below the
//!   ghost filter's false-positive rate at practical capacities.
//!
//! ## Example Usage
//!
//! ```
//! use fifokit::ds::fingerprint::{shard_for_fingerprint, Fingerprinter};
//!
//! let fp = Fingerprinter::new(0);
//!
//! // Same key always maps to the same fingerprint
//! let a = fp.fingerprint(&"user:123");
//! assert_eq!(fp.fingerprint(&"user:123"), a);
//!
//! // High bits route to one of a power-of-two number of shards
//! assert!(shard_for_fingerprint(a, 8) < 8);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Derives 64-bit key fingerprints with a fixed per-instance seed.
///
/// The same `(key, seed)` pair always produces the same fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    seed: u64,
}

impl Fingerprinter {
    /// Creates a fingerprinter with the given `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Hashes `key` to a 64-bit fingerprint.
    #[inline]
    pub fn fingerprint<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        mix64(hasher.finish())
    }
}

impl Default for Fingerprinter {
    /// Creates a fingerprinter with seed 0.
    fn default() -> Self {
        Self::new(0)
    }
}

/// Maps a fingerprint to a shard index. `shards` must be a power of two.
#[inline]
pub fn shard_for_fingerprint(fp: u64, shards: usize) -> usize {
    debug_assert!(shards.is_power_of_two());
    ((fp >> 32) as usize) & (shards - 1)
}

/// splitmix64 finalizer: multiply-by-odd-constant plus xor-shifts.
///
/// Applied after hashing so that dense integer keys (whose SipHash images
/// share the hasher's internal structure less than ideal) still fill the
/// high bits used for shard and Bloom-block selection.
#[inline]
fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}
