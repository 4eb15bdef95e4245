//! Cache-line-blocked Bloom filter for ghost-history tracking.
//!
//! A classical Bloom filter scatters its `k` probe bits across the whole bit
//! array, costing up to `k` cache misses per query. Here the bit array is a
//! sequence of 512-bit blocks (eight `u64` words, one 64-byte cache line) and
//! all `k` bits for a given fingerprint live inside a single block, so every
//! `add`/`contains` touches exactly one line.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                         BlockedBloom Layout                        │
//! │                                                                    │
//! │   blocks: Vec<[u64; 8]>          block count is a power of two     │
//! │                                                                    │
//! │   fingerprint h                                                    │
//! │   ├── (h >> 32) & mask ───────► block index                        │
//! │   └── h1 = low32(h), h2 = rotate32(h)                              │
//! │         probe i at (h1 + i·h2 + i²·P) & 511    i in 0..k           │
//! │              │                                                     │
//! │              ├── pos >> 6 ────► word index (0..8)                  │
//! │              └── pos & 63 ────► bit within word                    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sizing
//!
//! Given capacity `n` and target false-positive rate `p`:
//!
//! - total bits `m = -n·ln(p) / ln(2)²`, rounded up to whole blocks and then
//!   to the next power of two;
//! - probe count `k = ⌈-log₂(p)⌉`, clamped to `[1, 16]`;
//! - if `n·k` bits exceed the chosen block budget, the block count is raised
//!   to the next power of two that fits.
//!
//! Constraining all probes to one block costs a modestly higher effective FP
//! rate than a classical filter with the same bit budget; the test suite
//! accepts up to 4x the configured target.
//!
//! ## Thread Safety
//!
//! Word writes are plain stores. Callers must hold the owning shard's lock;
//! racing `add`/`contains` is forbidden.

const BITS_PER_BLOCK: usize = 512;

/// Large odd prime used to decorrelate the quadratic probe term.
const PROBE_PRIME: u64 = 0x9e37_79b1;

/// Blocked Bloom filter over 64-bit fingerprints.
///
/// `false` from [`contains`](Self::contains) is definitive; `true` is
/// probabilistic.
///
/// # Example
///
/// ```
/// use fifokit::ds::BlockedBloom;
///
/// let mut ghost = BlockedBloom::new(1000, 0.01);
///
/// ghost.add(0xdead_beef_cafe_f00d);
/// assert!(ghost.contains(0xdead_beef_cafe_f00d));
///
/// ghost.reset();
/// assert_eq!(ghost.entries(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct BlockedBloom {
    blocks: Vec<[u64; 8]>,
    mask: u64,
    k: u32,
    entries: usize,
}

impl BlockedBloom {
    /// Creates a filter sized for `capacity` entries at `fp_rate`.
    ///
    /// `capacity` is clamped to at least 1. `fp_rate` must be in `(0, 1)`;
    /// the façade validates this before construction.
    pub fn new(capacity: usize, fp_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let ln2 = std::f64::consts::LN_2;

        // Target bits: m = -n * ln(p) / ln(2)^2, rounded up to blocks.
        let m = capacity as f64 * -fp_rate.ln() / (ln2 * ln2);
        let mut num_blocks =
            ((m + BITS_PER_BLOCK as f64 - 1.0) / BITS_PER_BLOCK as f64) as usize;
        num_blocks = num_blocks.max(1).next_power_of_two();

        // k = ceil(-log2(p)), clamped to [1, 16].
        let k = ((-fp_rate.ln() / ln2).ceil() as u32).clamp(1, 16);

        // Keep at least k bits of budget per item inside the block array.
        let min_blocks = (capacity * k as usize).div_ceil(BITS_PER_BLOCK);
        if num_blocks < min_blocks {
            num_blocks = min_blocks.next_power_of_two();
        }

        Self {
            blocks: vec![[0u64; 8]; num_blocks],
            mask: (num_blocks - 1) as u64,
            k,
            entries: 0,
        }
    }

    /// Sets all `k` bits for fingerprint `h` and bumps the entry count.
    pub fn add(&mut self, h: u64) {
        let block = &mut self.blocks[((h >> 32) & self.mask) as usize];

        let h1 = h & 0xFFFF_FFFF;
        let h2 = h.rotate_right(32);

        for i in 0..self.k as u64 {
            let pos = h1
                .wrapping_add(i.wrapping_mul(h2))
                .wrapping_add((i * i).wrapping_mul(PROBE_PRIME))
                & 511;
            block[(pos >> 6) as usize] |= 1u64 << (pos & 63);
        }

        self.entries += 1;
    }

    /// Returns `true` if `h` might have been added; `false` is definitive.
    pub fn contains(&self, h: u64) -> bool {
        let block = &self.blocks[((h >> 32) & self.mask) as usize];

        let h1 = h & 0xFFFF_FFFF;
        let h2 = h.rotate_right(32);

        for i in 0..self.k as u64 {
            let pos = h1
                .wrapping_add(i.wrapping_mul(h2))
                .wrapping_add((i * i).wrapping_mul(PROBE_PRIME))
                & 511;
            if block[(pos >> 6) as usize] & (1u64 << (pos & 63)) == 0 {
                return false;
            }
        }

        true
    }

    /// Zeroes every block and resets the entry count.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            *block = [0u64; 8];
        }
        self.entries = 0;
    }

    /// Number of `add` calls since construction or the last reset.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of 512-bit blocks backing the filter.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of probe bits per fingerprint.
    #[inline]
    pub fn probes(&self) -> u32 {
        self.k
    }
}
