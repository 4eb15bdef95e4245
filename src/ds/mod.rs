pub mod bloom;
pub mod fingerprint;

pub use bloom::BlockedBloom;
pub use fingerprint::{shard_for_fingerprint, Fingerprinter};
