pub use crate::builder::CacheBuilder;
pub use crate::cache::Cache;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::ds::{BlockedBloom, Fingerprinter};
pub use crate::error::ConfigError;
pub use crate::policy::S3FifoCore;
pub use crate::store::{MemoryStore, Store, StoreError};

#[cfg(feature = "metrics")]
pub use crate::metrics::CacheMetricsSnapshot;
