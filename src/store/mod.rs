//! Persistence collaborator interface.
//!
//! The cache can mirror writes into an opaque backend and warm itself from
//! it at construction. Persistence is strictly best-effort: a failing
//! backend is logged and the in-memory path continues untouched ("graceful
//! degradation"). Concrete backends (files, remote key-value stores) live
//! outside this crate; [`MemoryStore`] is provided for tests and examples.
//!
//! ## Key Components
//!
//! - [`Store`]: the collaborator trait (`load` / `put` / `delete`).
//! - [`StoreError`]: opaque backend failure, never surfaced to cache callers.
//! - [`MemoryStore`]: HashMap-backed reference backend.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::message_error;

message_error! {
    /// Backend failure. Carries a human-readable description; the cache
    /// façade logs it and moves on.
    StoreError
}

/// Opaque persistence backend.
///
/// `ttl` values are remaining time-to-live at call time; `None` never
/// expires. Implementations must be safe to call from any cache thread.
pub trait Store<K, V>: Send + Sync {
    /// Streams every persisted entry for warm-loading.
    fn load(&self) -> Result<Vec<(K, V, Option<Duration>)>, StoreError>;

    /// Persists one entry.
    fn put(&self, key: &K, value: &V, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes one entry. Deleting an absent key is not an error.
    fn delete(&self, key: &K) -> Result<(), StoreError>;
}

/// HashMap-backed store for tests and examples.
///
/// # Example
///
/// ```
/// use fifokit::store::{MemoryStore, Store};
///
/// let store: MemoryStore<String, u32> = MemoryStore::new();
/// store.put(&"a".to_string(), &1, None).unwrap();
///
/// let entries = store.load().unwrap();
/// assert_eq!(entries, vec![("a".to_string(), 1, None)]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    entries: Mutex<HashMap<K, (V, Option<Duration>)>>,
}

impl<K, V> MemoryStore<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of persisted entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is persisted.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Store<K, V> for MemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn load(&self) -> Result<Vec<(K, V, Option<Duration>)>, StoreError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(k, (v, ttl))| (k.clone(), v.clone(), *ttl))
            .collect())
    }

    fn put(&self, key: &K, value: &V, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.clone(), (value.clone(), ttl));
        Ok(())
    }

    fn delete(&self, key: &K) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
