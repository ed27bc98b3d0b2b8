use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use bytes::Bytes;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Store, Value};
use crate::validation::validate_key;

/// In-memory, HashMap-based store.
///
/// Intended for tests, demos and as a nearest cache level. Entries are held
/// behind a `RwLock` for safe concurrent access; values are reference-counted
/// [`Bytes`] so reads do not copy.
///
/// After [`Store::close`] every set/get/delete fails with
/// [`StoreError::Closed`]. Closing twice is harmless.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if `key` is present, bypassing the closed check.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(key)
    }

    /// Sorted list of all keys.
    pub fn keys(&self) -> Vec<String> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether [`Store::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.check_open()?;
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_owned(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        self.check_open()?;
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.check_open()?;
        let mut map = self.entries.write().expect("lock poisoned");
        map.remove(key);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(entries = self.len(), "in-memory store closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entry_count", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
