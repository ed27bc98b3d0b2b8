use std::sync::Arc;

use strata_store::{SharedStore, Store, StoreResult, Value};

/// Set-membership capability, typically a probabilistic filter.
///
/// `may_contain` may report false positives but must not report false
/// negatives for keys that were inserted and not removed.
pub trait MembershipFilter: Send + Sync {
    fn insert(&self, key: &str);
    fn may_contain(&self, key: &str) -> bool;
    fn remove(&self, key: &str);
}

/// Screen reads on `inner` through `filter`.
pub fn wrap(inner: SharedStore, filter: Arc<dyn MembershipFilter>) -> SharedStore {
    Arc::new(Filtered::new(inner, filter))
}

/// Answers definite misses from a membership filter instead of the store.
///
/// Keys enter the filter after a successful set (or a get that found them)
/// and leave it on delete. A get for a key the filter rules out returns
/// `Ok(None)` without touching the inner store.
pub struct Filtered {
    inner: SharedStore,
    filter: Arc<dyn MembershipFilter>,
}

impl Filtered {
    pub fn new(inner: SharedStore, filter: Arc<dyn MembershipFilter>) -> Self {
        Self { inner, filter }
    }
}

impl Store for Filtered {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.set(key, value)?;
        self.filter.insert(key);
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        if !self.filter.may_contain(key) {
            return Ok(None);
        }
        let found = self.inner.get(key)?;
        if found.is_some() {
            self.filter.insert(key);
        }
        Ok(found)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.filter.remove(key);
        self.inner.delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
