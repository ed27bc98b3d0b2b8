use std::sync::Arc;

use strata_store::{SharedStore, Store, StoreError, StoreResult, Value};

/// Make `inner` read-only, refusing writes with [`StoreError::ReadOnly`].
pub fn wrap(inner: SharedStore) -> SharedStore {
    Arc::new(ReadOnly::new(inner))
}

/// Lets reads through and stops writes.
///
/// Set and delete never reach the inner store. They either fail with the
/// configured refusal or, in silent mode, succeed without effect. Close is
/// delegated so the inner store's resources are still released.
pub struct ReadOnly {
    inner: SharedStore,
    refusal: Option<StoreError>,
}

impl ReadOnly {
    pub fn new(inner: SharedStore) -> Self {
        Self {
            inner,
            refusal: Some(StoreError::ReadOnly),
        }
    }

    /// Refuse writes with `err` instead of the default.
    pub fn with_error(mut self, err: StoreError) -> Self {
        self.refusal = Some(err);
        self
    }

    /// Accept writes and drop them.
    pub fn silent(mut self) -> Self {
        self.refusal = None;
        self
    }

    fn refuse(&self) -> StoreResult<()> {
        match &self.refusal {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Store for ReadOnly {
    fn set(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        self.refuse()
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.inner.get(key)
    }

    fn delete(&self, _key: &str) -> StoreResult<()> {
        self.refuse()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
