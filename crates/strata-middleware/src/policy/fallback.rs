use std::sync::Arc;

use strata_store::{SharedStore, Store, StoreError, StoreResult, Value};

/// Decides whether an outcome of the stable store should be retried on the
/// fallback store.
pub type ErrorClassifier = Arc<dyn Fn(&StoreError) -> bool + Send + Sync>;

fn any_error(_: &StoreError) -> bool {
    true
}

/// Build a fallback pair that switches on any error.
pub fn wrap(stable: SharedStore, fallback: SharedStore) -> SharedStore {
    Arc::new(Fallback::new(stable, fallback))
}

/// Sends every call to a stable store and re-issues it on a fallback store
/// when the stable store fails.
///
/// The fallback's answer, success or error, is what the caller receives.
pub struct Fallback {
    stable: SharedStore,
    fallback: SharedStore,
    classifier: ErrorClassifier,
}

impl Fallback {
    pub fn new(stable: SharedStore, fallback: SharedStore) -> Self {
        Self {
            stable,
            fallback,
            classifier: Arc::new(any_error),
        }
    }

    /// Only fall back for errors the classifier accepts.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&StoreError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    fn should_fall_back<T>(&self, result: &StoreResult<T>) -> bool {
        matches!(result, Err(err) if (self.classifier)(err))
    }
}

impl Store for Fallback {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let result = self.stable.set(key, value);
        if self.should_fall_back(&result) {
            return self.fallback.set(key, value);
        }
        result
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let result = self.stable.get(key);
        if self.should_fall_back(&result) {
            return self.fallback.get(key);
        }
        result
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let result = self.stable.delete(key);
        if self.should_fall_back(&result) {
            return self.fallback.delete(key);
        }
        result
    }

    /// Closes the fallback first, then the stable store, reporting both
    /// failures if both fail.
    fn close(&self) -> StoreResult<()> {
        let errors = [self.fallback.close(), self.stable.close()]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        StoreError::join(errors)
    }
}
