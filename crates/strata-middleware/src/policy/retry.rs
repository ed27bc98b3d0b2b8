use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_store::{validate_key, SharedStore, Store, StoreError, StoreResult, Value};
use tracing::debug;

const DEFAULT_ATTEMPTS: usize = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;

/// Retry schedule for [`Retrying`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Pause before each retry, in milliseconds. One retry per entry.
    pub backoff_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(DEFAULT_ATTEMPTS, Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS))
    }
}

impl RetryConfig {
    /// `retries` pauses starting at `initial` and doubling each time.
    pub fn exponential(retries: usize, initial: Duration) -> Self {
        let initial = initial.as_millis() as u64;
        Self {
            backoff_ms: (0..retries)
                .map(|n| initial.saturating_mul(1 << n.min(32)))
                .collect(),
        }
    }

    /// Retries with no pause in between.
    pub fn immediate(retries: usize) -> Self {
        Self {
            backoff_ms: vec![0; retries],
        }
    }

    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_ms.iter().copied().map(Duration::from_millis).collect()
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Default sleeper, backed by [`std::thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

fn any_error(_: &StoreError) -> bool {
    true
}

/// Retry set/get/delete on `inner` following `config`.
pub fn wrap(inner: SharedStore, config: &RetryConfig) -> SharedStore {
    Arc::new(Retrying::new(inner, config))
}

/// Re-issues failed calls after a backoff.
///
/// Key validation happens before the first attempt, so an invalid key is
/// never retried. When the schedule runs out, the last error is returned
/// unchanged. Close is never retried.
pub struct Retrying {
    inner: SharedStore,
    backoff: Vec<Duration>,
    classifier: Arc<dyn Fn(&StoreError) -> bool + Send + Sync>,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrying {
    pub fn new(inner: SharedStore, config: &RetryConfig) -> Self {
        Self {
            inner,
            backoff: config.backoff(),
            classifier: Arc::new(any_error),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Only retry errors the classifier accepts.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&StoreError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn run<T>(&self, key: &str, call: impl Fn() -> StoreResult<T>) -> StoreResult<T> {
        validate_key(key)?;
        let mut result = call();
        for (attempt, delay) in self.backoff.iter().enumerate() {
            let retry = matches!(&result, Err(err) if (self.classifier)(err));
            if !retry {
                return result;
            }
            if let Err(err) = &result {
                debug!(key, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %err, "retrying store call");
            }
            self.sleeper.sleep(*delay);
            result = call();
        }
        result
    }
}

impl Store for Retrying {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.run(key, || self.inner.set(key, value))
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.run(key, || self.inner.get(key))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.run(key, || self.inner.delete(key))
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use strata_store::Operation;

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    /// Fails the first `failures` gets, then serves a value.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Store for Flaky {
        fn set(&self, _: &str, _: &[u8]) -> StoreResult<()> {
            Ok(())
        }

        fn get(&self, _: &str) -> StoreResult<Option<Value>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(StoreError::message(format!("attempt {n} failed")));
            }
            Ok(Some(Value::from_static(b"ok")))
        }

        fn delete(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }

        fn close(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn default_schedule_is_exponential() {
        assert_eq!(RetryConfig::default().backoff_ms, vec![200, 400, 800]);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"backoff_ms":[5,10]}"#).unwrap();
        assert_eq!(config.backoff(), vec![Duration::from_millis(5), Duration::from_millis(10)]);

        let defaulted: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted, RetryConfig::default());
    }

    #[test]
    fn recovers_after_transient_failures() {
        let inner = Arc::new(Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let sleeper = Arc::new(RecordingSleeper::default());
        let store = Retrying::new(inner.clone(), &RetryConfig::default())
            .with_sleeper(sleeper.clone());

        let value = store.get("k").unwrap();

        assert_eq!(value.as_deref(), Some(&b"ok"[..]));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.0.lock().unwrap(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[test]
    fn exhausted_schedule_returns_last_error() {
        let inner = Arc::new(Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        });
        let store = Retrying::new(inner.clone(), &RetryConfig::immediate(2));

        let err = store.get("k").unwrap_err();

        assert_eq!(err.to_string(), "attempt 2 failed");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn classifier_stops_retries() {
        let inner = MockStore::new();
        inner.fail(Operation::Set, StoreError::ReadOnly);
        let store = Retrying::new(inner.shared(), &RetryConfig::immediate(3))
            .with_classifier(|err| !matches!(err, StoreError::ReadOnly));

        assert!(store.set("k", b"v").is_err());
        assert_eq!(inner.count(Operation::Set), 1);
    }

    #[test]
    fn invalid_key_is_never_sent() {
        let inner = MockStore::new();
        let store = wrap(inner.shared(), &RetryConfig::immediate(3));
        assert!(matches!(store.delete(""), Err(StoreError::EmptyKey)));
        assert!(inner.calls().is_empty());
    }

    #[test]
    fn close_is_not_retried() {
        let inner = MockStore::failing(Operation::Close, "close failed");
        let store = wrap(inner.shared(), &RetryConfig::immediate(3));
        assert!(store.close().is_err());
        assert_eq!(inner.count(Operation::Close), 1);
    }
}
