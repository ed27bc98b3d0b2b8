//! Tiered cache cascade.
//!
//! A [`Multilevel`] store treats an ordered list of stores as cache levels,
//! nearest first: an in-process map, then a network cache, then the durable
//! store, for instance.
//!
//! - **Writes are strict.** Set and delete go to every level in order and stop
//!   at the first failure, which is reported with the failing level's index.
//!   Later levels are not touched.
//! - **Reads populate.** Get probes levels in order. An error aborts the
//!   probe; only a confirmed miss falls through. A hit at level `i` is copied
//!   into levels `0..i`, best-effort: back-fill failures are logged and
//!   counted, never returned.
//! - **Close is exhaustive.** Every level is closed and all failures are
//!   reported together.

use std::sync::Arc;

use strata_store::{
    validate_key, Operation, SharedStore, Store, StoreError, StoreResult, Value,
};
use tracing::warn;

use crate::stats::Incrementer;

/// Build a cascade from `levels`, nearest level first.
pub fn wrap(levels: Vec<SharedStore>) -> StoreResult<SharedStore> {
    Ok(Arc::new(Multilevel::new(levels)?))
}

/// Cascade of cache levels presented as one store.
pub struct Multilevel {
    levels: Vec<SharedStore>,
    backfill_failures: Option<Arc<dyn Incrementer>>,
}

impl Multilevel {
    /// Create a cascade. Fails with [`StoreError::NoStores`] for an empty list.
    pub fn new(levels: Vec<SharedStore>) -> StoreResult<Self> {
        if levels.is_empty() {
            return Err(StoreError::NoStores {
                middleware: "multilevel",
            });
        }
        Ok(Self {
            levels,
            backfill_failures: None,
        })
    }

    /// Count every back-fill write that fails.
    pub fn with_backfill_failures(mut self, counter: Arc<dyn Incrementer>) -> Self {
        self.backfill_failures = Some(counter);
        self
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    fn level_error(operation: Operation, key: &str, level: usize, err: StoreError) -> StoreError {
        StoreError::Level {
            operation,
            key: key.to_owned(),
            level,
            source: Box::new(err),
        }
    }

    /// Copy a value found at level `limit` into every nearer level.
    fn backfill(&self, limit: usize, key: &str, value: &[u8]) {
        for (level, store) in self.levels[..limit].iter().enumerate() {
            if let Err(err) = store.set(key, value) {
                warn!(level, key, error = %err, "cache level back-fill failed");
                if let Some(counter) = &self.backfill_failures {
                    counter.inc();
                }
            }
        }
    }
}

impl Store for Multilevel {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        for (level, store) in self.levels.iter().enumerate() {
            store
                .set(key, value)
                .map_err(|err| Self::level_error(Operation::Set, key, level, err))?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        for (level, store) in self.levels.iter().enumerate() {
            let found = store
                .get(key)
                .map_err(|err| Self::level_error(Operation::Get, key, level, err))?;
            if let Some(value) = found {
                self.backfill(level, key, &value);
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        for (level, store) in self.levels.iter().enumerate() {
            store
                .delete(key)
                .map_err(|err| Self::level_error(Operation::Delete, key, level, err))?;
        }
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        let errors = self
            .levels
            .iter()
            .filter_map(|store| store.close().err())
            .collect();
        StoreError::join(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn cascade(levels: &[Arc<MockStore>]) -> Multilevel {
        Multilevel::new(levels.iter().map(MockStore::shared).collect()).unwrap()
    }

    fn three_levels() -> Vec<Arc<MockStore>> {
        vec![MockStore::new(), MockStore::new(), MockStore::new()]
    }

    #[test]
    fn empty_level_list_is_rejected() {
        assert!(matches!(
            Multilevel::new(Vec::new()),
            Err(StoreError::NoStores { middleware: "multilevel" })
        ));
        assert!(wrap(Vec::new()).is_err());
    }

    // -----------------------------------------------------------------------
    // Set
    // -----------------------------------------------------------------------

    #[test]
    fn set_writes_every_level() {
        let levels = three_levels();
        cascade(&levels).set("a", b"1").unwrap();
        for level in &levels {
            assert_eq!(level.peek("a").as_deref(), Some(&b"1"[..]));
        }
    }

    #[test]
    fn set_stops_at_failing_level() {
        let levels = three_levels();
        levels[1].fail(Operation::Set, StoreError::message("level one is full"));

        let err = cascade(&levels).set("a", b"1").unwrap_err();

        match &err {
            StoreError::Level {
                operation, level, ..
            } => {
                assert_eq!(*operation, Operation::Set);
                assert_eq!(*level, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("level one is full"));
        assert!(levels[0].peek("a").is_some());
        assert_eq!(levels[2].count(Operation::Set), 0);
        assert!(levels[2].peek("a").is_none());
    }

    #[test]
    fn empty_key_rejected_before_any_level() {
        let levels = three_levels();
        let store = cascade(&levels);
        assert!(matches!(store.set("", b"1"), Err(StoreError::EmptyKey)));
        assert!(matches!(store.get(""), Err(StoreError::EmptyKey)));
        assert!(matches!(store.delete(""), Err(StoreError::EmptyKey)));
        assert!(levels.iter().all(|l| l.calls().is_empty()));
    }

    // -----------------------------------------------------------------------
    // Get and back-fill
    // -----------------------------------------------------------------------

    #[test]
    fn get_hit_at_far_level_backfills_nearer_levels() {
        let levels = three_levels();
        levels[2].seed("a", b"1");

        let value = cascade(&levels).get("a").unwrap();

        assert_eq!(value.as_deref(), Some(&b"1"[..]));
        assert_eq!(levels[0].peek("a").as_deref(), Some(&b"1"[..]));
        assert_eq!(levels[1].peek("a").as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn backfill_failure_is_not_visible_to_reader() {
        let levels = three_levels();
        levels[2].seed("a", b"1");
        levels[0].fail(Operation::Set, StoreError::message("cache unavailable"));
        let failures = Arc::new(AtomicU64::new(0));

        let store = cascade(&levels).with_backfill_failures(failures.clone());
        let value = store.get("a").unwrap();

        assert_eq!(value.as_deref(), Some(&b"1"[..]));
        assert!(levels[0].peek("a").is_none());
        assert_eq!(levels[1].peek("a").as_deref(), Some(&b"1"[..]));
        assert_eq!(failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn get_hit_at_nearest_level_touches_nothing_else() {
        let levels = three_levels();
        levels[0].seed("a", b"1");
        cascade(&levels).get("a").unwrap();
        assert_eq!(levels[0].count(Operation::Set), 0);
        assert!(levels[1].calls().is_empty());
        assert!(levels[2].calls().is_empty());
    }

    #[test]
    fn get_error_aborts_probe() {
        let levels = three_levels();
        levels[2].seed("a", b"1");
        levels[1].fail(Operation::Get, StoreError::message("network partition"));

        let err = cascade(&levels).get("a").unwrap_err();

        assert!(matches!(err, StoreError::Level { level: 1, .. }));
        assert_eq!(levels[2].count(Operation::Get), 0);
        assert!(levels[0].peek("a").is_none());
    }

    #[test]
    fn get_miss_everywhere() {
        let levels = three_levels();
        assert!(cascade(&levels).get("a").unwrap().is_none());
        assert!(levels.iter().all(|l| l.count(Operation::Get) == 1));
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_every_level_fail_fast() {
        let levels = three_levels();
        for level in &levels {
            level.seed("a", b"1");
        }
        levels[1].fail(Operation::Delete, StoreError::message("locked"));

        let err = cascade(&levels).delete("a").unwrap_err();

        assert!(matches!(err, StoreError::Level { level: 1, operation: Operation::Delete, .. }));
        assert!(levels[0].peek("a").is_none());
        assert!(levels[2].peek("a").is_some());
        assert_eq!(levels[2].count(Operation::Delete), 0);
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    #[test]
    fn close_continues_past_failure() {
        let levels = vec![
            MockStore::failing(Operation::Close, "level zero refused to close"),
            MockStore::new(),
        ];

        let err = cascade(&levels).close().unwrap_err();

        assert_eq!(err.to_string(), "level zero refused to close");
        assert_eq!(levels[1].count(Operation::Close), 1);
    }

    #[test]
    fn close_aggregates_all_failures() {
        let levels = vec![
            MockStore::failing(Operation::Close, "first"),
            MockStore::new(),
            MockStore::failing(Operation::Close, "third"),
        ];

        let err = cascade(&levels).close().unwrap_err();

        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.to_string(), "first\nthird");
        assert!(levels.iter().all(|l| l.count(Operation::Close) == 1));
    }

    #[test]
    fn shared_level_behind_two_cascades() {
        let shared = MockStore::new();
        let a = Multilevel::new(vec![MockStore::new().shared(), shared.shared()]).unwrap();
        let b = Multilevel::new(vec![MockStore::new().shared(), shared.shared()]).unwrap();
        a.set("k", b"v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some(&b"v"[..]));
        assert_eq!(b.depth(), 2);
    }
}
