use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// The stored representation of a value.
pub type Value = Bytes;

/// A store shared between wrappers.
pub type SharedStore = Arc<dyn Store>;

/// Uniform key-value store contract.
///
/// Backends and middleware implement the same four operations, so wrappers
/// can be nested in whatever order the composing caller chooses.
///
/// All implementations must satisfy these invariants:
/// - Keys are non-empty; an empty key is rejected with
///   [`StoreError::EmptyKey`](crate::StoreError::EmptyKey) before any work.
/// - No session state is required between calls.
/// - Concurrent calls from multiple threads are safe.
pub trait Store: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Remove `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Release the resources held by the store.
    fn close(&self) -> StoreResult<()>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}

/// The four store operations, used to label callbacks, logs and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Set,
    Get,
    Delete,
    Close,
}

impl Operation {
    /// Lower-case operation name (`"set"`, `"get"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Get => "get",
            Self::Delete => "delete",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
