//! Value encoding on top of the byte-oriented [`Store`] contract.
//!
//! Stores only ever see bytes. A [`Codec`] turns typed values into those bytes
//! and back, and [`TypedStore`] pairs a store with a codec so callers can work
//! with their own types.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// Converts typed values to and from their stored representation.
pub trait Codec: Send + Sync {
    /// Encode `value` into bytes.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Vec<u8>>;

    /// Decode bytes produced by [`Codec::encode`].
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> StoreResult<T>;
}

/// JSON encoding via `serde_json`. Human-readable, larger on the wire.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// Compact binary encoding via `bincode`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> StoreResult<T> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// A store paired with a codec.
///
/// ```
/// use strata_store::{InMemoryStore, JsonCodec, TypedStore};
///
/// let store = TypedStore::new(InMemoryStore::new(), JsonCodec);
/// store.set("answer", &42u32).unwrap();
/// assert_eq!(store.get::<u32>("answer").unwrap(), Some(42));
/// ```
pub struct TypedStore<S, C> {
    inner: S,
    codec: C,
}

impl<S: Store, C: Codec> TypedStore<S, C> {
    /// Pair `inner` with `codec`.
    pub fn new(inner: S, codec: C) -> Self {
        Self { inner, codec }
    }

    /// Encode and store `value` under `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = self.codec.encode(value)?;
        self.inner.set(key, &bytes)
    }

    /// Read and decode the value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.inner.get(key)? {
            Some(bytes) => self.codec.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Remove `key`.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    /// Close the underlying store.
    pub fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    /// The underlying byte store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}
