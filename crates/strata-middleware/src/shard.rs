//! Key-hashed sharding.
//!
//! A [`Sharded`] store routes each key to exactly one of its shards. The
//! shard is chosen by hashing the key with BLAKE3, taking the first eight
//! digest bytes as a little-endian `u64`, and reducing modulo the shard
//! count. The mapping is stable for a fixed shard list; adding, removing or
//! reordering shards moves keys and requires external rebalancing.

use std::sync::Arc;

use strata_store::{validate_key, SharedStore, Store, StoreError, StoreResult, Value};

/// Shard index of `key` among `shard_count` shards.
///
/// # Panics
///
/// Panics if `shard_count` is zero.
pub fn shard_index(key: &str, shard_count: usize) -> usize {
    assert!(shard_count > 0, "shard_count must be positive");
    (key_hash(key) % shard_count as u64) as usize
}

fn key_hash(key: &str) -> u64 {
    let digest = blake3::hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Build a sharded store. A single shard is returned as-is.
pub fn wrap(mut shards: Vec<SharedStore>) -> StoreResult<SharedStore> {
    if shards.len() == 1 {
        return Ok(shards.remove(0));
    }
    Ok(Arc::new(Sharded::new(shards)?))
}

/// A set of disjoint partitions presented as one store.
pub struct Sharded {
    shards: Vec<SharedStore>,
}

impl Sharded {
    /// Create a router. Fails with [`StoreError::NoStores`] for an empty list.
    pub fn new(shards: Vec<SharedStore>) -> StoreResult<Self> {
        if shards.is_empty() {
            return Err(StoreError::NoStores {
                middleware: "shard",
            });
        }
        Ok(Self { shards })
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The index of the shard that owns `key`.
    pub fn shard_for(&self, key: &str) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        shard_index(key, self.shards.len())
    }

    fn route(&self, key: &str) -> StoreResult<&SharedStore> {
        validate_key(key)?;
        Ok(&self.shards[self.shard_for(key)])
    }
}

impl Store for Sharded {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.route(key)?.set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.route(key)?.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.route(key)?.delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        let errors = self
            .shards
            .iter()
            .filter_map(|store| store.close().err())
            .collect();
        StoreError::join(errors)
    }
}
