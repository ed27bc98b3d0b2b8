//! The key-value store contract for Strata.
//!
//! Every component in Strata, whether a concrete backend or a middleware
//! wrapper, implements the same four-operation [`Store`] trait. Because the
//! contract is uniform, wrappers compose freely: a sharded set of
//! instrumented stores can sit behind a cache cascade, which in turn can be
//! made read-only, and the caller still talks to a single `Store`.
//!
//! # Modules
//!
//! - [`traits`] -- the [`Store`] trait, [`Operation`] labels, shared handles
//! - [`error`] -- [`StoreError`] and the [`StoreResult`] alias
//! - [`validation`] -- key checks shared by every implementation
//! - [`memory`] -- [`InMemoryStore`] for tests, demos and near cache levels
//! - [`codec`] -- [`Codec`] implementations and the [`TypedStore`] adapter
//!
//! # Design Rules
//!
//! 1. Keys are non-empty; values are byte slices and cannot be absent.
//! 2. Errors from a backend are propagated verbatim, never reinterpreted.
//! 3. A store needs no session between calls and is safe to share.
//! 4. The store never interprets value bytes; encoding belongs to codecs.

pub mod codec;
pub mod error;
pub mod memory;
pub mod traits;
pub mod validation;

// Re-export primary types at crate root for ergonomic imports.
pub use codec::{BincodeCodec, Codec, JsonCodec, TypedStore};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{Operation, SharedStore, Store, Value};
pub use validation::validate_key;
