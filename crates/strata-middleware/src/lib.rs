//! Composable middleware for Strata key-value stores.
//!
//! Every middleware here takes one or more [`SharedStore`]s and returns a
//! [`SharedStore`], so wrappers stack in any order and the result is usable
//! wherever a plain store is.
//!
//! # Modules
//!
//! - [`instrument`] -- per-call trace ids, timing, callbacks, counters and
//!   duration observers
//! - [`trace`] -- trace ids, random sources and the per-call context
//! - [`stats`] -- the counter and observer capabilities consumed by
//!   [`instrument`], plus adder adapters
//! - [`logging`], [`span`], [`metrics`] -- `tracing` events, `tracing` spans and
//!   Prometheus metrics, each built from instrumentation options
//! - [`multilevel`] -- tiered cache cascade with read back-fill
//! - [`shard`] -- BLAKE3 key-hashed partitioning
//! - [`policy`] -- fallback, read-only, retry, throttle and membership filter
//!   wrappers
//!
//! # Design Rules
//!
//! 1. A wrapper never alters a value, a found flag or an error on its way
//!    back to the caller, except where its documented purpose is to.
//! 2. Close always reaches every inner store; failures are aggregated.
//! 3. Composite wrappers reject an empty key before touching any inner store.
//! 4. Callbacks run synchronously on the calling thread.
//!
//! [`SharedStore`]: strata_store::SharedStore

pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod multilevel;
pub mod policy;
pub mod shard;
pub mod span;
pub mod stats;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types at crate root for ergonomic imports.
pub use instrument::{
    Completion, CloseEvent, DeleteEvent, GetEvent, InstrumentConfig, InstrumentOption,
    Instrumented, SetEvent,
};
pub use logging::{LogLevel, LoggingConfig};
pub use metrics::{MetricsConfig, MetricsSnapshot, StoreMetrics};
pub use multilevel::Multilevel;
pub use shard::{shard_index, Sharded};
pub use stats::{Adder, FloatAdder, Incrementer, Observer};
pub use trace::{CallArgs, CallContext, RandomSource, SeededRandom, ThreadRandom, TraceId};
