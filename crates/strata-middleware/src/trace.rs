//! Per-call identity: trace ids, the random sources that mint them and the
//! context handed to callbacks.

use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_store::Operation;

/// Opaque identity of one top-level store call.
///
/// Minted when an instrumented call starts and handed to every callback of
/// that call through its [`CallContext`]. Never persisted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u64);

impl TraceId {
    /// Create a trace id from its raw value.
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Full hex-encoded string (16 lower-case digits).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.to_hex())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Source of randomness for trace ids.
pub trait RandomSource: Send + Sync {
    fn next_u64(&self) -> u64;
}

/// Default source: the thread-local, OS-seeded generator.
///
/// Needs no lock, so concurrent callers never contend on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rand::thread_rng().gen()
    }
}

/// Deterministic source for reproducible trace ids in tests.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_u64(&self) -> u64 {
        self.rng.lock().expect("rng mutex poisoned").gen()
    }
}

impl<F> RandomSource for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn next_u64(&self) -> u64 {
        self()
    }
}

/// Call-scoped values shared by every callback of one store call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Identity of this call.
    pub trace_id: TraceId,
    /// The operation being performed.
    pub operation: Operation,
}

/// Snapshot of the arguments of a call, as seen by trace callbacks.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallArgs<'a> {
    /// The key, absent for close.
    pub key: Option<&'a str>,
    /// The value, present only for set.
    pub value: Option<&'a [u8]>,
}
