use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use serde::{Deserialize, Serialize};
use strata_store::{SharedStore, Store, StoreResult, Value};

/// Admission control for store calls.
///
/// `acquire` blocks until the caller may proceed. The pacing algorithm is
/// up to the implementation.
pub trait RateLimiter: Send + Sync {
    fn acquire(&self);
}

/// A limiter that never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn acquire(&self) {}
}

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub const DEFAULT_BURST: u32 = 10;

/// Token-bucket settings. No rate, or a rate of zero, means unlimited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Sustained permits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_second: Option<u32>,
    /// Permits available at once after an idle period.
    pub burst: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            per_second: None,
            burst: DEFAULT_BURST,
        }
    }
}

/// A `governor` token bucket. `acquire` sleeps until the next permit.
pub struct TokenBucket {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
}

impl TokenBucket {
    pub fn new(per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            limiter: governor::RateLimiter::direct(quota),
            clock: DefaultClock::default(),
        }
    }

    /// The bucket for `config`, or `None` when it is unlimited. A zero burst
    /// is raised to one.
    pub fn from_config(config: &RateConfig) -> Option<Self> {
        let per_second = NonZeroU32::new(config.per_second?)?;
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        Some(Self::new(per_second, burst))
    }
}

impl RateLimiter for TokenBucket {
    fn acquire(&self) {
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }
}

/// The limiter described by `config`.
pub fn limiter(config: &RateConfig) -> Arc<dyn RateLimiter> {
    match TokenBucket::from_config(config) {
        Some(bucket) => Arc::new(bucket),
        None => Arc::new(Unlimited),
    }
}

/// Pace set/get/delete on `inner` through `limiter`.
pub fn wrap(inner: SharedStore, limiter: Arc<dyn RateLimiter>) -> SharedStore {
    Arc::new(Throttled::new(inner, limiter))
}

/// Acquires one permit before every set, get and delete. Close is never
/// throttled so shutdown cannot stall behind a slow limiter.
pub struct Throttled {
    inner: SharedStore,
    limiter: Arc<dyn RateLimiter>,
}

impl Throttled {
    pub fn new(inner: SharedStore, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

impl Store for Throttled {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.limiter.acquire();
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.limiter.acquire();
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.limiter.acquire();
        self.inner.delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
