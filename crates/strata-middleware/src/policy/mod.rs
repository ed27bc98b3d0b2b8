//! Single-store policy wrappers.
//!
//! Each wrapper holds one inner store (two for [`fallback`]) and changes how
//! calls reach it, without looking at the values involved.

pub mod fallback;
pub mod filter;
pub mod readonly;
pub mod retry;
pub mod throttle;

pub use fallback::Fallback;
pub use filter::{Filtered, MembershipFilter};
pub use readonly::ReadOnly;
pub use retry::{RetryConfig, Retrying, Sleeper, ThreadSleeper};
pub use throttle::{RateConfig, RateLimiter, Throttled, TokenBucket, Unlimited};
