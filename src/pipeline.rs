//! Request pipeline stages.
//!
//! Every logical request walks the same path: [`CredentialState`] supplies a usable token,
//! [`Throttle`] admits the attempt in arrival order while consulting the [`RateLimitTracker`],
//! the transport executes it, and [`RetryPolicy`] decides whether a failed attempt re-enters
//! from the top. [`Dispatcher`] owns the stages and runs that loop.

pub mod credential;
pub mod dispatch;
pub mod rate_limit;
pub mod retry;
pub mod throttle;

pub use credential::*;
pub use dispatch::*;
pub use rate_limit::*;
pub use retry::*;
pub use throttle::*;
