//! Observability helpers for the request pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `snoo_broker.request` with the
//!   `kind` and `operation` fields set up front and `attempt` and `status` recorded as the
//!   request advances, plus per-attempt debug events and warning events.
//! - Enable `metrics` to publish:
//!   - `snoo_broker_request_total{kind, outcome}` for every attempt/success/retry/failure;
//!   - `snoo_broker_retry_total{kind, cause}`, where `cause` is the status code or `network`;
//!   - `snoo_broker_ratelimit_rejected_total` and the `snoo_broker_ratelimit_reset_seconds`
//!     histogram for admissions refused on a spent quota;
//!   - the `snoo_broker_ratelimit_wait_seconds` histogram for admissions that slept instead.
//!
//! [`PipelineMetrics`] counters are always available regardless of features.

mod counters;
mod metrics;
mod tracing;
mod warn;

pub use counters::*;
pub use metrics::*;
pub use tracing::*;
pub use warn::*;

// self
use crate::_prelude::*;

/// Request categories observed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
	/// Bearer-authenticated API call.
	Api,
	/// API call made without a token.
	Unauthenticated,
	/// Refresh-token exchange.
	Refresh,
	/// Token revocation.
	Revoke,
}
impl RequestKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestKind::Api => "api",
			RequestKind::Unauthenticated => "unauthenticated",
			RequestKind::Refresh => "refresh",
			RequestKind::Revoke => "revoke",
		}
	}
}
impl Display for RequestKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each logical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a pipeline operation.
	Attempt,
	/// Successful completion.
	Success,
	/// A failed physical attempt that will be re-dispatched.
	Retry,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Retry => "retry",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
