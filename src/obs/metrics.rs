// self
use crate::{
	_prelude::*,
	obs::{Outcome, RequestKind},
};

/// Records a logical request outcome as `snoo_broker_request_total{kind, outcome}`.
pub fn record_outcome(kind: RequestKind, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"snoo_broker_request_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a re-dispatched attempt as `snoo_broker_retry_total{kind, cause}`.
///
/// `cause` is the status code that triggered the retry, or `network` when no response arrived.
pub fn record_retry(kind: RequestKind, status: Option<u16>) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"snoo_broker_retry_total",
			"kind" => kind.as_str(),
			"cause" => retry_cause(status)
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, status);
	}
}

/// Records an admission the gate turned away because the quota was spent.
pub fn record_ratelimit_rejection(reset_in: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("snoo_broker_ratelimit_rejected_total").increment(1);
		metrics::histogram!("snoo_broker_ratelimit_reset_seconds").record(reset_in.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = reset_in;
	}
}

/// Records how long the gate slept for the quota window to reset.
pub fn record_ratelimit_wait(wait: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("snoo_broker_ratelimit_wait_seconds").record(wait.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = wait;
	}
}

#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
fn retry_cause(status: Option<u16>) -> String {
	status.map_or_else(|| "network".into(), |code| code.to_string())
}
