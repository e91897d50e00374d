//! Bounded retry decisions for failed physical attempts.

// self
use crate::{_prelude::*, config::Config};

/// What went wrong with one physical attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FailureClass {
	/// HTTP status code, when a response was received.
	pub status_code: Option<u16>,
	/// No response was received (connect, TLS, timeout).
	pub is_network_error: bool,
	/// A response arrived but its body could not be parsed.
	pub is_malformed_response: bool,
}
impl FailureClass {
	/// Failure carrying an HTTP status.
	pub fn status(code: u16) -> Self {
		Self { status_code: Some(code), ..Default::default() }
	}

	/// Failure where no response was received.
	pub fn network() -> Self {
		Self { is_network_error: true, ..Default::default() }
	}

	/// Failure where the body could not be parsed.
	pub fn malformed(code: u16) -> Self {
		Self { status_code: Some(code), is_malformed_response: true, ..Default::default() }
	}
}

/// Outcome of a [`RetryPolicy::decide`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// Re-dispatch from the top of the pipeline.
	Retry,
	/// Hand the failure back to the caller.
	Surface,
}

/// Retry budget and retryable statuses taken from one [`Config`] snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	retry_error_codes: BTreeSet<u16>,
	max_retry_attempts: u32,
}
impl RetryPolicy {
	/// Creates a policy from explicit values.
	pub fn new(retry_error_codes: BTreeSet<u16>, max_retry_attempts: u32) -> Self {
		Self { retry_error_codes, max_retry_attempts }
	}

	/// Retry budget after the first attempt.
	pub fn max_retry_attempts(&self) -> u32 {
		self.max_retry_attempts
	}

	/// Returns `true` when `code` is listed as transient.
	pub fn is_retryable_status(&self, code: u16) -> bool {
		self.retry_error_codes.contains(&code)
	}

	/// Decides whether the attempt numbered `attempt_count` (zero-based) is re-dispatched.
	///
	/// Malformed bodies are never retried; statuses are retried only when listed; network
	/// failures share the same budget as listed statuses.
	pub fn decide(&self, failure: &FailureClass, attempt_count: u32) -> RetryDecision {
		if attempt_count >= self.max_retry_attempts || failure.is_malformed_response {
			return RetryDecision::Surface;
		}
		if failure.is_network_error {
			return RetryDecision::Retry;
		}

		match failure.status_code {
			Some(code) if self.is_retryable_status(code) => RetryDecision::Retry,
			_ => RetryDecision::Surface,
		}
	}

	/// Warning emitted before re-dispatching attempt `attempt_count`.
	pub fn retry_message(&self, failure: &FailureClass, attempt_count: u32) -> String {
		let attempt = attempt_count + 1;
		let max = self.max_retry_attempts;

		match failure.status_code {
			Some(code) => {
				format!("Received status code {code}; retrying request (attempt {attempt}/{max})")
			},
			None => format!("Network error; retrying request (attempt {attempt}/{max})"),
		}
	}
}
impl From<&Config> for RetryPolicy {
	fn from(config: &Config) -> Self {
		Self::new(config.retry_error_codes.clone(), config.max_retry_attempts)
	}
}
