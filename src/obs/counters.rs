// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for pipeline activity.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
	requests: AtomicU64,
	retries: AtomicU64,
	refreshes: AtomicU64,
	refresh_failures: AtomicU64,
	ratelimit_rejections: AtomicU64,
	ratelimit_waits: AtomicU64,
}
impl PipelineMetrics {
	/// Returns the number of physical API attempts handed to the transport.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that were re-dispatched by the retry policy.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of token-endpoint exchanges started.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of token-endpoint exchanges that failed.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of admissions rejected because the rate limit was exhausted.
	pub fn ratelimit_rejections(&self) -> u64 {
		self.ratelimit_rejections.load(Ordering::Relaxed)
	}

	/// Returns the number of admissions that waited for a rate-limit window to reset.
	pub fn ratelimit_waits(&self) -> u64 {
		self.ratelimit_waits.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_ratelimit_rejection(&self) {
		self.ratelimit_rejections.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_ratelimit_wait(&self) {
		self.ratelimit_waits.fetch_add(1, Ordering::Relaxed);
	}
}
