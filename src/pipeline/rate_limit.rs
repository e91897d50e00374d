//! Upstream quota tracking from `x-ratelimit-*` response headers.

// crates.io
use oauth2::http::HeaderMap;
use tokio::time::Instant;
// self
use crate::{_prelude::*, http};

const REMAINING: &str = "x-ratelimit-remaining";
const RESET: &str = "x-ratelimit-reset";
const USED: &str = "x-ratelimit-used";

/// Read-only view of the most recently observed quota.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RateLimitSnapshot {
	/// Requests left in the current window; fractional values are reported as sent.
	pub remaining: Option<f64>,
	/// Requests already spent in the current window.
	pub used: Option<u32>,
	/// Instant at which the current window resets.
	pub window_reset_at: Option<Instant>,
}
impl RateLimitSnapshot {
	/// Returns `true` when the quota is known to be spent.
	pub fn is_exhausted(&self) -> bool {
		self.remaining.is_some_and(|remaining| remaining < 1.0)
	}

	/// Time until the next request may be sent; zero while quota remains or is unknown.
	pub fn time_until_available(&self, now: Instant) -> StdDuration {
		if !self.is_exhausted() {
			return StdDuration::ZERO;
		}

		self.window_reset_at
			.map(|reset_at| reset_at.saturating_duration_since(now))
			.unwrap_or(StdDuration::ZERO)
	}
}

/// Last-write-wins store for the quota advertised by upstream responses.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
	state: Mutex<RateLimitSnapshot>,
}
impl RateLimitTracker {
	/// Records the quota headers of one response. Absent headers keep the previous values.
	pub fn observe(&self, headers: &HeaderMap) {
		self.observe_at(headers, Instant::now());
	}

	/// Same as [`RateLimitTracker::observe`] with an explicit observation instant.
	pub fn observe_at(&self, headers: &HeaderMap, now: Instant) {
		let remaining = http::header_str(headers, REMAINING)
			.and_then(|v| v.parse::<f64>().ok())
			.filter(|v| v.is_finite());
		// Negative, non-finite, or unrepresentable resets are dropped like a missing header.
		let reset_at = http::header_str(headers, RESET)
			.and_then(|v| v.parse::<f64>().ok())
			.and_then(|secs| StdDuration::try_from_secs_f64(secs).ok())
			.and_then(|reset| now.checked_add(reset));
		let used = http::header_str(headers, USED).and_then(|v| v.parse::<u32>().ok());

		if remaining.is_none() && reset_at.is_none() && used.is_none() {
			return;
		}

		let mut state = self.state.lock();

		if let Some(remaining) = remaining {
			state.remaining = Some(remaining);
		}
		if let Some(reset_at) = reset_at {
			state.window_reset_at = Some(reset_at);
		}
		if let Some(used) = used {
			state.used = Some(used);
		}
	}

	/// Time until the next request may be sent.
	pub fn time_until_available(&self, now: Instant) -> StdDuration {
		self.state.lock().time_until_available(now)
	}

	/// Returns a copy of the tracked quota.
	pub fn snapshot(&self) -> RateLimitSnapshot {
		*self.state.lock()
	}
}
