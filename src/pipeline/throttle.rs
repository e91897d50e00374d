//! FIFO throttle gate spacing admissions and honoring the upstream quota.

// crates.io
use tokio::{sync::Mutex as FairMutex, time::Instant};
// self
use crate::{
	_prelude::*,
	config::Config,
	obs::{self, PipelineMetrics},
	pipeline::RateLimitTracker,
};

/// Admission gate every API request passes through before it reaches the transport.
///
/// The gate owns a single "not before" instant behind a fair async mutex. Arrivals queue on the
/// mutex in order; only the head of the queue sleeps, so admissions leave the gate in the order
/// they arrived and at least `request_delay` apart.
#[derive(Debug)]
pub struct Throttle {
	not_before: FairMutex<Option<Instant>>,
	metrics: Arc<PipelineMetrics>,
}
impl Throttle {
	/// Creates an open gate.
	pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
		Self { not_before: FairMutex::new(None), metrics }
	}

	/// Waits for admission and returns the admission instant.
	///
	/// When the tracked quota is exhausted the gate either fails with
	/// [`Error::RateLimitExceeded`] or, with `continue_after_ratelimit_error`, reports a warning
	/// through `warn` and sleeps until the window resets.
	///
	/// The gate only meters API traffic. Callers that need a bearer token resolve it first, so a
	/// token refresh can still happen ahead of a rejection here.
	pub async fn admit<W>(&self, config: &Config, tracker: &RateLimitTracker, warn: W) -> Result<Instant>
	where
		W: Fn(&str),
	{
		let mut not_before = self.not_before.lock().await;
		let mut waiting_on_quota = false;

		loop {
			let now = Instant::now();
			let spacing = not_before.map(|at| at.saturating_duration_since(now)).unwrap_or_default();
			let quota = tracker.time_until_available(now);

			if !quota.is_zero() {
				if !config.continue_after_ratelimit_error {
					self.metrics.record_ratelimit_rejection();
					obs::record_ratelimit_rejection(quota);

					return Err(Error::RateLimitExceeded { reset_in: quota });
				}
				if !waiting_on_quota {
					waiting_on_quota = true;

					self.metrics.record_ratelimit_wait();
					obs::record_ratelimit_wait(quota);
					warn(&format!(
						"Rate limit exhausted; sleeping {:.1}s until the window resets",
						quota.as_secs_f64()
					));
				}
			}

			let wait = spacing.max(quota);

			if wait.is_zero() {
				*not_before = Some(now + config.request_delay);

				return Ok(now);
			}

			tokio::time::sleep_until(now + wait).await;
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderMap, HeaderValue};
	// self
	use super::*;

	fn gate() -> Throttle {
		Throttle::new(Arc::new(PipelineMetrics::default()))
	}

	fn exhausted(tracker: &RateLimitTracker, reset_secs: &'static str) {
		let mut headers = HeaderMap::new();

		headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
		headers.insert("x-ratelimit-reset", HeaderValue::from_static(reset_secs));
		tracker.observe(&headers);
	}

	#[tokio::test(start_paused = true)]
	async fn consecutive_admissions_respect_request_delay() {
		let gate = gate();
		let tracker = RateLimitTracker::default();
		let config = Config::default().with_request_delay(StdDuration::from_millis(250));
		let first = gate.admit(&config, &tracker, |_| {}).await.expect("First admission should pass.");
		let second =
			gate.admit(&config, &tracker, |_| {}).await.expect("Second admission should pass.");

		assert_eq!(second - first, StdDuration::from_millis(250));
	}

	#[tokio::test(start_paused = true)]
	async fn exhausted_quota_rejects_without_waiting() {
		let gate = gate();
		let tracker = RateLimitTracker::default();

		exhausted(&tracker, "40");

		let started = Instant::now();
		let err = gate
			.admit(&Config::default(), &tracker, |_| {})
			.await
			.expect_err("Exhausted quota should be rejected.");

		assert!(matches!(err, Error::RateLimitExceeded { reset_in } if reset_in == StdDuration::from_secs(40)));
		assert_eq!(Instant::now(), started);
		assert_eq!(gate.metrics.ratelimit_rejections(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn exhausted_quota_waits_when_configured() {
		let gate = gate();
		let tracker = RateLimitTracker::default();
		let warnings = Mutex::new(Vec::new());

		exhausted(&tracker, "3");

		let started = Instant::now();
		let admitted = gate
			.admit(&Config::default().with_continue_after_ratelimit_error(true), &tracker, |m| {
				warnings.lock().push(m.to_owned())
			})
			.await
			.expect("Admission should wait for the reset.");

		assert_eq!(admitted - started, StdDuration::from_secs(3));
		assert_eq!(warnings.lock().len(), 1);
		assert_eq!(gate.metrics.ratelimit_waits(), 1);
	}
}
