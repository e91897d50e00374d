//! Client configuration and endpoint derivation.
//!
//! [`Config`] is read as an immutable snapshot at the start of every physical attempt, so an
//! operator can swap it wholesale between calls through [`Client::set_config`](crate::Client)
//! without coordinating with in-flight requests.

// self
use crate::{_prelude::*, error::ConfigError};

/// Tunables for request scheduling, retries, and warnings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Domain hosting the API, e.g. `reddit.com`. OAuth calls go to `oauth.{domain}`, token and
	/// unauthenticated calls to `www.{domain}`.
	pub endpoint_domain: String,
	/// Minimum spacing between two admissions through the throttle gate.
	pub request_delay: StdDuration,
	/// Per-request timeout enforced by the transport.
	pub request_timeout: StdDuration,
	/// Wait for the rate-limit window to reset instead of failing fast.
	pub continue_after_ratelimit_error: bool,
	/// Status codes treated as transient and retried.
	pub retry_error_codes: BTreeSet<u16>,
	/// Maximum number of retries after the first attempt.
	pub max_retry_attempts: u32,
	/// Drops warnings instead of forwarding them to the warning sink.
	pub suppress_warnings: bool,
	/// Emits a debug event for every physical attempt.
	pub debug: bool,
}
impl Config {
	const DEFAULT_DOMAIN: &'static str = "reddit.com";
	const DEFAULT_RETRY_CODES: [u16; 4] = [502, 503, 504, 522];
	const DEFAULT_MAX_RETRIES: u32 = 3;
	const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Sets the endpoint domain.
	pub fn with_endpoint_domain(mut self, domain: impl Into<String>) -> Self {
		self.endpoint_domain = domain.into();

		self
	}

	/// Sets the minimum spacing between admissions.
	pub fn with_request_delay(mut self, delay: StdDuration) -> Self {
		self.request_delay = delay;

		self
	}

	/// Sets the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Chooses between waiting out an exhausted rate limit and failing fast.
	pub fn with_continue_after_ratelimit_error(mut self, enabled: bool) -> Self {
		self.continue_after_ratelimit_error = enabled;

		self
	}

	/// Replaces the set of retryable status codes.
	pub fn with_retry_error_codes<I>(mut self, codes: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.retry_error_codes = codes.into_iter().collect();

		self
	}

	/// Sets the retry budget.
	pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
		self.max_retry_attempts = attempts;

		self
	}

	/// Enables or disables warning suppression.
	pub fn with_suppress_warnings(mut self, suppress: bool) -> Self {
		self.suppress_warnings = suppress;

		self
	}

	/// Enables or disables per-attempt debug events.
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;

		self
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			endpoint_domain: Self::DEFAULT_DOMAIN.into(),
			request_delay: StdDuration::ZERO,
			request_timeout: Self::DEFAULT_TIMEOUT,
			continue_after_ratelimit_error: false,
			retry_error_codes: Self::DEFAULT_RETRY_CODES.into_iter().collect(),
			max_retry_attempts: Self::DEFAULT_MAX_RETRIES,
			suppress_warnings: false,
			debug: false,
		}
	}
}

/// Base URLs used by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Base for bearer-authenticated API calls.
	pub oauth: Url,
	/// Base for unauthenticated calls.
	pub www: Url,
	/// Token endpoint used for refresh exchanges.
	pub token: Url,
	/// Revocation endpoint.
	pub revocation: Url,
}
impl Endpoints {
	/// Derives the standard endpoint layout for `domain`.
	pub fn for_domain(domain: &str) -> Result<Self, ConfigError> {
		let oauth = Url::parse(&format!("https://oauth.{domain}"))?;
		let www = Url::parse(&format!("https://www.{domain}"))?;

		Self::from_bases(oauth, www)
	}

	/// Builds endpoints from explicit bases; token and revocation live under `www`.
	pub fn from_bases(oauth: Url, www: Url) -> Result<Self, ConfigError> {
		let token = www.join("/api/v1/access_token")?;
		let revocation = www.join("/api/v1/revoke_token")?;

		Ok(Self { oauth, www, token, revocation })
	}

	/// Resolves an API path against the OAuth base.
	pub fn oauth_url(&self, path: &str) -> Result<Url, ConfigError> {
		join_path(&self.oauth, path)
	}

	/// Resolves an API path against the unauthenticated base.
	pub fn www_url(&self, path: &str) -> Result<Url, ConfigError> {
		join_path(&self.www, path)
	}
}

fn join_path(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let trimmed = path.trim_start_matches('/');

	Ok(base.join(&format!("/{trimmed}"))?)
}
