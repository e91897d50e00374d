//! Request dispatcher: token, gate, transport, tracker, retry, parse.

// crates.io
use oauth2::http::{HeaderMap, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{Config, Endpoints},
	error::{ApplicationError, ConfigError},
	http::{self, HttpResponse, Params, Transport, Verb},
	obs::{self, Outcome, PipelineMetrics, RequestKind, RequestSpan, WarningSink},
	pipeline::{CredentialState, FailureClass, RateLimitTracker, RetryDecision, RetryPolicy, Throttle},
};

const RAW_JSON: &str = "raw_json";

/// Parsed body of a successful response.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Parsed JSON body; `null` for empty bodies.
	pub body: Value,
}

/// Shared state behind every clone of a client.
pub struct Dispatcher {
	pub(crate) credentials: CredentialState,
	pub(crate) tracker: RateLimitTracker,
	throttle: Throttle,
	metrics: Arc<PipelineMetrics>,
	config: RwLock<Arc<Config>>,
	endpoints: Option<Endpoints>,
	warnings: Arc<dyn WarningSink>,
}
impl Dispatcher {
	/// Wires the pipeline stages together.
	pub fn new(
		credentials: CredentialState,
		config: Config,
		metrics: Arc<PipelineMetrics>,
		warnings: Arc<dyn WarningSink>,
	) -> Self {
		Self {
			credentials,
			tracker: RateLimitTracker::default(),
			throttle: Throttle::new(metrics.clone()),
			metrics,
			config: RwLock::new(Arc::new(config)),
			endpoints: None,
			warnings,
		}
	}

	/// Pins every request to `endpoints` instead of deriving them from the configured domain.
	pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = Some(endpoints);

		self
	}

	/// Current configuration snapshot.
	pub fn config(&self) -> Arc<Config> {
		self.config.read().clone()
	}

	/// Replaces the configuration; in-flight attempts keep the snapshot they started with.
	pub fn set_config(&self, config: Config) {
		*self.config.write() = Arc::new(config);
	}

	/// Applies `f` to a copy of the configuration and installs the result.
	pub fn update_config<F>(&self, f: F)
	where
		F: FnOnce(&mut Config),
	{
		let mut config = self.config.write();
		let mut next = Config::clone(&config);

		f(&mut next);
		*config = Arc::new(next);
	}

	/// Shared counters.
	pub fn metrics(&self) -> &PipelineMetrics {
		&self.metrics
	}

	/// Endpoints used by the next attempt.
	pub fn endpoints(&self, config: &Config) -> Result<Endpoints, ConfigError> {
		match &self.endpoints {
			Some(endpoints) => Ok(endpoints.clone()),
			None => Endpoints::for_domain(&config.endpoint_domain),
		}
	}

	/// Forwards `message` to the warning sink unless warnings are suppressed.
	pub fn warn(&self, message: &str) {
		self.warn_with(&self.config(), message);
	}

	/// Runs one logical request through the pipeline, retrying transient failures.
	///
	/// Each attempt resolves a bearer token before it reaches the throttle gate. An expired token
	/// is therefore refreshed even when the gate then fails the attempt with
	/// [`Error::RateLimitExceeded`]; the token endpoint is not metered by the API quota, and a
	/// rejected dispatch never reaches the transport with an API request.
	pub async fn dispatch<T>(
		&self,
		transport: &T,
		verb: Verb,
		path: &str,
		params: &Params,
		authenticated: bool,
	) -> Result<ApiResponse>
	where
		T: ?Sized + Transport,
	{
		let kind = if authenticated { RequestKind::Api } else { RequestKind::Unauthenticated };
		let span = RequestSpan::new(kind, path);

		obs::record_outcome(kind, Outcome::Attempt);

		let result = span.instrument(self.run(transport, &span, verb, path, params)).await;

		obs::record_outcome(kind, if result.is_ok() { Outcome::Success } else { Outcome::Failure });

		result
	}

	async fn run<T>(
		&self,
		transport: &T,
		span: &RequestSpan,
		verb: Verb,
		path: &str,
		params: &Params,
	) -> Result<ApiResponse>
	where
		T: ?Sized + Transport,
	{
		let kind = span.kind();
		let mut attempt = 0;

		loop {
			let config = self.config();
			let policy = RetryPolicy::from(config.as_ref());
			let endpoints = self.endpoints(&config)?;
			let (url, token) = match kind {
				RequestKind::Unauthenticated => (endpoints.www_url(path)?, None),
				_ => {
					let token = self.credentials.ensure_valid_token(transport, &endpoints).await?;
					let mut url = endpoints.oauth_url(path)?;

					if !params.query.iter().any(|(key, _)| key == RAW_JSON) {
						url.query_pairs_mut().append_pair(RAW_JSON, "1");
					}

					(url, Some(token))
				},
			};
			let request = http::build_request(
				verb,
				url,
				params,
				self.credentials.user_agent(),
				token.as_ref().map(TokenSecret::bearer_header),
			)?;
			let endpoint = http::endpoint_label(request.uri());

			self.throttle.admit(&config, &self.tracker, |m| self.warn_with(&config, m)).await?;

			span.start_attempt(attempt, verb.as_str(), &endpoint, config.debug);
			self.metrics.record_request();

			let response = match transport.execute(request).await {
				Ok(response) => response,
				Err(err) if !err.is_network() => return Err(err.into()),
				Err(err) => {
					let failure = FailureClass::network();

					if policy.decide(&failure, attempt) == RetryDecision::Retry {
						self.note_retry(&config, &policy, kind, &failure, attempt);
						attempt += 1;

						continue;
					}

					return Err(err.into());
				},
			};
			let status = response.status();

			self.tracker.observe(response.headers());
			span.record_status(status.as_u16(), &endpoint, config.debug);

			if status.is_success() {
				return parse_body(status.as_u16(), response.body());
			}
			if let Some(err) = self.auth_failure(&response, token.as_ref()) {
				return Err(err);
			}

			let failure = FailureClass::status(status.as_u16());

			match policy.decide(&failure, attempt) {
				RetryDecision::Retry => {
					self.note_retry(&config, &policy, kind, &failure, attempt);
					attempt += 1;
				},
				RetryDecision::Surface => return Err(status_error(&policy, &response, attempt)),
			}
		}
	}

	/// Maps 401/403 answers that concern the bearer token.
	fn auth_failure(&self, response: &HttpResponse, token: Option<&TokenSecret>) -> Option<Error> {
		let status = response.status();

		if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
			return None;
		}

		let token = token?;
		let challenge = http::header_str(response.headers(), "www-authenticate").unwrap_or_default();

		if challenge.contains("insufficient_scope") {
			return Some(Error::InsufficientScope { reason: challenge.to_owned() });
		}
		if status == StatusCode::FORBIDDEN {
			return None;
		}

		self.credentials.mark_access_stale(token);

		Some(Error::Authentication { reason: "Upstream rejected the access token".into() })
	}

	fn note_retry(
		&self,
		config: &Config,
		policy: &RetryPolicy,
		kind: RequestKind,
		failure: &FailureClass,
		attempt: u32,
	) {
		self.metrics.record_retry();
		obs::record_outcome(kind, Outcome::Retry);
		obs::record_retry(kind, failure.status_code);
		self.warn_with(config, &policy.retry_message(failure, attempt));
	}

	fn warn_with(&self, config: &Config, message: &str) {
		if !config.suppress_warnings {
			self.warnings.warn(message);
		}
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("credentials", &self.credentials)
			.field("tracker", &self.tracker)
			.field("config", &self.config())
			.field("endpoints", &self.endpoints)
			.finish()
	}
}

/// Deserializes a successful response's [`Value`] into `T`, reporting the failing JSON path.
pub fn decode_as<T>(response: ApiResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let ApiResponse { status, body } = response;

	serde_path_to_error::deserialize(body).map_err(|source| Error::MalformedResponse { source, status })
}

fn parse_body(status: u16, body: &[u8]) -> Result<ApiResponse> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(ApiResponse { status, body: Value::Null });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let body: Value = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::MalformedResponse { source, status })?;

	if let Some(err) = ApplicationError::from_payload(&body) {
		return Err(err.into());
	}

	Ok(ApiResponse { status, body })
}

fn status_error(policy: &RetryPolicy, response: &HttpResponse, attempt: u32) -> Error {
	let status = response.status();

	if policy.is_retryable_status(status.as_u16()) {
		return Error::TransientUpstream { status: status.as_u16(), attempts: attempt + 1 };
	}

	Error::HttpStatus {
		status: status.as_u16(),
		message: status_message(status, response.headers(), response.body()),
	}
}

fn status_message(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> String {
	let from_body = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
		value.get("message").and_then(Value::as_str).map(ToOwned::to_owned)
	});

	from_body
		.or_else(|| http::header_str(headers, "x-error-message").map(ToOwned::to_owned))
		.unwrap_or_else(|| status.canonical_reason().unwrap_or("unexpected status").to_owned())
}
