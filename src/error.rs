//! Pipeline-level error types shared by the dispatcher, credential state, and transports.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts) that outlived the retry budget.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Credentials are missing, expired without a way to renew them, revoked, or rejected.
	#[error("Authentication failed: {reason}.")]
	Authentication {
		/// Upstream- or client-supplied reason string.
		reason: String,
	},
	/// The access token is valid but does not cover the endpoint's scope.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Upstream-supplied challenge or reason string.
		reason: String,
	},
	/// Upstream quota is exhausted and the client is configured not to wait.
	#[error(
		"Rate limit exceeded; the window resets in {}s. Enable continue_after_ratelimit_error to wait instead.",
		reset_in.as_secs()
	)]
	RateLimitExceeded {
		/// Time remaining until the upstream window resets.
		reset_in: StdDuration,
	},
	/// Upstream kept answering with a retryable status until the retry budget ran out.
	#[error("Upstream returned status {status} after {attempts} attempts.")]
	TransientUpstream {
		/// Status code of the final attempt.
		status: u16,
		/// Number of physical attempts made.
		attempts: u32,
	},
	/// Upstream answered with a non-success status that is not retryable.
	#[error("Upstream returned status {status}: {message}.")]
	HttpStatus {
		/// HTTP status code.
		status: u16,
		/// Message extracted from the body, or the canonical reason phrase.
		message: String,
	},
	/// Body could not be parsed into the expected JSON shape.
	#[error("Upstream returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Upstream signaled a domain-level failure inside a successful response.
	#[error(transparent)]
	Application(#[from] ApplicationError),
}

/// Configuration and validation failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Endpoint domain or path produces an invalid URL.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// JSON request body could not be serialized.
	#[error("Request body could not be serialized.")]
	InvalidBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// User agent is empty.
	#[error("A non-empty user agent is required.")]
	MissingUserAgent,
	/// Neither an access token nor a full refresh credential set was supplied.
	#[error(
		"Credentials require either an access token or a client id, client secret, and refresh token."
	)]
	IncompleteCredentials,
	/// Revocation was requested without a refresh token on hand.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Revocation was requested without an access token on hand.
	#[error("No access token is available.")]
	MissingAccessToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidEndpoint { source }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint being called, without query string.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to {endpoint} timed out.")]
	Timeout {
		/// Endpoint being called, without query string.
		endpoint: String,
	},
	/// Request could not be handed to the transport.
	#[error("Request could not be converted for the transport.")]
	Request {
		/// Transport-specific conversion error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Box::new(src) }
	}

	/// Returns `true` for failures on the wire that a later attempt may not hit again.
	pub fn is_network(&self) -> bool {
		matches!(self, Self::Network { .. } | Self::Timeout { .. } | Self::Io(_))
	}
}

/// A single entry of the upstream `json.errors` list: `[code, message, field]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
	/// Machine-readable error code, e.g. `SUBREDDIT_NOEXIST`.
	pub code: String,
	/// Human-readable explanation.
	pub message: String,
	/// Offending form field, if any.
	pub field: Option<String>,
}

/// Domain-level failure embedded in an otherwise successful response.
#[derive(Clone, Debug, PartialEq, ThisError)]
#[error("Upstream rejected the request: {}.", self.summary())]
pub struct ApplicationError {
	/// Parsed error entries; empty when the payload used the single `error` member form.
	pub errors: Vec<ApiErrorEntry>,
	/// The upstream's complete response payload.
	pub payload: Value,
}
impl ApplicationError {
	/// Inspects a parsed body and returns the embedded error envelope, if any.
	///
	/// Two envelope shapes are recognized: `{"json": {"errors": [[code, message, field]]}}`
	/// with a non-empty list, and a top-level `"error"` member.
	pub fn from_payload(payload: &Value) -> Option<Self> {
		let object = payload.as_object()?;

		if let Some(list) = object
			.get("json")
			.and_then(|json| json.get("errors"))
			.and_then(Value::as_array)
			.filter(|list| !list.is_empty())
		{
			let errors = list.iter().map(ApiErrorEntry::from_value).collect();

			return Some(Self { errors, payload: payload.clone() });
		}
		if object.contains_key("error") {
			return Some(Self { errors: Vec::new(), payload: payload.clone() });
		}

		None
	}

	fn summary(&self) -> String {
		if !self.errors.is_empty() {
			return self
				.errors
				.iter()
				.map(|entry| format!("{}: {}", entry.code, entry.message))
				.collect::<Vec<_>>()
				.join("; ");
		}

		let error = self.payload.get("error").map(value_text).unwrap_or_default();

		match self.payload.get("message").map(value_text) {
			Some(message) => format!("{error} ({message})"),
			None => error,
		}
	}
}
impl ApiErrorEntry {
	fn from_value(value: &Value) -> Self {
		let part = |idx: usize| value.get(idx).filter(|v| !v.is_null()).map(value_text);

		match value.as_array() {
			Some(_) => Self {
				code: part(0).unwrap_or_default(),
				message: part(1).unwrap_or_default(),
				field: part(2),
			},
			None => Self { code: value_text(value), message: String::new(), field: None },
		}
	}
}

fn value_text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
