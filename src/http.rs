//! Transport primitives shared by API calls and token exchanges.
//!
//! [`Transport`] is the pipeline's only dependency on an HTTP stack. Requests and responses
//! use the `http` types re-exported by `oauth2`, so the same transport drives bearer API calls,
//! token refreshes through the `oauth2` client, and revocations. Tests substitute scripted
//! transports; production code uses [`ReqwestTransport`].

pub use oauth2::{HttpRequest, HttpResponse, http::Method};

// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute one request.
///
/// Implementations must report every HTTP response, including non-success statuses, as `Ok`;
/// `Err` is reserved for failures where no response was received. Timeouts should surface as
/// [`TransportError::Timeout`] so the retry policy can treat them as network errors.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the complete response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Fixed set of HTTP verbs the API uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PATCH`.
	Patch,
	/// `PUT`.
	Put,
	/// `DELETE`.
	Delete,
}
impl Verb {
	/// Returns the matching [`Method`].
	pub fn method(self) -> Method {
		match self {
			Verb::Get => Method::GET,
			Verb::Post => Method::POST,
			Verb::Patch => Method::PATCH,
			Verb::Put => Method::PUT,
			Verb::Delete => Method::DELETE,
		}
	}

	/// Returns the upper-case verb label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Verb::Get => "GET",
			Verb::Post => "POST",
			Verb::Patch => "PATCH",
			Verb::Put => "PUT",
			Verb::Delete => "DELETE",
		}
	}
}
impl Display for Verb {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Query string, form body, and JSON body for one logical request.
///
/// A JSON body takes precedence over form pairs when both are set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
	/// Query-string pairs.
	pub query: Vec<(String, String)>,
	/// `application/x-www-form-urlencoded` body pairs.
	pub form: Vec<(String, String)>,
	/// JSON body.
	pub json: Option<Value>,
}
impl Params {
	/// Creates empty parameters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a query-string pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends a form body pair.
	pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.form.push((key.into(), value.into()));

		self
	}

	/// Sets a JSON body.
	pub fn json(mut self, body: Value) -> Self {
		self.json = Some(body);

		self
	}
}

/// Assembles an [`HttpRequest`] for `url` with the client's headers and the caller's params.
pub(crate) fn build_request(
	verb: Verb,
	mut url: Url,
	params: &Params,
	user_agent: &str,
	authorization: Option<String>,
) -> Result<HttpRequest, ConfigError> {
	if !params.query.is_empty() {
		url.query_pairs_mut().extend_pairs(params.query.iter());
	}

	let (content_type, body) = if let Some(json) = &params.json {
		let body =
			serde_json::to_vec(json).map_err(|source| ConfigError::InvalidBody { source })?;

		(Some("application/json"), body)
	} else if !params.form.is_empty() {
		let body =
			form_urlencoded::Serializer::new(String::new()).extend_pairs(params.form.iter()).finish();

		(Some("application/x-www-form-urlencoded"), body.into_bytes())
	} else {
		(None, Vec::new())
	};
	let mut builder = Request::builder()
		.method(verb.method())
		.uri(url.as_str())
		.header(USER_AGENT, user_agent)
		.header(ACCEPT, "application/json");

	if let Some(value) = authorization {
		builder = builder.header(AUTHORIZATION, value);
	}
	if let Some(value) = content_type {
		builder = builder.header(CONTENT_TYPE, value);
	}

	Ok(builder.body(body)?)
}

/// Inserts the user agent unless the request already carries one.
pub(crate) fn ensure_user_agent(request: &mut HttpRequest, user_agent: &str) {
	if request.headers().contains_key(USER_AGENT) {
		return;
	}
	if let Ok(value) = HeaderValue::from_str(user_agent) {
		request.headers_mut().insert(USER_AGENT, value);
	}
}

/// Reads a header as trimmed UTF-8.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim)
}

/// Returns `scheme://host/path` for log and error labels, dropping query strings.
pub(crate) fn endpoint_label(uri: &oauth2::http::Uri) -> String {
	match (uri.scheme_str(), uri.authority()) {
		(Some(scheme), Some(authority)) => format!("{scheme}://{authority}{}", uri.path()),
		_ => uri.path().to_owned(),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are not followed: API and token endpoints answer directly, and a redirect
/// usually means the request went to the wrong host.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client enforcing `timeout` per request.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let endpoint = endpoint_label(request.uri());
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::Request { source: Box::new(e) })?;
			let response =
				self.0.execute(request).await.map_err(|e| map_reqwest_error(&endpoint, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| map_reqwest_error(&endpoint, e))?;
			let mut response_new = HttpResponse::new(body.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		return TransportError::Timeout { endpoint: endpoint.to_owned() };
	}

	TransportError::network(endpoint, err)
}
