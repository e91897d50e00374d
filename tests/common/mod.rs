#![allow(dead_code)]

// std
use std::{collections::VecDeque, sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
use snoo_broker::{
	Client, Config, Credentials, Endpoints,
	error::TransportError,
	http::{HttpRequest, HttpResponse, Transport, TransportFuture},
	oauth2::http::{Method, Response},
	url::Url,
};
use tokio::time::Instant;

pub const TOKEN_PATH: &str = "/api/v1/access_token";
pub const REVOKE_PATH: &str = "/api/v1/revoke_token";

/// One canned answer handed out by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub enum Reply {
	Status { status: u16, headers: Vec<(&'static str, String)>, body: String },
	NetworkError,
	/// The request is refused before anything is sent.
	Unconvertible,
}
impl Reply {
	pub fn json(status: u16, body: &str) -> Self {
		Self::Status { status, headers: Vec::new(), body: body.to_owned() }
	}

	pub fn ok() -> Self {
		Self::json(200, "{}")
	}

	pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
		if let Self::Status { headers, .. } = &mut self {
			headers.push((name, value.into()));
		}

		self
	}
}

/// A request observed by [`ScriptedTransport`], stamped with the (paused) tokio clock.
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: Method,
	pub path: String,
	pub query: Option<String>,
	pub authorization: Option<String>,
	pub body: String,
	pub at: Instant,
}

/// In-process transport answering API, token, and revocation calls from scripts.
///
/// API replies are served in order; once the script runs dry every API call gets `200 {}`.
/// Token calls default to a fresh one-hour token after `token_latency`; revocations answer `204`
/// after `revoke_latency`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	api: Mutex<VecDeque<Reply>>,
	token: Mutex<VecDeque<Reply>>,
	revoke: Mutex<VecDeque<Reply>>,
	recorded: Mutex<Vec<Recorded>>,
	token_latency: Duration,
	revoke_latency: Duration,
}
impl ScriptedTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_token_latency(mut self, latency: Duration) -> Self {
		self.token_latency = latency;

		self
	}

	pub fn with_revoke_latency(mut self, latency: Duration) -> Self {
		self.revoke_latency = latency;

		self
	}

	pub fn push_api(&self, reply: Reply) -> &Self {
		self.api.lock().push_back(reply);

		self
	}

	pub fn push_token(&self, reply: Reply) -> &Self {
		self.token.lock().push_back(reply);

		self
	}

	pub fn push_revoke(&self, reply: Reply) -> &Self {
		self.revoke.lock().push_back(reply);

		self
	}

	pub fn recorded(&self) -> Vec<Recorded> {
		self.recorded.lock().clone()
	}

	pub fn api_calls(&self) -> Vec<Recorded> {
		self.recorded()
			.into_iter()
			.filter(|call| call.path != TOKEN_PATH && call.path != REVOKE_PATH)
			.collect()
	}

	pub fn token_calls(&self) -> usize {
		self.recorded().iter().filter(|call| call.path == TOKEN_PATH).count()
	}

	pub fn revoke_calls(&self) -> Vec<Recorded> {
		self.recorded().into_iter().filter(|call| call.path == REVOKE_PATH).collect()
	}

	fn next_reply(&self, path: &str) -> (Reply, Duration) {
		match path {
			TOKEN_PATH => (
				self.token.lock().pop_front().unwrap_or_else(|| {
					Reply::json(
						200,
						r#"{"access_token":"fresh-token","token_type":"bearer","expires_in":3600,"scope":"identity read"}"#,
					)
				}),
				self.token_latency,
			),
			REVOKE_PATH => {
				(self.revoke.lock().pop_front().unwrap_or_else(|| Reply::json(204, "")), self.revoke_latency)
			},
			_ => (self.api.lock().pop_front().unwrap_or_else(Reply::ok), Duration::ZERO),
		}
	}
}
impl Transport for ScriptedTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let uri = request.uri().clone();
			let path = uri.path().to_owned();

			self.recorded.lock().push(Recorded {
				method: request.method().clone(),
				path: path.clone(),
				query: uri.query().map(ToOwned::to_owned),
				authorization: request
					.headers()
					.get("authorization")
					.and_then(|value| value.to_str().ok())
					.map(ToOwned::to_owned),
				body: String::from_utf8_lossy(request.body()).into_owned(),
				at: Instant::now(),
			});

			let (reply, latency) = self.next_reply(&path);

			if !latency.is_zero() {
				tokio::time::sleep(latency).await;
			}

			match reply {
				Reply::NetworkError => Err(TransportError::Timeout { endpoint: path }),
				Reply::Unconvertible => Err(TransportError::Request {
					source: Box::new(std::io::Error::other("unconvertible request")),
				}),
				Reply::Status { status, headers, body } => {
					let mut builder = Response::builder().status(status);

					if status != 204 {
						builder = builder.header("content-type", "application/json");
					}
					for (name, value) in headers {
						builder = builder.header(name, value);
					}

					Ok::<HttpResponse, TransportError>(
						builder.body(body.into_bytes()).expect("Scripted response should build."),
					)
				},
			}
		})
	}
}

pub fn endpoints() -> Endpoints {
	Endpoints::from_bases(
		Url::parse("https://oauth.example.test").expect("OAuth base should parse."),
		Url::parse("https://www.example.test").expect("WWW base should parse."),
	)
	.expect("Endpoints should derive.")
}

pub fn refreshable_credentials() -> Credentials {
	Credentials::builder("snoo-broker-tests/0.1")
		.client_id("client-id")
		.client_secret("client-secret")
		.refresh_token("refresh-token")
		.build()
		.expect("Refreshable credentials should validate.")
}

pub fn bootstrap_credentials() -> Credentials {
	Credentials::builder("snoo-broker-tests/0.1")
		.access_token("bootstrap-token")
		.build()
		.expect("Bootstrap credentials should validate.")
}

pub fn client(
	credentials: Credentials,
	config: Config,
	transport: Arc<ScriptedTransport>,
) -> Client<ScriptedTransport> {
	snoo_broker::ClientBuilder::new(credentials)
		.config(config)
		.endpoints(endpoints())
		.build_with_transport(transport)
}
