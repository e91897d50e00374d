//! Demonstrates plugging a custom [`Transport`] into the request pipeline.
//!
//! 1. Wrap [`ReqwestTransport`] in a type implementing [`Transport`]; here it logs every exchange
//!    with its latency and status, including token refreshes.
//! 2. Hand the transport to [`ClientBuilder::build_with_transport`].
//! 3. Dispatch API calls; the pipeline refreshes, throttles, and retries through your transport.
//!
//! Reads `SNOO_USER_AGENT`, `SNOO_CLIENT_ID`, `SNOO_CLIENT_SECRET`, and `SNOO_REFRESH_TOKEN`.

// std
use std::{
	env,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant},
};
// crates.io
use color_eyre::Result;
// self
use snoo_broker::{
	ClientBuilder, Config, Credentials, Params,
	error::TransportError,
	http::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportFuture},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let credentials = Credentials::builder(env::var("SNOO_USER_AGENT")?)
		.client_id(env::var("SNOO_CLIENT_ID")?)
		.client_secret(env::var("SNOO_CLIENT_SECRET")?)
		.refresh_token(env::var("SNOO_REFRESH_TOKEN")?)
		.build()?;
	let config = Config::default()
		.with_request_delay(Duration::from_millis(500))
		.with_max_retry_attempts(2);
	let transport =
		Arc::new(LoggingTransport::new(ReqwestTransport::with_timeout(config.request_timeout)?));
	let client =
		ClientBuilder::new(credentials).config(config).build_with_transport(transport.clone());
	let me = client.get("/api/v1/me", Params::new()).await?;

	println!("Authenticated as {}.", me["name"].as_str().unwrap_or("<unknown>"));

	let hot = client.get("/r/rust/hot", Params::new().query("limit", "5")).await?;

	for post in hot["data"]["children"].as_array().into_iter().flatten() {
		println!("- {}", post["data"]["title"].as_str().unwrap_or_default());
	}

	let quota = client.rate_limit();

	println!(
		"Transport handled {} exchanges; {} API attempts, {} retries, {:?} requests left in the window.",
		transport.calls(),
		client.metrics().requests(),
		client.metrics().retries(),
		quota.remaining,
	);

	Ok(())
}

struct LoggingTransport {
	inner: ReqwestTransport,
	calls: AtomicU64,
}
impl LoggingTransport {
	fn new(inner: ReqwestTransport) -> Self {
		Self { inner, calls: AtomicU64::new(0) }
	}

	fn calls(&self) -> u64 {
		self.calls.load(Ordering::Relaxed)
	}
}
impl Transport for LoggingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
			let line = format!("#{call} {} {}", request.method(), request.uri().path());
			let started = Instant::now();
			let result: Result<HttpResponse, TransportError> = self.inner.execute(request).await;

			match &result {
				Ok(response) =>
					println!("{line} -> {} in {:?}.", response.status(), started.elapsed()),
				Err(e) => println!("{line} failed after {:?}: {e}.", started.elapsed()),
			}

			result
		})
	}
}
