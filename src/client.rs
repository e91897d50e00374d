//! Public client facade over the request pipeline.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	config::{Config, Endpoints},
	http::{Params, Transport, Verb},
	obs::{PipelineMetrics, TracingWarnings, WarningSink},
	pipeline::{self, CredentialSnapshot, CredentialState, Dispatcher, RateLimitSnapshot},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestSnooClient = Client<ReqwestTransport>;

/// Authenticated API client.
///
/// Clones share one credential state, rate-limit tracker, throttle gate, and configuration, so
/// every clone observes the same quota and queues behind the same gate. Higher layers build
/// paths and parameters and call [`Client::dispatch`]; token refreshes, spacing, quota waits,
/// and retries happen underneath.
pub struct Client<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	dispatcher: Arc<Dispatcher>,
}
impl<T> Client<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client that sends every request through `transport`.
	pub fn with_transport(credentials: Credentials, config: Config, transport: Arc<T>) -> Self {
		ClientBuilder::new(credentials).config(config).build_with_transport(transport)
	}

	/// Runs an authenticated request against the OAuth host and returns the parsed body.
	pub async fn dispatch(&self, verb: Verb, path: &str, params: Params) -> Result<Value> {
		Ok(self.dispatcher.dispatch(&*self.transport, verb, path, &params, true).await?.body)
	}

	/// Runs an authenticated request and deserializes the body into `D`.
	pub async fn dispatch_as<D>(&self, verb: Verb, path: &str, params: Params) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let response = self.dispatcher.dispatch(&*self.transport, verb, path, &params, true).await?;

		pipeline::decode_as(response)
	}

	/// Runs a request against the public host without a bearer token.
	///
	/// The request still passes through the throttle gate and updates the rate-limit tracker.
	pub async fn dispatch_unauthenticated(
		&self,
		verb: Verb,
		path: &str,
		params: Params,
	) -> Result<Value> {
		Ok(self.dispatcher.dispatch(&*self.transport, verb, path, &params, false).await?.body)
	}

	/// Shorthand for [`Client::dispatch`] with [`Verb::Get`].
	pub async fn get(&self, path: &str, params: Params) -> Result<Value> {
		self.dispatch(Verb::Get, path, params).await
	}

	/// Shorthand for [`Client::dispatch`] with [`Verb::Post`].
	pub async fn post(&self, path: &str, params: Params) -> Result<Value> {
		self.dispatch(Verb::Post, path, params).await
	}

	/// Shorthand for [`Client::dispatch`] with [`Verb::Patch`].
	pub async fn patch(&self, path: &str, params: Params) -> Result<Value> {
		self.dispatch(Verb::Patch, path, params).await
	}

	/// Shorthand for [`Client::dispatch`] with [`Verb::Put`].
	pub async fn put(&self, path: &str, params: Params) -> Result<Value> {
		self.dispatch(Verb::Put, path, params).await
	}

	/// Shorthand for [`Client::dispatch`] with [`Verb::Delete`].
	pub async fn delete(&self, path: &str, params: Params) -> Result<Value> {
		self.dispatch(Verb::Delete, path, params).await
	}

	/// Current configuration snapshot.
	pub fn config(&self) -> Arc<Config> {
		self.dispatcher.config()
	}

	/// Replaces the configuration for subsequent attempts.
	///
	/// The transport timeout is fixed when the transport is built and is not affected.
	pub fn set_config(&self, config: Config) {
		self.dispatcher.set_config(config);
	}

	/// Edits the configuration in place for subsequent attempts.
	pub fn update_config<F>(&self, f: F)
	where
		F: FnOnce(&mut Config),
	{
		self.dispatcher.update_config(f);
	}

	/// Emits a warning through the client's sink unless warnings are suppressed.
	pub fn warn(&self, message: &str) {
		self.dispatcher.warn(message);
	}

	/// Returns a usable access token, refreshing first when needed.
	pub async fn ensure_valid_token(&self) -> Result<TokenSecret> {
		let endpoints = self.dispatcher.endpoints(&self.config())?;

		self.dispatcher.credentials.ensure_valid_token(&*self.transport, &endpoints).await
	}

	/// Exchanges the refresh token for a new access token right away.
	pub async fn refresh_access_token(&self) -> Result<()> {
		let endpoints = self.dispatcher.endpoints(&self.config())?;

		self.dispatcher.credentials.refresh(&*self.transport, &endpoints).await?;

		Ok(())
	}

	/// Revokes the access token. The refresh token, if any, stays usable.
	pub async fn revoke_access_token(&self) -> Result<()> {
		let endpoints = self.dispatcher.endpoints(&self.config())?;

		self.dispatcher.credentials.revoke_access_token(&*self.transport, &endpoints).await
	}

	/// Revokes the refresh token, which also discards the access token.
	pub async fn revoke_refresh_token(&self) -> Result<()> {
		let endpoints = self.dispatcher.endpoints(&self.config())?;

		self.dispatcher.credentials.revoke_refresh_token(&*self.transport, &endpoints).await
	}

	/// Read-only view of the held tokens.
	pub fn credentials(&self) -> CredentialSnapshot {
		self.dispatcher.credentials.snapshot()
	}

	/// Read-only view of the most recently observed quota.
	pub fn rate_limit(&self) -> RateLimitSnapshot {
		self.dispatcher.tracker.snapshot()
	}

	/// Pipeline counters shared by every clone of this client.
	pub fn metrics(&self) -> &PipelineMetrics {
		self.dispatcher.metrics()
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Creates a client backed by a reqwest transport honoring `config.request_timeout`.
	pub fn new(credentials: Credentials, config: Config) -> Result<Self> {
		ClientBuilder::new(credentials).config(config).build()
	}
}
impl<T> Clone for Client<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), dispatcher: self.dispatcher.clone() }
	}
}
impl<T> Debug for Client<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client").field("dispatcher", &self.dispatcher).finish()
	}
}

/// Builder for [`Client`].
pub struct ClientBuilder {
	credentials: Credentials,
	config: Config,
	endpoints: Option<Endpoints>,
	warnings: Arc<dyn WarningSink>,
}
impl ClientBuilder {
	/// Starts a builder with default configuration and the `tracing` warning sink.
	pub fn new(credentials: Credentials) -> Self {
		Self {
			credentials,
			config: Config::default(),
			endpoints: None,
			warnings: Arc::new(TracingWarnings),
		}
	}

	/// Sets the initial configuration.
	pub fn config(mut self, config: Config) -> Self {
		self.config = config;

		self
	}

	/// Pins every request to explicit endpoints instead of deriving them from the domain.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = Some(endpoints);

		self
	}

	/// Routes warnings to `sink` instead of `tracing`.
	pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
		self.warnings = sink;

		self
	}

	/// Builds a client over a caller-provided transport.
	pub fn build_with_transport<T>(self, transport: Arc<T>) -> Client<T>
	where
		T: ?Sized + Transport,
	{
		let metrics = Arc::new(PipelineMetrics::default());
		let credentials = CredentialState::new(self.credentials, metrics.clone());
		let mut dispatcher = Dispatcher::new(credentials, self.config, metrics, self.warnings);

		if let Some(endpoints) = self.endpoints {
			dispatcher = dispatcher.with_endpoints(endpoints);
		}

		Client { transport, dispatcher: Arc::new(dispatcher) }
	}

	/// Builds a client backed by a reqwest transport honoring the configured timeout.
	#[cfg(feature = "reqwest")]
	pub fn build(self) -> Result<Client<ReqwestTransport>> {
		let transport = ReqwestTransport::with_timeout(self.config.request_timeout)?;

		Ok(self.build_with_transport(Arc::new(transport)))
	}
}
impl Debug for ClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("credentials", &self.credentials)
			.field("config", &self.config)
			.field("endpoints", &self.endpoints)
			.finish()
	}
}
