//! Credential state with single-flight refresh and cascading revocation.
//!
//! The state owns the one live access token of a client. [`CredentialState::ensure_valid_token`]
//! returns straight away when the token is usable; otherwise callers queue on a
//! single-flight guard. The first caller through performs the exchange and bumps a generation
//! counter; callers that were waiting observe the bumped generation and reuse the leader's
//! outcome (token or failure) instead of starting another exchange.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials, TokenSecret, TokenStatus},
	config::Endpoints,
	error::ConfigError,
	http::Transport,
	oauth::{self, ClientAuth, TokenTypeHint},
	obs::{self, Outcome, PipelineMetrics, RequestKind, RequestSpan},
};

/// Read-only view of the credential state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialSnapshot {
	/// Whether an access token is held.
	pub has_access_token: bool,
	/// Whether a refresh token is held.
	pub has_refresh_token: bool,
	/// Expiry of the held access token, when known.
	pub access_token_expiry: Option<OffsetDateTime>,
	/// Scopes granted with the held access token.
	pub scopes: Vec<String>,
}

/// Owner of the client's access and refresh tokens.
pub struct CredentialState {
	user_agent: String,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	refresh_token: RwLock<Option<TokenSecret>>,
	access: RwLock<Option<AccessToken>>,
	refresh_flight: AsyncMutex<()>,
	generation: AtomicU64,
	last_failure: Mutex<Option<String>>,
	metrics: Arc<PipelineMetrics>,
}
impl CredentialState {
	/// Takes ownership of validated credentials.
	pub fn new(credentials: Credentials, metrics: Arc<PipelineMetrics>) -> Self {
		let access = credentials
			.access_token
			.map(|secret| AccessToken::new(secret, credentials.access_token_expiry));

		Self {
			user_agent: credentials.user_agent,
			client_id: credentials.client_id,
			client_secret: credentials.client_secret,
			refresh_token: RwLock::new(credentials.refresh_token),
			access: RwLock::new(access),
			refresh_flight: AsyncMutex::new(()),
			generation: AtomicU64::new(0),
			last_failure: Mutex::new(None),
			metrics,
		}
	}

	/// User agent sent with every request.
	pub fn user_agent(&self) -> &str {
		&self.user_agent
	}

	/// Returns a read-only view of the held tokens.
	pub fn snapshot(&self) -> CredentialSnapshot {
		let access = self.access.read();

		CredentialSnapshot {
			has_access_token: access.is_some(),
			has_refresh_token: self.refresh_token.read().is_some(),
			access_token_expiry: access.as_ref().and_then(|token| token.expires_at),
			scopes: access.as_ref().map(|token| token.scopes.clone()).unwrap_or_default(),
		}
	}

	/// Returns a usable access token, refreshing first when needed.
	pub async fn ensure_valid_token<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<TokenSecret>
	where
		T: ?Sized + Transport,
	{
		if let Some(secret) = self.usable_token(OffsetDateTime::now_utc()) {
			return Ok(secret);
		}

		let observed = self.generation.load(Ordering::Acquire);
		let _flight = self.refresh_flight.lock().await;

		if self.generation.load(Ordering::Acquire) != observed {
			if let Some(secret) = self.usable_token(OffsetDateTime::now_utc()) {
				return Ok(secret);
			}
			if let Some(reason) = self.last_failure.lock().clone() {
				return Err(Error::Authentication { reason });
			}
		}
		if let Some(secret) = self.usable_token(OffsetDateTime::now_utc()) {
			return Ok(secret);
		}

		self.refresh_locked(transport, endpoints).await
	}

	/// Forces a refresh exchange, sharing it with any concurrent callers.
	pub async fn refresh<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<TokenSecret>
	where
		T: ?Sized + Transport,
	{
		let observed = self.generation.load(Ordering::Acquire);
		let _flight = self.refresh_flight.lock().await;

		if self.generation.load(Ordering::Acquire) != observed {
			if let Some(secret) = self.usable_token(OffsetDateTime::now_utc()) {
				return Ok(secret);
			}
		}

		self.refresh_locked(transport, endpoints).await
	}

	/// Revokes the access token; the refresh token, if any, stays usable.
	///
	/// A refresh that lands while the revocation is in flight installs a token that was never
	/// revoked; that token is kept.
	pub async fn revoke_access_token<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<()>
	where
		T: ?Sized + Transport,
	{
		let token = self
			.access
			.read()
			.as_ref()
			.map(|token| token.secret.clone())
			.ok_or(ConfigError::MissingAccessToken)?;

		self.revoke(transport, endpoints, &token, TokenTypeHint::AccessToken).await?;

		let _flight = self.refresh_flight.lock().await;
		let mut access = self.access.write();

		if access.as_ref().is_some_and(|held| held.secret == token) {
			*access = None;
		}

		Ok(())
	}

	/// Revokes the refresh token, which also invalidates the access token.
	pub async fn revoke_refresh_token<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<()>
	where
		T: ?Sized + Transport,
	{
		let token = self.refresh_token.read().clone().ok_or(ConfigError::MissingRefreshToken)?;

		self.revoke(transport, endpoints, &token, TokenTypeHint::RefreshToken).await?;

		let _flight = self.refresh_flight.lock().await;

		*self.refresh_token.write() = None;
		*self.access.write() = None;

		Ok(())
	}

	/// Makes the held access token read as expired so the next call refreshes it.
	///
	/// Only tokens that can actually be refreshed are marked; a bootstrap token without refresh
	/// credentials is left alone.
	pub(crate) fn mark_access_stale(&self, rejected: &TokenSecret) {
		if !self.can_refresh() {
			return;
		}

		let mut access = self.access.write();

		if let Some(token) = access.as_mut().filter(|token| token.secret == *rejected) {
			token.mark_stale(OffsetDateTime::now_utc());
		}
	}

	fn can_refresh(&self) -> bool {
		self.client_auth().is_some() && self.refresh_token.read().is_some()
	}

	fn client_auth(&self) -> Option<ClientAuth> {
		Some(ClientAuth {
			client_id: self.client_id.clone()?,
			client_secret: self.client_secret.clone()?,
		})
	}

	fn usable_token(&self, now: OffsetDateTime) -> Option<TokenSecret> {
		let access = self.access.read();
		let token = access.as_ref()?;

		match token.status_at(now) {
			TokenStatus::Active => Some(token.secret.clone()),
			TokenStatus::Expired => None,
			// Use as is unless a lazy refresh can pin the expiry down.
			TokenStatus::Unknown if self.can_refresh() => None,
			TokenStatus::Unknown => Some(token.secret.clone()),
		}
	}

	async fn refresh_locked<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<TokenSecret>
	where
		T: ?Sized + Transport,
	{
		const KIND: RequestKind = RequestKind::Refresh;

		let span = RequestSpan::new(KIND, "refresh_access_token");

		obs::record_outcome(KIND, Outcome::Attempt);

		let result = span.instrument(self.exchange(transport, endpoints)).await;

		match &result {
			Ok(grant) => {
				*self.last_failure.lock() = None;

				if let Some(rotated) = grant.rotated_refresh.clone() {
					*self.refresh_token.write() = Some(rotated);
				}

				*self.access.write() = Some(grant.access.clone());

				obs::record_outcome(KIND, Outcome::Success);
			},
			Err(err) => {
				*self.last_failure.lock() = Some(err.to_string());

				self.metrics.record_refresh_failure();
				obs::record_outcome(KIND, Outcome::Failure);
			},
		}

		self.generation.fetch_add(1, Ordering::AcqRel);

		result.map(|grant| grant.access.secret)
	}

	async fn exchange<T>(&self, transport: &T, endpoints: &Endpoints) -> Result<oauth::TokenGrant>
	where
		T: ?Sized + Transport,
	{
		let refresh_token = self.refresh_token.read().clone();
		let (auth, refresh_token) = match (self.client_auth(), refresh_token) {
			(Some(auth), Some(token)) => (auth, token),
			(_, None) if self.access.read().is_none() => {
				return Err(Error::Authentication {
					reason: "No access token is held and no refresh token is available; the credentials may have been revoked".into(),
				});
			},
			_ => {
				return Err(Error::Authentication {
					reason: "The access token has expired and cannot be refreshed without a client id, client secret, and refresh token".into(),
				});
			},
		};

		self.metrics.record_refresh();

		oauth::exchange_refresh_token(
			transport,
			&self.user_agent,
			&endpoints.token,
			&auth,
			&refresh_token,
		)
		.await
	}

	async fn revoke<T>(
		&self,
		transport: &T,
		endpoints: &Endpoints,
		token: &TokenSecret,
		hint: TokenTypeHint,
	) -> Result<()>
	where
		T: ?Sized + Transport,
	{
		const KIND: RequestKind = RequestKind::Revoke;

		let auth = self.client_auth().ok_or(ConfigError::IncompleteCredentials)?;
		let span = RequestSpan::new(KIND, hint.as_str());

		obs::record_outcome(KIND, Outcome::Attempt);

		let result = span
			.instrument(oauth::revoke_token(
				transport,
				&self.user_agent,
				&endpoints.revocation,
				&auth,
				token,
				hint,
			))
			.await;

		obs::record_outcome(KIND, if result.is_ok() { Outcome::Success } else { Outcome::Failure });

		result
	}
}
impl Debug for CredentialState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialState")
			.field("user_agent", &self.user_agent)
			.field("client_id", &self.client_id)
			.field("snapshot", &self.snapshot())
			.finish()
	}
}
