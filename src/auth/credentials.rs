//! Caller-supplied credential set and its validating builder.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Credentials handed to a client at construction.
///
/// Either an access token is present, or all of `client_id`, `client_secret`, and
/// `refresh_token` are. The builder enforces this.
#[derive(Clone, Debug)]
pub struct Credentials {
	/// User agent sent with every request, including token exchanges.
	pub user_agent: String,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret; installed apps use an empty string.
	pub client_secret: Option<TokenSecret>,
	/// Long-lived refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Bootstrap access token.
	pub access_token: Option<TokenSecret>,
	/// Expiry of the bootstrap access token, when known.
	pub access_token_expiry: Option<OffsetDateTime>,
}
impl Credentials {
	/// Returns a builder seeded with the mandatory user agent.
	pub fn builder(user_agent: impl Into<String>) -> CredentialsBuilder {
		CredentialsBuilder::new(user_agent)
	}

	/// Returns `true` when the set can mint new access tokens on its own.
	pub fn can_refresh(&self) -> bool {
		self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
	}
}

/// Builder for [`Credentials`].
#[derive(Clone, Debug)]
pub struct CredentialsBuilder {
	user_agent: String,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	access_token: Option<TokenSecret>,
	access_token_expiry: Option<OffsetDateTime>,
}
impl CredentialsBuilder {
	fn new(user_agent: impl Into<String>) -> Self {
		Self {
			user_agent: user_agent.into(),
			client_id: None,
			client_secret: None,
			refresh_token: None,
			access_token: None,
			access_token_expiry: None,
		}
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, id: impl Into<String>) -> Self {
		self.client_id = Some(id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets a bootstrap access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the bootstrap access token's absolute expiry.
	pub fn access_token_expiry(mut self, instant: OffsetDateTime) -> Self {
		self.access_token_expiry = Some(instant);

		self
	}

	/// Validates the credential invariant and produces [`Credentials`].
	pub fn build(self) -> Result<Credentials, ConfigError> {
		if self.user_agent.trim().is_empty() {
			return Err(ConfigError::MissingUserAgent);
		}

		let credentials = Credentials {
			user_agent: self.user_agent,
			client_id: self.client_id,
			client_secret: self.client_secret,
			refresh_token: self.refresh_token,
			access_token: self.access_token,
			access_token_expiry: self.access_token_expiry,
		};

		if credentials.access_token.is_none() && !credentials.can_refresh() {
			return Err(ConfigError::IncompleteCredentials);
		}

		Ok(credentials)
	}
}
