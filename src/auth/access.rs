//! Live access token model.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Lifecycle status of an [`AccessToken`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is usable.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
	/// Expiry was never reported.
	Unknown,
}

/// The single live access token held by a client.
///
/// Tokens are replaced wholesale on refresh; nothing mutates a token in place except
/// [`AccessToken::mark_stale`], which only moves the expiry earlier.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer secret.
	pub secret: TokenSecret,
	/// Absolute expiry, when known.
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes granted with this token, as reported by the token endpoint.
	pub scopes: Vec<String>,
}
impl AccessToken {
	/// Wraps a bootstrap token with an optional expiry.
	pub fn new(secret: TokenSecret, expires_at: Option<OffsetDateTime>) -> Self {
		Self { secret, expires_at, scopes: Vec::new() }
	}

	/// Builds a token whose expiry is `expires_in` after `issued_at`.
	pub fn issued(
		secret: TokenSecret,
		issued_at: OffsetDateTime,
		expires_in: Duration,
		scopes: Vec<String>,
	) -> Self {
		Self { secret, expires_at: Some(issued_at + expires_in), scopes }
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match self.expires_at {
			None => TokenStatus::Unknown,
			Some(expiry) if instant >= expiry => TokenStatus::Expired,
			Some(_) => TokenStatus::Active,
		}
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Forces the token to read as expired from `instant` on.
	pub(crate) fn mark_stale(&mut self, instant: OffsetDateTime) {
		self.expires_at = Some(instant);
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("scopes", &self.scopes)
			.finish()
	}
}
