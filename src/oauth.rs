//! Token endpoint facade: refresh exchanges through the `oauth2` client and revocations.
//!
//! Both run over the pipeline's [`Transport`] so tests and custom HTTP stacks see every
//! token-endpoint call, but neither passes through the throttle gate: the token endpoint
//! does not count against the API quota.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSecret},
	error::{ConfigError, TransportError},
	http::{self, HttpRequest, Params, Transport, TransportFuture, Verb},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeRequestError = RequestTokenError<TransportError, BasicErrorResponse>;

/// Which token a revocation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTypeHint {
	/// Short-lived bearer token.
	AccessToken,
	/// Long-lived refresh token; revoking it also invalidates its access tokens.
	RefreshToken,
}
impl TokenTypeHint {
	/// Returns the `token_type_hint` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenTypeHint::AccessToken => "access_token",
			TokenTypeHint::RefreshToken => "refresh_token",
		}
	}
}

/// Client credentials used to authenticate against the token and revocation endpoints.
#[derive(Clone, Debug)]
pub(crate) struct ClientAuth {
	pub(crate) client_id: String,
	pub(crate) client_secret: TokenSecret,
}
impl ClientAuth {
	fn basic_header(&self) -> String {
		let raw = format!("{}:{}", self.client_id, self.client_secret.expose());

		format!("Basic {}", BASE64.encode(raw))
	}
}

/// Result of a successful refresh exchange.
#[derive(Debug)]
pub(crate) struct TokenGrant {
	pub(crate) access: AccessToken,
	/// Present when the endpoint rotated the refresh token.
	pub(crate) rotated_refresh: Option<TokenSecret>,
}

/// Captures the status of the most recent token-endpoint response for error mapping.
#[derive(Clone, Debug, Default)]
struct ResponseStatusSlot(Arc<Mutex<Option<u16>>>);
impl ResponseStatusSlot {
	fn store(&self, status: u16) {
		*self.0.lock() = Some(status);
	}

	fn take(&self) -> Option<u16> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter that lets the `oauth2` client drive a pipeline [`Transport`].
struct TransportHandle<'t, T>
where
	T: ?Sized + Transport,
{
	transport: &'t T,
	user_agent: &'t str,
	slot: ResponseStatusSlot,
}
impl<'c, T> AsyncHttpClient<'c> for TransportHandle<'_, T>
where
	T: ?Sized + Transport,
{
	type Error = TransportError;
	type Future = TransportFuture<'c>;

	fn call(&'c self, mut request: HttpRequest) -> Self::Future {
		http::ensure_user_agent(&mut request, self.user_agent);

		Box::pin(async move {
			self.slot.take();

			let response = self.transport.execute(request).await?;

			self.slot.store(response.status().as_u16());

			Ok(response)
		})
	}
}

/// Exchanges `refresh_token` for a new access token at `token_url`.
pub(crate) async fn exchange_refresh_token<T>(
	transport: &T,
	user_agent: &str,
	token_url: &Url,
	auth: &ClientAuth,
	refresh_token: &TokenSecret,
) -> Result<TokenGrant>
where
	T: ?Sized + Transport,
{
	let client: ConfiguredBasicClient = BasicClient::new(ClientId::new(auth.client_id.clone()))
		.set_client_secret(ClientSecret::new(auth.client_secret.expose().to_owned()))
		.set_token_uri(TokenUrl::from_url(token_url.clone()));
	let handle = TransportHandle { transport, user_agent, slot: ResponseStatusSlot::default() };
	let secret = RefreshToken::new(refresh_token.expose().to_owned());
	let response = client
		.exchange_refresh_token(&secret)
		.request_async(&handle)
		.await
		.map_err(|err| map_request_error(handle.slot.take(), err))?;

	map_token_response(response)
}

/// Revokes `token` at `revocation_url`. Any 2xx answer counts as success.
pub(crate) async fn revoke_token<T>(
	transport: &T,
	user_agent: &str,
	revocation_url: &Url,
	auth: &ClientAuth,
	token: &TokenSecret,
	hint: TokenTypeHint,
) -> Result<()>
where
	T: ?Sized + Transport,
{
	let params =
		Params::new().form("token", token.expose()).form("token_type_hint", hint.as_str());
	let request = http::build_request(
		Verb::Post,
		revocation_url.clone(),
		&params,
		user_agent,
		Some(auth.basic_header()),
	)?;
	let response = transport.execute(request).await?;
	let status = response.status();

	if status.is_success() {
		return Ok(());
	}
	if status.as_u16() == 401 {
		return Err(Error::Authentication {
			reason: "Revocation endpoint rejected the client credentials".into(),
		});
	}

	Err(Error::HttpStatus {
		status: status.as_u16(),
		message: status.canonical_reason().unwrap_or("unexpected status").into(),
	})
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;
	let scopes = response
		.scopes()
		.map(|scopes| scopes.iter().map(|scope| scope.to_string()).collect())
		.unwrap_or_default();
	let access = AccessToken::issued(
		TokenSecret::new(response.access_token().secret().to_owned()),
		OffsetDateTime::now_utc(),
		Duration::seconds(expires_in),
		scopes,
	);
	let rotated_refresh =
		response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned()));

	Ok(TokenGrant { access, rotated_refresh })
}

fn map_request_error(status: Option<u16>, err: FacadeRequestError) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) => error.into(),
		RequestTokenError::Parse(source, body) => {
			if let Some(reason) = embedded_error(&body) {
				return Error::Authentication {
					reason: format!("Token endpoint returned an OAuth error: {reason}"),
				};
			}

			match status {
				Some(code) if !(200..300).contains(&code) => Error::Authentication {
					reason: format!("Token endpoint returned status {code}"),
				},
				code => Error::MalformedResponse { source, status: code.unwrap_or(200) },
			}
		},
		RequestTokenError::Other(message) => Error::Authentication {
			reason: format!("Token endpoint returned an unexpected response: {message}"),
		},
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> Error {
	let reason = match response.error_description() {
		Some(description) => format!("Token endpoint returned an OAuth error: {description}"),
		None => format!("Token endpoint returned an OAuth error: {}", response.error().as_ref()),
	};

	match response.error() {
		BasicErrorResponseType::InvalidScope => Error::InsufficientScope { reason },
		_ => Error::Authentication { reason },
	}
}

/// Reads the `error` member of a token-endpoint body that parsed as JSON but not as a token.
fn embedded_error(body: &[u8]) -> Option<String> {
	let value: Value = serde_json::from_slice(body).ok()?;

	match value.get("error")? {
		Value::String(s) => Some(s.clone()),
		other => Some(other.to_string()),
	}
}
