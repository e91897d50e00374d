#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde::Deserialize;
use snoo_broker::{
	ClientBuilder, Config, Credentials, Endpoints, Error, Params, ReqwestSnooClient, Verb,
	url::Url,
};

const USER_AGENT: &str = "snoo-broker-tests/0.1 by u/example";
const BASIC_AUTH: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";
const TOKEN_BODY: &str =
	r#"{"access_token":"access-1","token_type":"bearer","expires_in":3600,"scope":"identity"}"#;

#[derive(Debug, Deserialize)]
struct Account {
	name: String,
	total_karma: i64,
}

fn build_client(server: &MockServer, config: Config) -> ReqwestSnooClient {
	let base = Url::parse(&server.url("/")).expect("Mock server URL should parse.");
	let credentials = Credentials::builder(USER_AGENT)
		.client_id("client-id")
		.client_secret("client-secret")
		.refresh_token("refresh-1")
		.build()
		.expect("Credentials should validate.");

	ClientBuilder::new(credentials)
		.config(config)
		.endpoints(
			Endpoints::from_bases(base.clone(), base).expect("Mock endpoints should derive."),
		)
		.build()
		.expect("Reqwest client should build.")
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/access_token").header("authorization", BASIC_AUTH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await
}

#[tokio::test]
async fn authenticated_dispatch_sends_bearer_and_tracks_quota() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/me")
				.query_param("raw_json", "1")
				.header("authorization", "bearer access-1")
				.header("user-agent", USER_AGENT);
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-remaining", "599.0")
				.header("x-ratelimit-used", "1")
				.header("x-ratelimit-reset", "420")
				.body(r#"{"name":"spez","total_karma":42}"#);
		})
		.await;
	let client = build_client(&server, Config::default());
	let account = client
		.dispatch_as::<Account>(Verb::Get, "/api/v1/me", Params::new())
		.await
		.expect("Typed dispatch should succeed.");

	assert_eq!(account.name, "spez");
	assert_eq!(account.total_karma, 42);

	client.get("/api/v1/me", Params::new()).await.expect("Second dispatch should succeed.");

	token.assert_async().await;
	assert_eq!(me.hits_async().await, 2);

	let quota = client.rate_limit();

	assert_eq!(quota.remaining, Some(599.0));
	assert_eq!(quota.used, Some(1));
	assert!(!quota.is_exhausted());
}

#[tokio::test]
async fn form_posts_surface_application_errors() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let comment = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/comment")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				r#"{"json":{"errors":[["THREAD_LOCKED","that thread is locked",null]]}}"#,
			);
		})
		.await;
	let client = build_client(&server, Config::default());
	let err = client
		.post("/api/comment", Params::new().form("thing_id", "t3_abc").form("text", "hi"))
		.await
		.expect_err("Embedded error envelope should surface.");

	comment.assert_async().await;

	let Error::Application(app) = err else {
		panic!("Expected an application error, got {err:?}.");
	};

	assert_eq!(app.errors[0].code, "THREAD_LOCKED");
	assert_eq!(app.errors[0].field, None);
	assert_eq!(app.payload["json"]["errors"][0][1], "that thread is locked");
}

#[tokio::test]
async fn non_json_bodies_are_malformed_and_not_retried() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let page = server
		.mock_async(|when, then| {
			when.method(GET).path("/r/rust/about");
			then.status(200).header("content-type", "text/html").body("<html>maintenance</html>");
		})
		.await;
	let client = build_client(&server, Config::default());
	let err = client
		.get("/r/rust/about", Params::new())
		.await
		.expect_err("HTML body should be rejected.");

	assert!(matches!(err, Error::MalformedResponse { status: 200, .. }));
	assert_eq!(page.hits_async().await, 1);
}

#[tokio::test]
async fn retryable_statuses_are_retried_over_http() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let hot = server
		.mock_async(|when, then| {
			when.method(GET).path("/hot");
			then.status(503).body("");
		})
		.await;
	let client = build_client(
		&server,
		Config::default().with_retry_error_codes([503]).with_max_retry_attempts(2),
	);
	let err = client.get("/hot", Params::new()).await.expect_err("503 should outlast retries.");

	assert!(matches!(err, Error::TransientUpstream { status: 503, attempts: 3 }));
	assert_eq!(hot.hits_async().await, 3);
	assert_eq!(client.metrics().retries(), 2);
	assert_eq!(client.metrics().requests(), 3);
}

#[tokio::test]
async fn rejected_refresh_token_is_an_authentication_error() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/access_token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;
	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let client = build_client(&server, Config::default());
	let err = client
		.get("/api/v1/me", Params::new())
		.await
		.expect_err("Rejected refresh token should fail the dispatch.");

	assert!(matches!(err, Error::Authentication { .. }));
	assert_eq!(token.hits_async().await, 1);
	assert_eq!(me.hits_async().await, 0);
}

#[tokio::test]
async fn unauthenticated_dispatch_skips_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let available = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/username_available.json").query_param("user", "spez");
			then.status(200).header("content-type", "application/json").body("false");
		})
		.await;
	let client = build_client(&server, Config::default());
	let body = client
		.dispatch_unauthenticated(
			Verb::Get,
			"/api/username_available.json",
			Params::new().query("user", "spez"),
		)
		.await
		.expect("Unauthenticated dispatch should succeed.");

	assert_eq!(body, serde_json::Value::Bool(false));
	assert_eq!(available.hits_async().await, 1);
	assert_eq!(token.hits_async().await, 0);
}

#[tokio::test]
async fn revocation_posts_hint_with_basic_auth() {
	let server = MockServer::start_async().await;
	let revoke = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/revoke_token")
				.header("authorization", BASIC_AUTH)
				.header("user-agent", USER_AGENT);
			then.status(204);
		})
		.await;
	let client = build_client(&server, Config::default());

	client.revoke_refresh_token().await.expect("Revocation should succeed.");

	revoke.assert_async().await;

	let snapshot = client.credentials();

	assert!(!snapshot.has_refresh_token);
	assert!(!snapshot.has_access_token);
}
