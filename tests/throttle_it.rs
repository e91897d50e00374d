mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use snoo_broker::{Config, Error, Params, obs::CollectedWarnings};
use tokio::time::Instant;
// self
use common::{Reply, ScriptedTransport};

#[tokio::test(start_paused = true)]
async fn concurrent_dispatches_are_spaced_by_request_delay() {
	let transport = Arc::new(ScriptedTransport::new());
	let client = common::client(
		common::bootstrap_credentials(),
		Config::default().with_request_delay(Duration::from_millis(200)),
		transport.clone(),
	);
	let handles = (0..5)
		.map(|idx| {
			let client = client.clone();

			tokio::spawn(async move { client.get(&format!("/r/test/{idx}"), Params::new()).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		handle.await.expect("Dispatch task should not panic.").expect("Dispatch should succeed.");
	}

	let calls = transport.api_calls();

	assert_eq!(calls.len(), 5);

	for pair in calls.windows(2) {
		assert!(
			pair[1].at - pair[0].at >= Duration::from_millis(200),
			"Admissions should be at least request_delay apart."
		);
	}
}

#[tokio::test(start_paused = true)]
async fn late_arrival_waits_out_the_remaining_delay() {
	let transport = Arc::new(ScriptedTransport::new());
	let client = common::client(
		common::bootstrap_credentials(),
		Config::default().with_request_delay(Duration::from_millis(100)),
		transport.clone(),
	);
	let start = Instant::now();

	client.get("/first", Params::new()).await.expect("First dispatch should succeed.");
	tokio::time::sleep_until(start + Duration::from_millis(10)).await;
	client.get("/second", Params::new()).await.expect("Second dispatch should succeed.");

	let calls = transport.api_calls();

	assert_eq!(calls[0].at, start);
	assert!(calls[1].at >= start + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_fails_fast_without_a_network_call() {
	let transport = Arc::new(ScriptedTransport::new());
	let client =
		common::client(common::bootstrap_credentials(), Config::default(), transport.clone());

	transport.push_api(
		Reply::ok().header("x-ratelimit-remaining", "0").header("x-ratelimit-reset", "60"),
	);
	client.get("/spend", Params::new()).await.expect("Quota-spending dispatch should succeed.");

	assert!(client.rate_limit().is_exhausted());

	let err = client
		.get("/blocked", Params::new())
		.await
		.expect_err("Dispatch with an exhausted quota should fail.");

	assert!(
		matches!(err, Error::RateLimitExceeded { reset_in } if reset_in == Duration::from_secs(60))
	);
	assert_eq!(transport.api_calls().len(), 1);
	assert_eq!(client.metrics().ratelimit_rejections(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_reset_header_is_ignored() {
	let transport = Arc::new(ScriptedTransport::new());
	let client =
		common::client(common::bootstrap_credentials(), Config::default(), transport.clone());

	transport
		.push_api(Reply::ok().header("x-ratelimit-remaining", "10").header("x-ratelimit-reset", "1e30"));
	client.get("/spend", Params::new()).await.expect("Oversized reset should not fail dispatch.");

	let quota = client.rate_limit();

	assert_eq!(quota.remaining, Some(10.0));
	assert_eq!(quota.window_reset_at, None);

	client.get("/next", Params::new()).await.expect("Follow-up dispatch should succeed.");

	assert_eq!(transport.api_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_rejection_follows_the_token_refresh() {
	let transport = Arc::new(ScriptedTransport::new());
	let client =
		common::client(common::refreshable_credentials(), Config::default(), transport.clone());

	transport.push_api(
		Reply::json(401, r#"{"message":"Unauthorized","error":401}"#)
			.header("x-ratelimit-remaining", "0")
			.header("x-ratelimit-reset", "60"),
	);

	let err = client.get("/spend", Params::new()).await.expect_err("401 should surface.");

	assert!(matches!(err, Error::Authentication { .. }));
	assert!(client.rate_limit().is_exhausted());

	let err = client
		.get("/blocked", Params::new())
		.await
		.expect_err("Dispatch with an exhausted quota should fail.");

	assert!(matches!(err, Error::RateLimitExceeded { .. }));
	assert_eq!(transport.token_calls(), 2);
	assert_eq!(transport.api_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_waits_for_reset_and_keeps_arrival_order() {
	let transport = Arc::new(ScriptedTransport::new());
	let warnings = Arc::new(CollectedWarnings::default());
	let client = snoo_broker::ClientBuilder::new(common::bootstrap_credentials())
		.config(Config::default().with_continue_after_ratelimit_error(true))
		.endpoints(common::endpoints())
		.warning_sink(warnings.clone())
		.build_with_transport(transport.clone());
	let start = Instant::now();

	transport.push_api(
		Reply::ok()
			.header("x-ratelimit-remaining", "0")
			.header("x-ratelimit-used", "600")
			.header("x-ratelimit-reset", "5"),
	);
	client.get("/spend", Params::new()).await.expect("Quota-spending dispatch should succeed.");

	let mut handles = Vec::new();

	for path in ["/a", "/b", "/c"] {
		let client = client.clone();

		handles.push(tokio::spawn(async move { client.get(path, Params::new()).await }));

		for _ in 0..3 {
			tokio::task::yield_now().await;
		}
	}
	for handle in handles {
		handle.await.expect("Dispatch task should not panic.").expect("Dispatch should succeed.");
	}

	let calls = transport.api_calls();
	let paths = calls.iter().map(|call| call.path.as_str()).collect::<Vec<_>>();

	assert_eq!(paths, ["/spend", "/a", "/b", "/c"]);
	assert!(calls[1].at >= start + Duration::from_secs(5));
	assert_eq!(client.metrics().ratelimit_waits(), 1);
	assert_eq!(warnings.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unauthenticated_requests_share_the_gate() {
	let transport = Arc::new(ScriptedTransport::new());
	let client = common::client(
		common::refreshable_credentials(),
		Config::default().with_request_delay(Duration::from_millis(50)),
		transport.clone(),
	);

	client
		.dispatch_unauthenticated(snoo_broker::Verb::Get, "/api/username_available.json", Params::new())
		.await
		.expect("Unauthenticated dispatch should succeed.");
	client
		.dispatch_unauthenticated(snoo_broker::Verb::Get, "/api/username_available.json", Params::new())
		.await
		.expect("Unauthenticated dispatch should succeed.");

	let calls = transport.api_calls();

	assert_eq!(transport.token_calls(), 0);
	assert!(calls.iter().all(|call| call.authorization.is_none()));
	assert!(calls[1].at - calls[0].at >= Duration::from_millis(50));
}
