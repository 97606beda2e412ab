// std
use std::net::TcpListener;
// crates.io
use httpmock::prelude::*;
use time::macros;
use tokio::task::JoinSet;
// self
use central_token::{
	_preludet::*,
	TokenCache,
	auth::LocalInstance,
	clock::ManualClock,
	error::GenericError,
	http::DEFAULT_TOKEN_PATH,
};

const ACCESS_KEY: &str = "K";
const START: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

fn build_cache(clock: &ManualClock) -> TokenCache {
	TokenCache::new(build_test_exchange(test_http_config())).with_clock(Arc::new(clock.clone()))
}

fn instance_for_port(port: u16) -> LocalInstance {
	LocalInstance::new(format!("http://{TEST_CENTRAL_HOST}:{port}/"), ACCESS_KEY)
}

fn token_body(token: &str, expires_in: i64) -> String {
	format!("{{\"accessToken\":\"{token}\",\"expiresIn\":{expires_in}}}")
}

#[tokio::test]
async fn cached_token_is_reused_until_expiry() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(token_body("T1", 60_000));
		})
		.await;
	let first = cache.acquire(&instance).await.expect("Initial acquire should succeed.");

	clock.advance(Duration::seconds(59));

	let second = cache.acquire(&instance).await.expect("Cached acquire should succeed.");

	assert_eq!(first.access_token.expose(), "T1");
	assert_eq!(second.access_token.expose(), "T1");
	assert_eq!(cache.expires_at(), Some(START + Duration::seconds(60)));
	assert_eq!(cache.metrics().exchanges(), 1);
	assert_eq!(cache.metrics().hits(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn expired_token_triggers_refresh() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mut first_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).body(token_body("T1", 60_000));
		})
		.await;
	let first = cache.acquire(&instance).await.expect("Initial acquire should succeed.");

	assert_eq!(first.access_token.expose(), "T1");

	first_mock.assert_calls_async(1).await;
	first_mock.delete_async().await;

	let second_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).body(token_body("T2", 60_000));
		})
		.await;

	clock.advance(Duration::seconds(60));

	let second = cache.acquire(&instance).await.expect("Refresh after expiry should succeed.");

	assert_eq!(second.access_token.expose(), "T2");
	assert_eq!(cache.expires_at(), Some(START + Duration::seconds(120)));

	second_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn zero_lifetime_token_is_refreshed_on_next_call() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).body(token_body("T0", 0));
		})
		.await;

	cache.acquire(&instance).await.expect("First acquire should succeed.");

	assert!(cache.peek().is_none());

	cache.acquire(&instance).await.expect("Second acquire should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn auth_denied_is_not_cached() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(401);
		})
		.await;
	let err = cache.acquire(&instance).await.expect_err("401 must fail the acquire.");

	assert!(err.is_auth_denied());
	assert!(cache.peek().is_none());
	assert!(cache.expires_at().is_none());

	let err = cache.acquire(&instance).await.expect_err("401 must fail the retry as well.");

	assert!(err.is_auth_denied());
	assert_eq!(cache.metrics().failures(), 2);

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failed_refresh_drops_the_previous_token() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mut ok_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).body(token_body("T1", 1_000));
		})
		.await;

	cache.acquire(&instance).await.expect("Initial acquire should succeed.");
	ok_mock.delete_async().await;

	let failing_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(503);
		})
		.await;

	clock.advance(Duration::seconds(1));

	let err = cache.acquire(&instance).await.expect_err("503 must fail the refresh.");

	assert!(matches!(err, Error::Generic(GenericError::UnexpectedStatus { status: 503, .. })));
	assert!(cache.expires_at().is_none());

	// Rewinding the clock must not resurrect the dropped token.
	clock.set(START);

	assert!(cache.peek().is_none());

	failing_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn blocked_url_fails_without_network_call() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let mock = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(200).body(token_body("T1", 60_000));
		})
		.await;
	let instance = LocalInstance::new(format!("http://127.0.0.1:{}/", server.port()), ACCESS_KEY);
	let err = cache.acquire(&instance).await.expect_err("Loopback URL must be rejected.");

	assert!(matches!(err, Error::Generic(GenericError::InvalidUrl(_))));
	assert!(cache.peek().is_none());

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn transport_failure_leaves_slot_empty_and_retries() {
	let port = {
		let listener =
			TcpListener::bind("127.0.0.1:0").expect("Ephemeral listener should bind.");

		listener.local_addr().expect("Listener should expose its address.").port()
	};
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(port);

	for _ in 0..2 {
		let err = cache.acquire(&instance).await.expect_err("Closed port must fail the acquire.");

		assert!(matches!(err, Error::Generic(GenericError::Transport { .. })));
		assert!(cache.peek().is_none());
	}

	assert_eq!(cache.metrics().exchanges(), 2);
}

#[tokio::test]
async fn invalidate_forces_exactly_one_exchange() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = build_cache(&clock);
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200).body(token_body("T1", 60_000));
		})
		.await;

	cache.acquire(&instance).await.expect("Initial acquire should succeed.");
	cache.invalidate();

	assert!(cache.peek().is_none());

	cache.acquire(&instance).await.expect("Acquire after invalidate should succeed.");
	cache.acquire(&instance).await.expect("Follow-up acquire should be served from cache.");

	assert_eq!(cache.metrics().invalidations(), 1);

	mock.assert_calls_async(2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_hit_performs_single_exchange() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = Arc::new(build_cache(&clock));
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200)
				.delay(std::time::Duration::from_millis(200))
				.body(token_body("T1", 60_000));
		})
		.await;
	let mut workers = JoinSet::new();

	for _ in 0..50 {
		let cache = cache.clone();
		let instance = instance.clone();

		workers.spawn(async move { cache.acquire(&instance).await });
	}

	let mut served = 0;

	while let Some(joined) = workers.join_next().await {
		let token = joined
			.expect("Worker task should not panic.")
			.expect("Every worker should receive a token.");

		assert_eq!(token.access_token.expose(), "T1");

		served += 1;
	}

	assert_eq!(served, 50);
	assert_eq!(cache.metrics().exchanges(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_a_failed_refresh() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = Arc::new(build_cache(&clock));
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(401).delay(std::time::Duration::from_millis(200));
		})
		.await;
	let mut workers = JoinSet::new();

	for _ in 0..10 {
		let cache = cache.clone();
		let instance = instance.clone();

		workers.spawn(async move { cache.acquire(&instance).await });
	}

	while let Some(joined) = workers.join_next().await {
		let err = joined
			.expect("Worker task should not panic.")
			.expect_err("Every worker should observe the shared failure.");

		assert!(err.is_auth_denied());
	}

	assert!(cache.peek().is_none());
	assert_eq!(cache.metrics().exchanges(), 1);
	assert_eq!(cache.metrics().failures(), 10);

	mock.assert_calls_async(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_an_already_expired_token() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = Arc::new(build_cache(&clock));
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200)
				.delay(std::time::Duration::from_millis(200))
				.body(token_body("T0", 0));
		})
		.await;
	let mut workers = JoinSet::new();

	for _ in 0..10 {
		let cache = cache.clone();
		let instance = instance.clone();

		workers.spawn(async move { cache.acquire(&instance).await });
	}

	while let Some(joined) = workers.join_next().await {
		let token = joined
			.expect("Worker task should not panic.")
			.expect("Every worker should receive the fetched token.");

		assert_eq!(token.access_token.expose(), "T0");
	}

	assert!(cache.peek().is_none());
	assert_eq!(cache.metrics().exchanges(), 1);

	mock.assert_calls_async(1).await;

	// The next caller arrives after the refresh finished and exchanges again.
	cache.acquire(&instance).await.expect("Follow-up acquire should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_refresh_leaves_slot_empty_for_queued_caller() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let cache = Arc::new(build_cache(&clock));
	let instance = instance_for_port(server.port());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(DEFAULT_TOKEN_PATH);
			then.status(200)
				.delay(std::time::Duration::from_millis(300))
				.body(token_body("T1", 60_000));
		})
		.await;
	let first = {
		let cache = cache.clone();
		let instance = instance.clone();

		tokio::spawn(async move { cache.acquire(&instance).await })
	};

	tokio::time::sleep(std::time::Duration::from_millis(100)).await;

	let second = {
		let cache = cache.clone();
		let instance = instance.clone();

		tokio::spawn(async move { cache.acquire(&instance).await })
	};

	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	first.abort();

	assert!(first.await.expect_err("Aborted task should report cancellation.").is_cancelled());
	assert!(cache.peek().is_none());

	let token = second
		.await
		.expect("Queued task should not panic.")
		.expect("Queued caller should run its own exchange.");

	assert_eq!(token.access_token.expose(), "T1");
	assert!(cache.peek().is_some());
	assert_eq!(cache.metrics().exchanges(), 2);

	mock.assert_calls_async(2).await;
}
