#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use spapi_auth::{
	_preludet::*,
	auth::TokenStatus,
	config::OAuthGrant,
	credentials::{CredentialState, OAuthTokenManager},
	http::ReqwestHttpClient,
};

const TOKEN_PATH: &str = "/auth/o2/token";

fn manager(server: &MockServer, grant: OAuthGrant) -> OAuthTokenManager<ReqwestHttpClient> {
	let config = test_config(&server.base_url(), grant);

	OAuthTokenManager::from_config(&config, Arc::new(test_reqwest_http_client()))
		.expect("Token manager should construct from the test configuration.")
}

#[tokio::test]
async fn authorization_code_exchange_posts_form_and_sets_expiry() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "consent-code")
				.form_urlencoded_tuple("client_id", TEST_CLIENT_ID)
				.form_urlencoded_tuple("client_secret", TEST_CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(lwa_token_body("access-initial", "refresh-initial", 3600));
		})
		.await;
	let manager = manager(&server, OAuthGrant::AuthorizationCode("consent-code".into()));
	let before = OffsetDateTime::now_utc();
	let set = manager.initialize().await.expect("Authorization code exchange should succeed.");
	let after = OffsetDateTime::now_utc();

	mock.assert_async().await;

	assert_eq!(set.access_token.expose(), "access-initial");
	assert_eq!(set.refresh_token.expose(), "refresh-initial");
	assert_eq!(set.expires_at, set.issued_at + Duration::seconds(3000));
	assert!(set.issued_at >= before && set.issued_at <= after);
	assert_eq!(manager.state(), CredentialState::Fresh);
	assert_eq!(
		manager.get_access_token().await.expect("Fresh tokens should be readable.").map(
			|token| token.expose().to_owned()
		),
		Some("access-initial".to_owned())
	);
}

#[tokio::test]
async fn uninitialized_manager_reports_no_token() {
	let server = MockServer::start_async().await;
	let manager = manager(&server, OAuthGrant::RefreshToken("refresh-0".into()));

	assert!(manager.get_access_token().await.expect("Reads should not fail.").is_none());
	assert_eq!(manager.snapshot().status(), TokenStatus::Uninitialized);
	assert_eq!(manager.metrics().attempts(), 0);
}

#[tokio::test]
async fn concurrent_expired_reads_refresh_once() {
	let server = MockServer::start_async().await;
	let initial = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-0");
			then.status(200).body(lwa_token_body("access-1", "refresh-1", 3600));
		})
		.await;
	let rotated = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(200).body(lwa_token_body("access-2", "refresh-2", 3600));
		})
		.await;
	let manager = manager(&server, OAuthGrant::RefreshToken("refresh-0".into()));

	manager.initialize().await.expect("Initial exchange should succeed.");
	manager.invalidate();

	assert_eq!(manager.snapshot().status(), TokenStatus::Expired);

	let (a, b, c, d) = tokio::join!(
		manager.get_access_token(),
		manager.get_access_token(),
		manager.get_access_token(),
		manager.get_access_token(),
	);

	for token in [a, b, c, d] {
		let token = token.expect("Refresh should succeed.").expect("Token should be present.");

		assert_eq!(token.expose(), "access-2");
	}

	initial.assert_calls_async(1).await;
	rotated.assert_calls_async(1).await;

	assert_eq!(manager.snapshot().refresh_token.expose(), "refresh-2");
	assert_eq!(manager.metrics().attempts(), 2);
}

#[tokio::test]
async fn rejected_exchange_surfaces_status_and_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let manager = manager(&server, OAuthGrant::AuthorizationCode("used-code".into()));
	let err = manager.initialize().await.expect_err("Rejected exchanges should fail.");

	mock.assert_async().await;

	match err {
		Error::TokenExchangeFailed { status, body } => {
			assert_eq!(status, 400);
			assert_eq!(body, "{\"error\":\"invalid_grant\"}");
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(manager.snapshot().is_uninitialized());
	assert_eq!(manager.metrics().failures(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_set_and_retries_later() {
	let server = MockServer::start_async().await;
	let initial = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("refresh_token", "refresh-0");
			then.status(200).body(lwa_token_body("access-1", "refresh-1", 3600));
		})
		.await;
	let manager = manager(&server, OAuthGrant::RefreshToken("refresh-0".into()));

	manager.initialize().await.expect("Initial exchange should succeed.");
	manager.invalidate();

	let outage = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(503).body("unavailable");
		})
		.await;
	let err = manager.get_access_token().await.expect_err("Refresh during an outage should fail.");

	assert!(matches!(err, Error::TokenExchangeFailed { status: 503, .. }));
	assert!(err.is_retryable());
	assert_eq!(manager.snapshot().access_token.expose(), "access-1");
	assert_eq!(manager.snapshot().status(), TokenStatus::Expired);

	outage.delete_async().await;

	let recovered = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(200)
				.body("{\"access_token\":\"access-2\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let token = manager
		.get_access_token()
		.await
		.expect("Refresh should succeed after the outage.")
		.expect("Token should be present.");

	initial.assert_calls_async(1).await;
	recovered.assert_calls_async(1).await;

	assert_eq!(token.expose(), "access-2");
	assert_eq!(manager.snapshot().refresh_token.expose(), "refresh-1");
}

#[tokio::test]
async fn slow_token_endpoint_times_out() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.delay(std::time::Duration::from_millis(500))
				.body(lwa_token_body("access-late", "refresh-late", 3600));
		})
		.await;

	let manager = manager(&server, OAuthGrant::RefreshToken("refresh-0".into()))
		.with_refresh_timeout(Duration::milliseconds(50));
	let err = manager.initialize().await.expect_err("Slow exchanges should time out.");

	assert!(matches!(err, Error::CredentialRefreshTimeout { .. }));
	assert!(manager.snapshot().is_uninitialized());
}
