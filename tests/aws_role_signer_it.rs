#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use spapi_auth::{
	_preludet::*,
	config::OAuthGrant,
	credentials::{AwsRoleSigner, CredentialState},
	http::ReqwestHttpClient,
};

const FAR_FUTURE: &str = "2099-01-01T00:00:00Z";

fn signer(server: &MockServer) -> AwsRoleSigner<ReqwestHttpClient> {
	let config =
		test_config(&server.base_url(), OAuthGrant::RefreshToken("refresh-unused".into()));

	AwsRoleSigner::from_config(&config, Arc::new(test_reqwest_http_client()))
		.expect("Role signer should construct from the test configuration.")
}

#[tokio::test]
async fn assume_role_posts_a_signed_form_and_parses_credentials() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/")
				.header("content-type", "application/x-www-form-urlencoded")
				.header_exists("x-amz-date")
				.header_exists("x-amz-content-sha256")
				.header_exists("authorization")
				.form_urlencoded_tuple("Action", "AssumeRole")
				.form_urlencoded_tuple("DurationSeconds", "3600")
				.form_urlencoded_tuple("RoleArn", TEST_ROLE_ARN)
				.form_urlencoded_tuple("RoleSessionName", "spapi-auth")
				.form_urlencoded_tuple("Version", "2011-06-15");
			then.status(200)
				.header("content-type", "text/xml")
				.body(assume_role_body("ASIATEMPORARY1", "session-1", FAR_FUTURE));
		})
		.await;
	let signer = signer(&server);

	assert!(signer.current_credentials().is_none());

	let credentials = signer.ensure_fresh().await.expect("AssumeRole should succeed.");

	mock.assert_async().await;

	assert_eq!(credentials.access_key_id, "ASIATEMPORARY1");
	assert_eq!(credentials.secret_access_key.expose(), "temporary/secret+key");
	assert_eq!(credentials.session_token.expose(), "session-1");
	assert_eq!(
		credentials.expires_at,
		OffsetDateTime::parse(FAR_FUTURE, &time::format_description::well_known::Rfc3339)
			.expect("Fixture expiration should parse.")
	);
	assert_eq!(signer.state(), CredentialState::Fresh);
	assert_eq!(signer.current_credentials().as_deref(), Some(credentials.as_ref()));
}

#[tokio::test]
async fn concurrent_refreshes_assume_the_role_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(200).body(assume_role_body("ASIATEMPORARY1", "session-1", FAR_FUTURE));
		})
		.await;
	let signer = signer(&server);
	let (a, b, c, d) = tokio::join!(
		signer.ensure_fresh(),
		signer.ensure_fresh(),
		signer.ensure_fresh(),
		signer.ensure_fresh(),
	);

	for credentials in [a, b, c, d] {
		let credentials = credentials.expect("AssumeRole should succeed.");

		assert_eq!(credentials.session_token.expose(), "session-1");
	}

	mock.assert_calls_async(1).await;

	signer.invalidate();

	assert_eq!(signer.state(), CredentialState::Expired);

	signer.ensure_fresh().await.expect("Invalidated credentials should refresh.");
	mock.assert_calls_async(2).await;
	assert_eq!(signer.metrics().successes(), 2);
}

#[tokio::test]
async fn refresh_failure_inside_the_margin_reuses_valid_credentials() {
	let server = MockServer::start_async().await;
	let issued = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(200).body(assume_role_body("ASIATEMPORARY1", "session-1", FAR_FUTURE));
		})
		.await;
	// Margin wider than the credential lifetime: every call goes to STS first.
	let signer = signer(&server).with_refresh_margin(Duration::days(365 * 200));
	let first = signer.ensure_fresh().await.expect("First AssumeRole should succeed.");

	issued.delete_async().await;

	let outage = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(500)
				.body("<ErrorResponse><Error><Code>InternalFailure</Code></Error></ErrorResponse>");
		})
		.await;
	let second = signer.ensure_fresh().await.expect("Valid credentials should be reused.");

	outage.assert_async().await;

	assert_eq!(second, first);
	assert_eq!(signer.metrics().failures(), 1);
}

#[tokio::test]
async fn refresh_failure_after_expiry_surfaces_the_error() {
	let server = MockServer::start_async().await;
	let issued = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(200).body(assume_role_body("ASIATEMPORARY1", "session-1", FAR_FUTURE));
		})
		.await;
	let signer = signer(&server);

	signer.ensure_fresh().await.expect("First AssumeRole should succeed.");
	issued.delete_async().await;
	signer.invalidate();

	let outage = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(500)
				.body("<ErrorResponse><Error><Code>InternalFailure</Code></Error></ErrorResponse>");
		})
		.await;
	let err = signer.ensure_fresh().await.expect_err("Expired credentials must not be reused.");

	outage.assert_async().await;

	assert!(matches!(err, Error::AssumeRoleFailed { status: 500, .. }));
	assert_eq!(signer.state(), CredentialState::Expired);
	assert_eq!(signer.metrics().failures(), 1);
}

#[tokio::test]
async fn rejected_first_fetch_surfaces_status_and_body() {
	let server = MockServer::start_async().await;
	let body = "<ErrorResponse><Error><Code>AccessDenied</Code></Error></ErrorResponse>";
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(403).body(body);
		})
		.await;
	let signer = signer(&server);
	let err = signer.ensure_fresh().await.expect_err("Rejected AssumeRole should fail.");

	mock.assert_async().await;

	match err {
		Error::AssumeRoleFailed { status, body: raw } => {
			assert_eq!(status, 403);
			assert_eq!(raw, body);
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(signer.current_credentials().is_none());
}
