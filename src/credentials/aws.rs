//! Temporary AWS credentials obtained through a self-signed STS `AssumeRole` call.

// std
use std::sync::atomic::AtomicBool;
// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderValue, Method, Request, header},
};
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{self, AwsCredentials, TemporaryAwsCredentials, TokenSecret},
	config::{
		ClientConfig, ConfigBuildError, DEFAULT_AWS_REFRESH_MARGIN, DEFAULT_REFRESH_TIMEOUT,
		DEFAULT_ROLE_SESSION_NAME, DEFAULT_STS_ENDPOINT, STS_REGION,
	},
	credentials::{self, CredentialState, RefreshingFlag},
	crypto,
	error::ConfigError,
	http::{self, HttpTransport},
	obs::{self, CredentialKind, CredentialSpan, RefreshMetrics},
	sigv4::{self, RequestSigner, SigningTime, X_AMZ_CONTENT_SHA_256},
};

const KIND: CredentialKind = CredentialKind::AssumeRole;
/// STS API version sent with `AssumeRole`.
pub const STS_API_VERSION: &str = "2011-06-15";
/// Lifetime requested for role credentials, in seconds.
pub const ASSUME_ROLE_DURATION_SECONDS: u32 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
	#[serde(rename = "AssumeRoleResult")]
	result: AssumeRoleResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResult {
	credentials: AssumeRoleCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleCredentials {
	access_key_id: String,
	secret_access_key: String,
	session_token: String,
	expiration: String,
}

/// Owns the temporary credentials for one role.
pub struct AwsRoleSigner<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	sts_endpoint: Url,
	role_arn: String,
	role_session_name: String,
	credentials: AwsCredentials,
	signer: RequestSigner,
	current: RwLock<Arc<TemporaryAwsCredentials>>,
	refresh_guard: AsyncMutex<()>,
	refreshing: AtomicBool,
	margin: Duration,
	timeout: Duration,
	metrics: Arc<RefreshMetrics>,
}
impl<T> AwsRoleSigner<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a signer that assumes `role_arn` using the long-lived IAM key pair.
	pub fn new(
		role_arn: impl Into<String>,
		access_key_id: impl Into<String>,
		secret_access_key: impl Into<TokenSecret>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let role_arn = role_arn.into();
		let credentials = AwsCredentials::new(access_key_id, secret_access_key);

		auth::require_non_blank("role_arn", &role_arn)?;
		auth::require_non_blank("aws_access_key_id", &credentials.access_key_id)?;
		auth::require_non_blank("aws_secret_access_key", credentials.secret_access_key.expose())?;

		let sts_endpoint = Url::parse(DEFAULT_STS_ENDPOINT).map_err(|source| {
			ConfigError::from(ConfigBuildError::InvalidUrl { endpoint: "sts", source })
		})?;

		Ok(Self {
			transport: transport.into(),
			sts_endpoint,
			role_arn,
			role_session_name: DEFAULT_ROLE_SESSION_NAME.to_owned(),
			credentials,
			signer: RequestSigner::new("sts", STS_REGION),
			current: RwLock::new(Arc::new(TemporaryAwsCredentials::default())),
			refresh_guard: AsyncMutex::new(()),
			refreshing: AtomicBool::new(false),
			margin: DEFAULT_AWS_REFRESH_MARGIN,
			timeout: DEFAULT_REFRESH_TIMEOUT,
			metrics: Default::default(),
		})
	}

	/// Creates a signer from a validated [`ClientConfig`].
	pub fn from_config(config: &ClientConfig, transport: impl Into<Arc<T>>) -> Result<Self> {
		let signer = Self::new(
			config.role_arn.clone(),
			config.aws_access_key_id.clone(),
			config.aws_secret_access_key.clone(),
			transport,
		)?;

		Ok(signer
			.with_sts_endpoint(config.sts_url().map_err(ConfigError::from)?)
			.with_role_session_name(config.role_session_name.clone())
			.with_refresh_margin(config.aws_refresh_margin)
			.with_refresh_timeout(config.refresh_timeout))
	}

	/// Overrides the STS endpoint.
	pub fn with_sts_endpoint(mut self, url: Url) -> Self {
		self.sts_endpoint = url;

		self
	}

	/// Overrides the `RoleSessionName`.
	pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
		self.role_session_name = name.into();

		self
	}

	/// Overrides the remaining lifetime below which credentials are refreshed.
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.margin = margin;

		self
	}

	/// Overrides the per-exchange timeout.
	pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Returns credentials with more than the refresh margin of life left, assuming the role
	/// again when needed.
	///
	/// When that refresh fails but the held credentials have not expired yet, they are
	/// returned and a warning is emitted. Expired or never-fetched credentials are never
	/// returned.
	pub async fn ensure_fresh(&self) -> Result<Arc<TemporaryAwsCredentials>> {
		let current = self.snapshot();

		if !current.needs_refresh_at(OffsetDateTime::now_utc(), self.margin) {
			return Ok(current);
		}

		let span = CredentialSpan::new(KIND, "ensure_fresh");
		let exchange = span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;
			let current = self.snapshot();

			if !current.needs_refresh_at(OffsetDateTime::now_utc(), self.margin) {
				return Ok(current);
			}

			match self.assume_role().await {
				Ok(fresh) => Ok(self.publish(fresh)),
				Err(e) if !current.is_expired_at(OffsetDateTime::now_utc()) => {
					obs::warn_event(
						KIND,
						"Refresh failed; reusing role credentials that are still valid.",
						&e,
					);

					Ok(current)
				},
				Err(e) => Err(e),
			}
		});

		span.settle(exchange.await)
	}

	/// Assumes the role for the first time.
	pub async fn initialize(&self) -> Result<Arc<TemporaryAwsCredentials>> {
		self.ensure_fresh().await
	}

	/// Currently held credentials without refreshing; `None` until the first fetch succeeds.
	pub fn current_credentials(&self) -> Option<Arc<TemporaryAwsCredentials>> {
		let current = self.snapshot();

		(!current.is_zero()).then_some(current)
	}

	/// Current credential snapshot, zero-valued before the first fetch.
	pub fn snapshot(&self) -> Arc<TemporaryAwsCredentials> {
		self.current.read().clone()
	}

	/// Freshness of the held credentials.
	pub fn state(&self) -> CredentialState {
		if credentials::is_refreshing(&self.refreshing) {
			return CredentialState::Refreshing;
		}
		if self.snapshot().needs_refresh_at(OffsetDateTime::now_utc(), self.margin) {
			return CredentialState::Expired;
		}

		CredentialState::Fresh
	}

	/// Marks the held credentials as expired so the next read refreshes them.
	pub fn invalidate(&self) {
		let mut current = self.current.write();

		if !current.is_zero() {
			*current = Arc::new(current.expired_copy());
		}
	}

	/// Exchange counters for this signer.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// Builds the signed `AssumeRole` request for `time`.
	pub fn assume_role_request(&self, time: &SigningTime) -> Result<HttpRequest> {
		let body = assume_role_body(&self.role_arn, &self.role_session_name);
		let mut request = Request::builder()
			.method(Method::POST)
			.uri(self.sts_endpoint.as_str())
			.header(X_AMZ_CONTENT_SHA_256, crypto::hex_sha256(body.as_bytes()))
			.body(body.into_bytes())
			.map_err(ConfigError::from)?;

		self.signer.sign(&mut request, &self.credentials.signing(), time)?;
		request.headers_mut().insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/x-www-form-urlencoded"),
		);

		Ok(request)
	}

	fn publish(&self, fresh: TemporaryAwsCredentials) -> Arc<TemporaryAwsCredentials> {
		let fresh = Arc::new(fresh);

		*self.current.write() = fresh.clone();

		fresh
	}

	async fn assume_role(&self) -> Result<TemporaryAwsCredentials> {
		let _refreshing = RefreshingFlag::raise(&self.refreshing);

		self.metrics.record_attempt(KIND);

		let result = credentials::bounded(KIND, self.timeout, async {
			let request = self.assume_role_request(&SigningTime::now())?;
			let response = http::execute(self.transport.as_ref(), "sts", request).await?;

			parse_assume_role_response(&response)
		})
		.await;

		match &result {
			Ok(_) => {
				self.metrics.record_success(KIND);
				obs::debug_event(KIND, "AssumeRole succeeded.");
			},
			Err(e) => {
				self.metrics.record_failure(KIND);
				obs::warn_event(KIND, "AssumeRole failed.", e);
			},
		}

		result
	}
}
impl<T> Debug for AwsRoleSigner<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AwsRoleSigner")
			.field("sts_endpoint", &self.sts_endpoint.as_str())
			.field("role_arn", &self.role_arn)
			.field("role_session_name", &self.role_session_name)
			.field("access_key_id", &self.credentials.access_key_id)
			.field("current", &self.snapshot())
			.field("margin", &self.margin)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Form body of an `AssumeRole` call, keys sorted.
pub fn assume_role_body(role_arn: &str, role_session_name: &str) -> String {
	let duration = ASSUME_ROLE_DURATION_SECONDS.to_string();

	sigv4::canonical_query([
		("Version", STS_API_VERSION),
		("RoleSessionName", role_session_name),
		("RoleArn", role_arn),
		("DurationSeconds", duration.as_str()),
		("Action", "AssumeRole"),
	])
}

fn parse_assume_role_response(response: &HttpResponse) -> Result<TemporaryAwsCredentials> {
	let status = response.status().as_u16();
	let body = http::body_text(response);

	if !http::is_success(response) {
		return Err(Error::AssumeRoleFailed { status, body });
	}

	let Ok(parsed) = quick_xml::de::from_str::<AssumeRoleResponse>(&body) else {
		return Err(Error::AssumeRoleFailed { status, body });
	};
	let credentials = parsed.result.credentials;
	let Ok(expires_at) = OffsetDateTime::parse(credentials.expiration.trim(), &Rfc3339) else {
		return Err(Error::AssumeRoleFailed { status, body });
	};
	let access_key_id = credentials.access_key_id.trim().to_owned();

	if access_key_id.is_empty() {
		return Err(Error::AssumeRoleFailed { status, body });
	}

	Ok(TemporaryAwsCredentials {
		access_key_id,
		secret_access_key: TokenSecret::new(credentials.secret_access_key.trim()),
		session_token: TokenSecret::new(credentials.session_token.trim()),
		expires_at,
	})
}
