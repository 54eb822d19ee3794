//! OAuth bearer token manager with single-flight refresh.
//!
//! [`OAuthTokenManager`] performs the initial `authorization_code` or `refresh_token`
//! exchange and rotates the token set whenever a reader observes it past its
//! margin-adjusted expiry. Exchanges are plain form POSTs so the status code and raw body of
//! a rejected exchange reach the caller unchanged.

// std
use std::sync::atomic::AtomicBool;
// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{Method, Request, header},
};
// self
use crate::{
	_prelude::*,
	auth::{self, BearerTokenSet, TokenSecret, TokenStatus},
	config::{
		ClientConfig, ConfigBuildError, DEFAULT_REFRESH_TIMEOUT, DEFAULT_TOKEN_ENDPOINT, OAuthGrant,
	},
	credentials::{self, CredentialState, RefreshingFlag},
	error::ConfigError,
	http::{self, HttpTransport},
	obs::{self, CredentialKind, CredentialSpan, RefreshMetrics},
};

const KIND: CredentialKind = CredentialKind::OAuth;

#[derive(Deserialize)]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	expires_in: i64,
}

/// Owns the bearer token set for one LWA client.
pub struct OAuthTokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	grant: OAuthGrant,
	tokens: RwLock<Arc<BearerTokenSet>>,
	refresh_guard: AsyncMutex<()>,
	refreshing: AtomicBool,
	timeout: Duration,
	metrics: Arc<RefreshMetrics>,
}
impl<T> OAuthTokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a manager whose first exchange redeems an authorization code.
	pub fn from_authorization_code(
		code: impl Into<TokenSecret>,
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		Self::new(
			OAuthGrant::AuthorizationCode(code.into()),
			client_id.into(),
			client_secret.into(),
			transport.into(),
		)
	}

	/// Creates a manager whose first exchange redeems a refresh token.
	pub fn from_refresh_token(
		refresh_token: impl Into<TokenSecret>,
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		Self::new(
			OAuthGrant::RefreshToken(refresh_token.into()),
			client_id.into(),
			client_secret.into(),
			transport.into(),
		)
	}

	/// Creates a manager from a validated [`ClientConfig`].
	pub fn from_config(config: &ClientConfig, transport: impl Into<Arc<T>>) -> Result<Self> {
		let manager = Self::new(
			config.grant.clone(),
			config.client_id.clone(),
			config.client_secret.clone(),
			transport.into(),
		)?;

		Ok(manager
			.with_token_endpoint(config.token_url().map_err(ConfigError::from)?)
			.with_refresh_timeout(config.refresh_timeout))
	}

	fn new(
		grant: OAuthGrant,
		client_id: String,
		client_secret: TokenSecret,
		transport: Arc<T>,
	) -> Result<Self> {
		auth::require_non_blank("client_id", &client_id)?;
		auth::require_non_blank("client_secret", client_secret.expose())?;

		match &grant {
			OAuthGrant::AuthorizationCode(code) =>
				auth::require_non_blank("authorization_code", code.expose())?,
			OAuthGrant::RefreshToken(token) =>
				auth::require_non_blank("refresh_token", token.expose())?,
		}

		let token_endpoint = Url::parse(DEFAULT_TOKEN_ENDPOINT).map_err(|source| {
			ConfigError::from(ConfigBuildError::InvalidUrl { endpoint: "token", source })
		})?;

		Ok(Self {
			transport,
			token_endpoint,
			client_id,
			client_secret,
			grant,
			tokens: RwLock::new(Arc::new(BearerTokenSet::uninitialized())),
			refresh_guard: AsyncMutex::new(()),
			refreshing: AtomicBool::new(false),
			timeout: DEFAULT_REFRESH_TIMEOUT,
			metrics: Default::default(),
		})
	}

	/// Overrides the token endpoint.
	pub fn with_token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = url;

		self
	}

	/// Overrides the per-exchange timeout.
	pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Performs the first exchange with the configured grant.
	///
	/// Returns immediately when tokens are already held; concurrent callers share one
	/// exchange.
	pub async fn initialize(&self) -> Result<Arc<BearerTokenSet>> {
		let current = self.snapshot();

		if !current.is_uninitialized() {
			return Ok(current);
		}

		let span = CredentialSpan::new(KIND, "initialize");
		let exchange = span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;
			let current = self.snapshot();

			if !current.is_uninitialized() {
				return Ok(current);
			}

			let fallback = match &self.grant {
				OAuthGrant::RefreshToken(token) => Some(token),
				OAuthGrant::AuthorizationCode(_) => None,
			};
			let set = self.exchange(&self.grant, fallback).await?;

			Ok(self.publish(set))
		});

		span.settle(exchange.await)
	}

	/// Returns the current access token, refreshing it first when it has expired.
	///
	/// `None` means no exchange has completed yet.
	pub async fn get_access_token(&self) -> Result<Option<TokenSecret>> {
		let current = self.snapshot();

		match current.status() {
			TokenStatus::Uninitialized => Ok(None),
			TokenStatus::Active => Ok(Some(current.access_token.clone())),
			TokenStatus::Expired => {
				let refreshed = self.refresh_expired().await?;

				Ok(Some(refreshed.access_token.clone()))
			},
		}
	}

	/// Current token set snapshot.
	pub fn snapshot(&self) -> Arc<BearerTokenSet> {
		self.tokens.read().clone()
	}

	/// Freshness of the held token set.
	pub fn state(&self) -> CredentialState {
		if credentials::is_refreshing(&self.refreshing) {
			return CredentialState::Refreshing;
		}

		match self.snapshot().status() {
			TokenStatus::Active => CredentialState::Fresh,
			TokenStatus::Uninitialized | TokenStatus::Expired => CredentialState::Expired,
		}
	}

	/// Marks the held set as expired so the next read refreshes it.
	pub fn invalidate(&self) {
		let mut tokens = self.tokens.write();

		if !tokens.is_uninitialized() {
			*tokens = Arc::new(tokens.expired_copy());
		}
	}

	/// Exchange counters for this manager.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	async fn refresh_expired(&self) -> Result<Arc<BearerTokenSet>> {
		let span = CredentialSpan::new(KIND, "refresh");
		let exchange = span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;
			let current = self.snapshot();

			if current.status() != TokenStatus::Expired {
				return Ok(current);
			}

			let grant = OAuthGrant::RefreshToken(current.refresh_token.clone());
			let set = self.exchange(&grant, Some(&current.refresh_token)).await?;

			Ok(self.publish(set))
		});

		span.settle(exchange.await)
	}

	fn publish(&self, set: BearerTokenSet) -> Arc<BearerTokenSet> {
		let set = Arc::new(set);

		*self.tokens.write() = set.clone();

		set
	}

	async fn exchange(
		&self,
		grant: &OAuthGrant,
		fallback_refresh: Option<&TokenSecret>,
	) -> Result<BearerTokenSet> {
		let _refreshing = RefreshingFlag::raise(&self.refreshing);

		self.metrics.record_attempt(KIND);

		let result =
			credentials::bounded(KIND, self.timeout, self.exchange_once(grant, fallback_refresh))
				.await;

		match &result {
			Ok(_) => {
				self.metrics.record_success(KIND);
				obs::debug_event(KIND, "Token exchange succeeded.");
			},
			Err(e) => {
				self.metrics.record_failure(KIND);
				obs::warn_event(KIND, "Token exchange failed.", e);
			},
		}

		result
	}

	async fn exchange_once(
		&self,
		grant: &OAuthGrant,
		fallback_refresh: Option<&TokenSecret>,
	) -> Result<BearerTokenSet> {
		let request = self.token_request(grant)?;
		let response = http::execute(self.transport.as_ref(), "token", request).await?;

		parse_token_response(&response, OffsetDateTime::now_utc(), fallback_refresh)
	}

	fn token_request(&self, grant: &OAuthGrant) -> Result<HttpRequest> {
		let credential_field = match grant {
			OAuthGrant::AuthorizationCode(_) => "code",
			OAuthGrant::RefreshToken(_) => "refresh_token",
		};
		let body = url::form_urlencoded::Serializer::new(String::new())
			.append_pair("grant_type", grant.grant_type())
			.append_pair(credential_field, grant.secret().expose())
			.append_pair("client_id", &self.client_id)
			.append_pair("client_secret", self.client_secret.expose())
			.finish();

		Request::builder()
			.method(Method::POST)
			.uri(self.token_endpoint.as_str())
			.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(header::ACCEPT, "application/json")
			.body(body.into_bytes())
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl<T> Debug for OAuthTokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthTokenManager")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("grant_type", &self.grant.grant_type())
			.field("tokens", &self.snapshot())
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Parses a token endpoint response issued at `issued_at`.
///
/// `fallback_refresh` is carried into the new set when the response omits `refresh_token`.
fn parse_token_response(
	response: &HttpResponse,
	issued_at: OffsetDateTime,
	fallback_refresh: Option<&TokenSecret>,
) -> Result<BearerTokenSet> {
	let status = response.status().as_u16();
	let failed = |body: String| Error::TokenExchangeFailed { status, body };

	if !http::is_success(response) {
		return Err(failed(http::body_text(response)));
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let parsed: TokenResponseBody = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| failed(format!("{} ({e})", http::body_text(response))))?;

	if parsed.access_token.is_empty() {
		return Err(failed(format!("{} (empty access_token)", http::body_text(response))));
	}
	if parsed.expires_in <= 0 {
		return Err(failed(format!("{} (non-positive expires_in)", http::body_text(response))));
	}

	let refresh_token = match (parsed.refresh_token, fallback_refresh) {
		(Some(token), _) if !token.is_empty() => TokenSecret::new(token),
		(_, Some(previous)) => previous.clone(),
		_ => return Err(failed(format!("{} (missing refresh_token)", http::body_text(response)))),
	};

	BearerTokenSet::builder()
		.access_token(parsed.access_token)
		.refresh_token(refresh_token)
		.issued_at(issued_at)
		.expires_in(Duration::seconds(parsed.expires_in))
		.build()
		.map_err(|e| failed(e.to_string()))
}
