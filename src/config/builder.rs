// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{
		ClientConfig, DEFAULT_AWS_REFRESH_MARGIN, DEFAULT_REFRESH_TIMEOUT,
		DEFAULT_ROLE_SESSION_NAME, OAuthGrant, Region,
	},
};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigBuildError {
	/// A required field was never set.
	#[error("Missing required configuration field `{field}`.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Endpoints must use HTTPS (plain HTTP is accepted for loopback hosts only).
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser failure.
		#[source]
		source: url::ParseError,
	},
	/// Timing knobs must be strictly positive.
	#[error("Configuration field `{field}` must be a positive duration.")]
	NonPositiveDuration {
		/// Name of the offending field.
		field: &'static str,
	},
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	region: Region,
	sandbox: bool,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	grant: Option<OAuthGrant>,
	aws_access_key_id: Option<String>,
	aws_secret_access_key: Option<TokenSecret>,
	role_arn: Option<String>,
	role_session_name: String,
	token_endpoint: Option<Url>,
	sts_endpoint: Option<Url>,
	api_endpoint: Option<Url>,
	refresh_timeout: Duration,
	aws_refresh_margin: Duration,
}
impl ClientConfigBuilder {
	/// Creates a builder for `region` with default endpoints and timings.
	pub fn new(region: Region) -> Self {
		Self {
			region,
			sandbox: false,
			client_id: None,
			client_secret: None,
			grant: None,
			aws_access_key_id: None,
			aws_secret_access_key: None,
			role_arn: None,
			role_session_name: DEFAULT_ROLE_SESSION_NAME.to_owned(),
			token_endpoint: None,
			sts_endpoint: None,
			api_endpoint: None,
			refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
			aws_refresh_margin: DEFAULT_AWS_REFRESH_MARGIN,
		}
	}

	/// Targets the sandbox host.
	pub fn sandbox(mut self, sandbox: bool) -> Self {
		self.sandbox = sandbox;

		self
	}

	/// Sets the LWA client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the LWA client secret.
	pub fn client_secret(mut self, client_secret: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the initial OAuth grant.
	pub fn grant(mut self, grant: OAuthGrant) -> Self {
		self.grant = Some(grant);

		self
	}

	/// Sets the long-lived IAM access key id.
	pub fn aws_access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
		self.aws_access_key_id = Some(access_key_id.into());

		self
	}

	/// Sets the long-lived IAM secret.
	pub fn aws_secret_access_key(mut self, secret: impl Into<TokenSecret>) -> Self {
		self.aws_secret_access_key = Some(secret.into());

		self
	}

	/// Sets the role to assume.
	pub fn role_arn(mut self, role_arn: impl Into<String>) -> Self {
		self.role_arn = Some(role_arn.into());

		self
	}

	/// Overrides the `RoleSessionName`.
	pub fn role_session_name(mut self, name: impl Into<String>) -> Self {
		self.role_session_name = name.into();

		self
	}

	/// Overrides the OAuth token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the STS endpoint.
	pub fn sts_endpoint(mut self, url: Url) -> Self {
		self.sts_endpoint = Some(url);

		self
	}

	/// Overrides the API endpoint.
	pub fn api_endpoint(mut self, url: Url) -> Self {
		self.api_endpoint = Some(url);

		self
	}

	/// Overrides the per-exchange timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides the role-credential refresh margin.
	pub fn aws_refresh_margin(mut self, margin: Duration) -> Self {
		self.aws_refresh_margin = margin;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigBuildError> {
		let config = ClientConfig {
			region: self.region,
			sandbox: self.sandbox,
			client_id: self.client_id.ok_or(ConfigBuildError::MissingField { field: "client_id" })?,
			client_secret: self
				.client_secret
				.ok_or(ConfigBuildError::MissingField { field: "client_secret" })?,
			grant: self.grant.ok_or(ConfigBuildError::MissingField { field: "grant" })?,
			aws_access_key_id: self
				.aws_access_key_id
				.ok_or(ConfigBuildError::MissingField { field: "aws_access_key_id" })?,
			aws_secret_access_key: self
				.aws_secret_access_key
				.ok_or(ConfigBuildError::MissingField { field: "aws_secret_access_key" })?,
			role_arn: self.role_arn.ok_or(ConfigBuildError::MissingField { field: "role_arn" })?,
			role_session_name: self.role_session_name,
			token_endpoint: self.token_endpoint,
			sts_endpoint: self.sts_endpoint,
			api_endpoint: self.api_endpoint,
			refresh_timeout: self.refresh_timeout,
			aws_refresh_margin: self.aws_refresh_margin,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	/// Validates endpoint schemes and timing knobs.
	///
	/// Blank credential values are reported later, by the credential managers, as
	/// [`Error::InvalidCredentialInput`].
	pub fn validate(&self) -> Result<(), ConfigBuildError> {
		validate_endpoint("token", &self.token_url()?)?;
		validate_endpoint("sts", &self.sts_url()?)?;
		validate_endpoint("api", &self.api_base_url()?)?;

		if !self.refresh_timeout.is_positive() {
			return Err(ConfigBuildError::NonPositiveDuration { field: "refresh_timeout" });
		}
		if self.aws_refresh_margin.is_negative() {
			return Err(ConfigBuildError::NonPositiveDuration { field: "aws_refresh_margin" });
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigBuildError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigBuildError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
