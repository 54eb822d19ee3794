//! Client configuration: marketplace regions, endpoints, credentials, and timing knobs.
//!
//! [`ClientConfig`] can be assembled through [`ClientConfig::builder`] or deserialized with
//! serde. Deserialized values should be checked with [`ClientConfig::validate`]; the client
//! constructors do so automatically.

/// Builder API for assembling and validating [`ClientConfig`] values.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Default Login-with-Amazon token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";
/// Default global STS endpoint.
pub const DEFAULT_STS_ENDPOINT: &str = "https://sts.amazonaws.com";
/// Region used to sign `AssumeRole`, independent of the API region.
pub const STS_REGION: &str = "us-east-1";
/// Default `RoleSessionName` sent with `AssumeRole`.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "spapi-auth";
/// Default bound applied to every credential exchange.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);
/// Default remaining lifetime below which role credentials are refreshed.
pub const DEFAULT_AWS_REFRESH_MARGIN: Duration = Duration::minutes(2);

/// Partner API regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
	/// North America (`us-east-1`).
	NorthAmerica,
	/// Europe (`eu-west-1`).
	Europe,
	/// Far East (`us-west-2`).
	FarEast,
}
impl Region {
	/// Production API host.
	pub const fn api_host(self) -> &'static str {
		match self {
			Self::NorthAmerica => "sellingpartnerapi-na.amazon.com",
			Self::Europe => "sellingpartnerapi-eu.amazon.com",
			Self::FarEast => "sellingpartnerapi-fe.amazon.com",
		}
	}

	/// Sandbox API host.
	pub const fn sandbox_host(self) -> &'static str {
		match self {
			Self::NorthAmerica => "sandbox.sellingpartnerapi-na.amazon.com",
			Self::Europe => "sandbox.sellingpartnerapi-eu.amazon.com",
			Self::FarEast => "sandbox.sellingpartnerapi-fe.amazon.com",
		}
	}

	/// AWS region used to sign API calls.
	pub const fn aws_region(self) -> &'static str {
		match self {
			Self::NorthAmerica => "us-east-1",
			Self::Europe => "eu-west-1",
			Self::FarEast => "us-west-2",
		}
	}
}

/// Initial OAuth grant used by the first exchange.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthGrant {
	/// One-time authorization code from the consent flow.
	AuthorizationCode(TokenSecret),
	/// Long-lived refresh token from a prior authorization.
	RefreshToken(TokenSecret),
}
impl OAuthGrant {
	/// Value sent as `grant_type`.
	pub const fn grant_type(&self) -> &'static str {
		match self {
			Self::AuthorizationCode(_) => "authorization_code",
			Self::RefreshToken(_) => "refresh_token",
		}
	}

	/// Grant credential.
	pub fn secret(&self) -> &TokenSecret {
		match self {
			Self::AuthorizationCode(secret) | Self::RefreshToken(secret) => secret,
		}
	}
}

/// Everything the client needs to authenticate partner API calls.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
	/// Marketplace region.
	pub region: Region,
	/// Target the sandbox host instead of production.
	#[serde(default)]
	pub sandbox: bool,
	/// LWA client identifier.
	pub client_id: String,
	/// LWA client secret.
	pub client_secret: TokenSecret,
	/// Initial OAuth grant.
	pub grant: OAuthGrant,
	/// Long-lived IAM access key id used to sign `AssumeRole`.
	pub aws_access_key_id: String,
	/// Long-lived IAM secret used to sign `AssumeRole`.
	pub aws_secret_access_key: TokenSecret,
	/// Role assumed for API calls.
	pub role_arn: String,
	/// `RoleSessionName` sent with `AssumeRole`.
	#[serde(default = "default_role_session_name")]
	pub role_session_name: String,
	/// OAuth token endpoint override; [`DEFAULT_TOKEN_ENDPOINT`] is used when absent.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// STS endpoint override; [`DEFAULT_STS_ENDPOINT`] is used when absent.
	#[serde(default)]
	pub sts_endpoint: Option<Url>,
	/// API endpoint override; the region host is used when absent.
	#[serde(default)]
	pub api_endpoint: Option<Url>,
	/// Bound applied to each credential exchange.
	#[serde(default = "default_refresh_timeout", with = "seconds")]
	pub refresh_timeout: Duration,
	/// Remaining lifetime below which role credentials are refreshed.
	#[serde(default = "default_aws_refresh_margin", with = "seconds")]
	pub aws_refresh_margin: Duration,
}
impl ClientConfig {
	/// Returns a builder for `region`.
	pub fn builder(region: Region) -> ClientConfigBuilder {
		ClientConfigBuilder::new(region)
	}

	/// Resolved OAuth token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigBuildError> {
		resolve("token", self.token_endpoint.as_ref(), DEFAULT_TOKEN_ENDPOINT)
	}

	/// Resolved STS endpoint.
	pub fn sts_url(&self) -> Result<Url, ConfigBuildError> {
		resolve("sts", self.sts_endpoint.as_ref(), DEFAULT_STS_ENDPOINT)
	}

	/// Base URL API requests are sent to.
	pub fn api_base_url(&self) -> Result<Url, ConfigBuildError> {
		let host = if self.sandbox { self.region.sandbox_host() } else { self.region.api_host() };

		resolve("api", self.api_endpoint.as_ref(), &format!("https://{host}"))
	}

	/// AWS region used to sign API calls.
	pub fn api_aws_region(&self) -> &'static str {
		self.region.aws_region()
	}
}

fn default_role_session_name() -> String {
	DEFAULT_ROLE_SESSION_NAME.to_owned()
}

fn default_refresh_timeout() -> Duration {
	DEFAULT_REFRESH_TIMEOUT
}

fn default_aws_refresh_margin() -> Duration {
	DEFAULT_AWS_REFRESH_MARGIN
}

fn resolve(
	endpoint: &'static str,
	configured: Option<&Url>,
	default: &str,
) -> Result<Url, ConfigBuildError> {
	match configured {
		Some(url) => Ok(url.clone()),
		None =>
			Url::parse(default).map_err(|source| ConfigBuildError::InvalidUrl { endpoint, source }),
	}
}

mod seconds {
	// crates.io
	use serde::{Deserializer, de::Error as _};
	// self
	use crate::_prelude::*;

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = i64::deserialize(deserializer)?;

		if secs < 0 {
			return Err(D::Error::custom("duration must not be negative"));
		}

		Ok(Duration::seconds(secs))
	}
}
