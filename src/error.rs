//! Crate-level error types shared by the credential managers, the signer, and the client.

// self
use crate::{_prelude::*, obs::CredentialKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Request canonicalization or signing failed.
	#[error(transparent)]
	Signing(#[from] SigningError),

	/// A required credential input was empty; the caller's configuration is wrong.
	#[error("Credential input `{field}` must not be empty.")]
	InvalidCredentialInput {
		/// Name of the offending input.
		field: &'static str,
	},
	/// The OAuth token endpoint rejected the exchange or returned an unusable body.
	#[error("Token exchange failed with HTTP status {status}: {body}")]
	TokenExchangeFailed {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Raw response body (or a parse diagnostic when the body was unusable).
		body: String,
	},
	/// STS rejected the AssumeRole call or returned a body without credentials.
	#[error("AssumeRole failed with HTTP status {status}: {body}")]
	AssumeRoleFailed {
		/// HTTP status returned by STS.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// A credential exchange did not complete within the configured bound.
	#[error("Refreshing {credential} credentials timed out after {timeout}.")]
	CredentialRefreshTimeout {
		/// Credential lifecycle that timed out.
		credential: CredentialKind,
		/// Configured timeout.
		timeout: Duration,
	},
	/// One of the readiness-gate subsystems failed to initialize.
	#[error("Initialization of the {subsystem} subsystem failed: {source}")]
	Initialization {
		/// Subsystem that failed.
		subsystem: Subsystem,
		/// Shared failure observed by every waiter.
		#[source]
		source: Arc<Error>,
	},
	/// Credentials are not available yet.
	#[error("Credentials are not initialized.")]
	NotReady,
}
impl Error {
	/// Returns `true` when re-invoking the failed operation may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transport(_)
			| Self::TokenExchangeFailed { .. }
			| Self::AssumeRoleFailed { .. }
			| Self::CredentialRefreshTimeout { .. }
			| Self::NotReady => true,
			Self::Initialization { source, .. } => source.is_retryable(),
			Self::Config(_) | Self::Signing(_) | Self::InvalidCredentialInput { .. } => false,
		}
	}
}

/// Readiness-gate subsystems initialized concurrently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
	/// OAuth token manager.
	OAuth,
	/// AWS role-credential signer.
	Aws,
	/// External API client collaborator.
	ApiClient,
}
impl Subsystem {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::OAuth => "oauth",
			Self::Aws => "aws",
			Self::ApiClient => "api_client",
		}
	}
}
impl Display for Subsystem {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configuration could not be assembled.
	#[error(transparent)]
	Build(#[from] crate::config::ConfigBuildError),
	/// Request URI has no host to sign.
	#[error("Request URI `{uri}` has no host.")]
	MissingHost {
		/// Offending URI.
		uri: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Logical endpoint being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Transport reported a failure without a structured source.
	#[error("HTTP client error occurred while calling {endpoint}: {message}")]
	Other {
		/// Logical endpoint being called.
		endpoint: &'static str,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Failures while building a SigV4 signature. These indicate a canonicalization defect and
/// are not expected for well-formed inputs.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// HMAC key could not be initialized.
	#[error("HMAC key could not be initialized.")]
	InvalidKey(#[from] hmac::digest::InvalidLength),
	/// A header value is not visible ASCII.
	#[error("Header `{name}` has a value that cannot be canonicalized.")]
	InvalidHeaderValue {
		/// Offending header name.
		name: String,
	},
	/// A derived header could not be encoded into a header value.
	#[error("Derived `{name}` header is not a valid header value.")]
	HeaderEncoding {
		/// Header being inserted.
		name: &'static str,
	},
	/// The request path is not valid UTF-8 once percent-decoded.
	#[error("Request path is not valid UTF-8.")]
	InvalidPath(#[from] std::str::Utf8Error),
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retryability_follows_the_taxonomy() {
		assert!(!Error::InvalidCredentialInput { field: "client_id" }.is_retryable());
		assert!(Error::TokenExchangeFailed { status: 500, body: String::new() }.is_retryable());
		assert!(Error::AssumeRoleFailed { status: 403, body: String::new() }.is_retryable());
		assert!(
			Error::CredentialRefreshTimeout {
				credential: CredentialKind::OAuth,
				timeout: Duration::seconds(1),
			}
			.is_retryable()
		);
		assert!(
			!Error::Signing(SigningError::HeaderEncoding { name: "authorization" }).is_retryable()
		);

		let fatal = Error::Initialization {
			subsystem: Subsystem::OAuth,
			source: Arc::new(Error::InvalidCredentialInput { field: "code" }),
		};

		assert!(!fatal.is_retryable());
	}

	#[test]
	fn token_exchange_failure_reports_status_and_body() {
		let err = Error::TokenExchangeFailed {
			status: 400,
			body: "{\"error\":\"invalid_grant\"}".into(),
		};

		assert_eq!(
			err.to_string(),
			"Token exchange failed with HTTP status 400: {\"error\":\"invalid_grant\"}"
		);
	}
}
