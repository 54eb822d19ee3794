//! Transport primitives shared by the credential exchanges and the default API client.
//!
//! The crate never talks to an HTTP stack directly. Every call goes through an
//! [`HttpTransport`], which hands out short-lived [`AsyncHttpClient`] handles and classifies
//! transport failures into crate [`Error`] values. Non-2xx responses are not transport
//! failures: they are returned as-is so callers can keep the status and body.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Abstraction over HTTP transports.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by both
/// credential managers and the API client behind an `Arc`. The handles they return must
/// own whatever state the request needs so the request futures stay `Send`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle used for a single exchange.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle for one request.
	fn handle(&self) -> Self::Handle;

	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	///
	/// `endpoint` names the logical endpoint (`token`, `sts`, `api`) for diagnostics.
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		error: HttpClientError<Self::TransportError>,
	) -> Error {
		map_generic_transport_error(endpoint, error)
	}
}

/// Executes `request` through `transport`, mapping transport failures.
pub async fn execute<T>(
	transport: &T,
	endpoint: &'static str,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	T: ?Sized + HttpTransport,
{
	let handle = transport.handle();

	handle.call(request).await.map_err(|e| transport.map_transport_error(endpoint, e))
}

/// Returns `true` for 2xx responses.
pub fn is_success(response: &HttpResponse) -> bool {
	response.status().is_success()
}

/// Lossy UTF-8 rendering of a response body for error reports.
pub fn body_text(response: &HttpResponse) -> String {
	String::from_utf8_lossy(response.body()).into_owned()
}

/// Default classification shared by every transport.
pub fn map_generic_transport_error<E>(endpoint: &'static str, error: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other {
			endpoint,
			message: "Unknown HTTP client failure.".into(),
		}
		.into(),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Credential endpoints return results directly, so clients built by
/// [`ReqwestHttpClient::new`] never follow redirects. Configure any custom
/// [`ReqwestClient`] passed to [`ReqwestHttpClient::with_client`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with redirects disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}

	fn map_transport_error(
		&self,
		endpoint: &'static str,
		error: HttpClientError<ReqwestError>,
	) -> Error {
		match error {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::from(*inner).into(),
			error => map_generic_transport_error(endpoint, error),
		}
	}
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Response, StatusCode};
	// self
	use super::*;

	#[derive(Debug)]
	struct FakeError;
	impl Display for FakeError {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.write_str("fake")
		}
	}
	impl StdError for FakeError {}

	#[test]
	fn generic_mapping_classifies_each_variant() {
		let network = map_generic_transport_error::<FakeError>(
			"sts",
			HttpClientError::Reqwest(Box::new(FakeError)),
		);

		assert!(matches!(network, Error::Transport(TransportError::Network { endpoint: "sts", .. })));

		let io = map_generic_transport_error::<FakeError>(
			"token",
			HttpClientError::Io(std::io::Error::other("reset")),
		);

		assert!(matches!(io, Error::Transport(TransportError::Io(_))));

		let other =
			map_generic_transport_error::<FakeError>("api", HttpClientError::Other("boom".into()));

		assert!(matches!(
			other,
			Error::Transport(TransportError::Other { endpoint: "api", ref message }) if message == "boom"
		));
	}

	#[test]
	fn response_helpers_report_status_and_body() {
		let response = Response::builder()
			.status(StatusCode::FORBIDDEN)
			.body(b"<Error>denied</Error>".to_vec())
			.expect("Test response should build.");

		assert!(!is_success(&response));
		assert_eq!(body_text(&response), "<Error>denied</Error>");
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_client_builds_without_redirects() {
		assert!(ReqwestHttpClient::new().is_ok());
	}
}
