//! AWS Signature Version 4 primitives.
//!
//! Everything here is a pure function of the request, the credentials, and a [`SigningTime`]
//! captured once per signature, so the same inputs always yield the same `Authorization`
//! header.
//!
//! - [Signature Version 4 signing process](https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv4-create-signed-request.html)

// std
use std::fmt::Write;
// crates.io
use oauth2::{
	HttpRequest,
	http::{HeaderName, HeaderValue, header},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
// self
use crate::{
	_prelude::*,
	crypto,
	error::{ConfigError, SigningError},
};

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
/// Header carrying the signing timestamp.
pub const X_AMZ_DATE: &str = "x-amz-date";
/// Header carrying the hex SHA-256 of the payload.
pub const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
/// Header carrying the temporary session token.
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// AWS `UriEncode` set for paths: every byte except unreserved characters and `/`.
pub static AWS_URI_ENCODE_SET: AsciiSet =
	NON_ALPHANUMERIC.remove(b'/').remove(b'-').remove(b'.').remove(b'_').remove(b'~');
/// AWS `UriEncode` set for query keys and values: every byte except unreserved characters.
pub static AWS_QUERY_ENCODE_SET: AsciiSet =
	NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// One timestamp capture rendered in both forms SigV4 needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningTime {
	short: String,
	full: String,
}
impl SigningTime {
	/// Captures the current UTC instant.
	pub fn now() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}

	/// Renders `instant` (converted to UTC) as `YYYYMMDD` and `YYYYMMDDTHHMMSSZ`.
	pub fn new(instant: OffsetDateTime) -> Self {
		let utc = instant.to_offset(time::UtcOffset::UTC);
		let short = format!("{:04}{:02}{:02}", utc.year(), u8::from(utc.month()), utc.day());
		let full = format!("{short}T{:02}{:02}{:02}Z", utc.hour(), utc.minute(), utc.second());

		Self { short, full }
	}

	/// `YYYYMMDD`, used in the credential scope.
	pub fn short_date(&self) -> &str {
		&self.short
	}

	/// `YYYYMMDDTHHMMSSZ`, used in `x-amz-date` and the string to sign.
	pub fn full_date(&self) -> &str {
		&self.full
	}
}

/// Access key material used to sign one request.
#[derive(Clone, Copy)]
pub struct SigningCredentials<'a> {
	/// Access key identifier placed in the credential scope.
	pub access_key_id: &'a str,
	/// Secret used to derive the signing key.
	pub secret_access_key: &'a str,
	/// Session token for temporary credentials, sent as `x-amz-security-token`.
	pub session_token: Option<&'a str>,
}
impl Debug for SigningCredentials<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningCredentials")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &"<redacted>")
			.field("session_token", &self.session_token.map(|_| "<redacted>"))
			.finish()
	}
}

/// Canonical form of a request as defined by SigV4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequest {
	/// Upper-case HTTP method.
	pub method: String,
	/// Encoded absolute path.
	pub path: String,
	/// Encoded, sorted query string.
	pub query: String,
	/// Lower-case header names mapped to normalized values.
	pub headers: BTreeMap<String, String>,
	/// Hex SHA-256 of the payload.
	pub payload_hash: String,
}
impl CanonicalRequest {
	/// Canonicalizes `request`. All headers except `authorization` are signed.
	///
	/// The payload hash is taken from `x-amz-content-sha256` when present, otherwise computed
	/// from the body.
	pub fn from_request(request: &HttpRequest) -> Result<Self, SigningError> {
		let uri = request.uri();
		let decoded = percent_decode_str(uri.path()).decode_utf8()?;
		let path = if decoded.is_empty() {
			"/".to_owned()
		} else {
			utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string()
		};
		let query = canonical_query(
			url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
				.map(|(k, v)| (k.into_owned(), v.into_owned())),
		);
		let mut headers = BTreeMap::<String, String>::new();

		for (name, value) in request.headers() {
			if name == header::AUTHORIZATION {
				continue;
			}

			let value = value
				.to_str()
				.map_err(|_| SigningError::InvalidHeaderValue { name: name.to_string() })?;
			let value = normalize_header_value(value);

			headers
				.entry(name.as_str().to_owned())
				.and_modify(|existing| {
					existing.push(',');
					existing.push_str(&value);
				})
				.or_insert(value);
		}

		let payload_hash = match headers.get(X_AMZ_CONTENT_SHA_256) {
			Some(hash) => hash.clone(),
			None => crypto::hex_sha256(request.body()),
		};

		Ok(Self { method: request.method().as_str().to_owned(), path, query, headers, payload_hash })
	}

	/// Semicolon-joined signed header names.
	pub fn signed_headers(&self) -> String {
		self.headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
	}
}
impl Display for CanonicalRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		writeln!(f, "{}", self.method)?;
		writeln!(f, "{}", self.path)?;
		writeln!(f, "{}", self.query)?;

		for (name, value) in &self.headers {
			writeln!(f, "{name}:{value}")?;
		}

		writeln!(f)?;
		writeln!(f, "{}", self.signed_headers())?;
		write!(f, "{}", self.payload_hash)
	}
}

/// Signs requests for one service/region pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSigner {
	service: String,
	region: String,
}
impl RequestSigner {
	/// Creates a signer for `service` in `region`.
	pub fn new(service: impl Into<String>, region: impl Into<String>) -> Self {
		Self { service: service.into(), region: region.into() }
	}

	/// Service name placed in the credential scope.
	pub fn service(&self) -> &str {
		&self.service
	}

	/// Region placed in the credential scope.
	pub fn region(&self) -> &str {
		&self.region
	}

	/// `<short date>/<region>/<service>/aws4_request`.
	pub fn scope(&self, time: &SigningTime) -> String {
		format!("{}/{}/{}/aws4_request", time.short_date(), self.region, self.service)
	}

	/// Adds `host`, `x-amz-date`, `x-amz-security-token` (when a session token is present) and
	/// `authorization` to `request`.
	///
	/// Headers already on the request are signed as-is, so anything that must not be signed
	/// has to be added afterwards.
	pub fn sign(
		&self,
		request: &mut HttpRequest,
		credentials: &SigningCredentials<'_>,
		time: &SigningTime,
	) -> Result<()> {
		if !request.headers().contains_key(header::HOST) {
			let authority = request
				.uri()
				.authority()
				.ok_or_else(|| ConfigError::MissingHost { uri: request.uri().to_string() })?
				.as_str()
				.to_owned();

			insert_header(request, header::HOST, &authority, "host")?;
		}

		insert_header(request, HeaderName::from_static(X_AMZ_DATE), time.full_date(), X_AMZ_DATE)?;

		if let Some(token) = credentials.session_token {
			insert_sensitive_header(
				request,
				HeaderName::from_static(X_AMZ_SECURITY_TOKEN),
				token,
				X_AMZ_SECURITY_TOKEN,
			)?;
		}

		let canonical = CanonicalRequest::from_request(request)?;
		let scope = self.scope(time);
		let string_to_sign = string_to_sign(time, &scope, &canonical.to_string());
		let signing_key = derive_signing_key(
			credentials.secret_access_key,
			time.short_date(),
			&self.region,
			&self.service,
		)?;
		let signature = crypto::hex_hmac_sha256(&signing_key, string_to_sign.as_bytes())?;
		let authorization = authorization_header(
			credentials.access_key_id,
			&scope,
			&canonical.signed_headers(),
			&signature,
		);

		insert_sensitive_header(request, header::AUTHORIZATION, &authorization, "authorization")?;

		Ok(())
	}
}

/// Signs `request` for `service` in `region` at a fixed `time`.
///
/// Shorthand for [`RequestSigner::sign`] when no signer is kept around.
pub fn sign_request(
	request: &mut HttpRequest,
	credentials: &SigningCredentials<'_>,
	service: &str,
	region: &str,
	time: &SigningTime,
) -> Result<()> {
	RequestSigner::new(service, region).sign(request, credentials, time)
}

/// Percent-encodes each pair with the AWS query set, sorts by key (then value) and joins
/// them with `&`.
pub fn canonical_query<I, K, V>(pairs: I) -> String
where
	I: IntoIterator<Item = (K, V)>,
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut encoded = pairs
		.into_iter()
		.map(|(k, v)| {
			(
				utf8_percent_encode(k.as_ref(), &AWS_QUERY_ENCODE_SET).to_string(),
				utf8_percent_encode(v.as_ref(), &AWS_QUERY_ENCODE_SET).to_string(),
			)
		})
		.collect::<Vec<_>>();

	encoded.sort();

	let mut buf = String::new();

	for (idx, (k, v)) in encoded.iter().enumerate() {
		if idx > 0 {
			buf.push('&');
		}

		let _ = write!(buf, "{k}={v}");
	}

	buf
}

/// Builds the string to sign from the hashed canonical request.
pub fn string_to_sign(time: &SigningTime, scope: &str, canonical_request: &str) -> String {
	format!(
		"{ALGORITHM}\n{}\n{scope}\n{}",
		time.full_date(),
		crypto::hex_sha256(canonical_request.as_bytes())
	)
}

/// Derives the signing key through the four chained HMAC-SHA256 steps.
pub fn derive_signing_key(
	secret: &str,
	short_date: &str,
	region: &str,
	service: &str,
) -> Result<Vec<u8>, SigningError> {
	let date_key = crypto::hmac_sha256(format!("AWS4{secret}").as_bytes(), short_date.as_bytes())?;
	let region_key = crypto::hmac_sha256(&date_key, region.as_bytes())?;
	let service_key = crypto::hmac_sha256(&region_key, service.as_bytes())?;

	crypto::hmac_sha256(&service_key, b"aws4_request")
}

/// Renders the `Authorization` header value.
pub fn authorization_header(
	access_key_id: &str,
	scope: &str,
	signed_headers: &str,
	signature: &str,
) -> String {
	format!(
		"{ALGORITHM} Credential={access_key_id}/{scope}, SignedHeaders={signed_headers}, Signature={signature}"
	)
}

fn normalize_header_value(value: &str) -> String {
	value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn insert_header(
	request: &mut HttpRequest,
	name: HeaderName,
	value: &str,
	label: &'static str,
) -> Result<(), SigningError> {
	let value =
		HeaderValue::from_str(value).map_err(|_| SigningError::HeaderEncoding { name: label })?;

	request.headers_mut().insert(name, value);

	Ok(())
}

fn insert_sensitive_header(
	request: &mut HttpRequest,
	name: HeaderName,
	value: &str,
	label: &'static str,
) -> Result<(), SigningError> {
	let mut value =
		HeaderValue::from_str(value).map_err(|_| SigningError::HeaderEncoding { name: label })?;

	value.set_sensitive(true);
	request.headers_mut().insert(name, value);

	Ok(())
}
