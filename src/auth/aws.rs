//! Long-lived IAM keys and the temporary role credentials obtained from STS.

// self
use crate::{_prelude::*, auth::secret::TokenSecret, sigv4::SigningCredentials};

/// Long-lived IAM user keys. Only used to sign `AssumeRole`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwsCredentials {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: TokenSecret,
}
impl AwsCredentials {
	/// Wraps a key pair.
	pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<TokenSecret>) -> Self {
		Self { access_key_id: access_key_id.into(), secret_access_key: secret_access_key.into() }
	}

	/// Borrows the pair as signing input without a session token.
	pub fn signing(&self) -> SigningCredentials<'_> {
		SigningCredentials {
			access_key_id: &self.access_key_id,
			secret_access_key: self.secret_access_key.expose(),
			session_token: None,
		}
	}
}

/// Role credentials returned by `AssumeRole`.
///
/// The [`Default`] value (empty strings, epoch expiry) means "never fetched".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryAwsCredentials {
	/// Temporary access key identifier.
	pub access_key_id: String,
	/// Temporary secret access key.
	pub secret_access_key: TokenSecret,
	/// Session token sent as `x-amz-security-token`.
	pub session_token: TokenSecret,
	/// Server-issued expiration.
	pub expires_at: OffsetDateTime,
}
impl TemporaryAwsCredentials {
	/// Returns `true` for the never-fetched value.
	pub fn is_zero(&self) -> bool {
		self.access_key_id.is_empty()
	}

	/// Returns `true` once `instant` is at or past the expiration.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.is_zero() || self.expires_at <= instant
	}

	/// Returns `true` when less than `margin` of life remains at `instant`.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		self.is_zero()
			|| self.expires_at.checked_sub(margin).is_none_or(|refresh_at| refresh_at <= instant)
	}

	/// Borrows the credentials as signing input, session token included.
	pub fn signing(&self) -> SigningCredentials<'_> {
		SigningCredentials {
			access_key_id: &self.access_key_id,
			secret_access_key: self.secret_access_key.expose(),
			session_token: Some(self.session_token.expose()),
		}
	}

	/// Copy of these credentials marked as expired.
	pub fn expired_copy(&self) -> Self {
		Self { expires_at: OffsetDateTime::UNIX_EPOCH, ..self.clone() }
	}
}
impl Default for TemporaryAwsCredentials {
	fn default() -> Self {
		Self {
			access_key_id: String::new(),
			secret_access_key: TokenSecret::default(),
			session_token: TokenSecret::default(),
			expires_at: OffsetDateTime::UNIX_EPOCH,
		}
	}
}
