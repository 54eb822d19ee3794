//! OAuth bearer token sets, lifecycle status, and builders.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Margin subtracted from the provider-reported lifetime so tokens are refreshed before the
/// provider rejects them.
pub const EXPIRY_MARGIN: Duration = Duration::seconds(600);

/// Current lifecycle status for a bearer token set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// No exchange has completed yet; both tokens are empty.
	Uninitialized,
	/// Token is usable.
	Active,
	/// Token reached its margin-adjusted expiry.
	Expired,
}

/// Errors produced by [`BearerTokenSetBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BearerTokenSetBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative lifetime does not fit the supported date range.
	#[error("Token lifetime of {lifetime} is out of range.")]
	LifetimeOutOfRange {
		/// Lifetime that was rejected.
		lifetime: Duration,
	},
}

/// Access/refresh token pair issued by one exchange.
///
/// Sets are immutable; a refresh replaces the whole set.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerTokenSet {
	/// Access token sent as `x-amz-access-token`.
	pub access_token: TokenSecret,
	/// Refresh token used for the next exchange.
	pub refresh_token: TokenSecret,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Margin-adjusted expiry instant.
	pub expires_at: OffsetDateTime,
}
impl BearerTokenSet {
	/// Returns a builder.
	pub fn builder() -> BearerTokenSetBuilder {
		BearerTokenSetBuilder::default()
	}

	/// Empty set representing "no exchange has completed".
	pub fn uninitialized() -> Self {
		Self {
			access_token: TokenSecret::default(),
			refresh_token: TokenSecret::default(),
			issued_at: OffsetDateTime::UNIX_EPOCH,
			expires_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	/// Returns `true` when either token is empty.
	pub fn is_uninitialized(&self) -> bool {
		self.access_token.is_empty() || self.refresh_token.is_empty()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.is_uninitialized() {
			return TokenStatus::Uninitialized;
		}
		if self.expires_at < instant {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Status relative to the current UTC clock.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the set is expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Copy of this set whose expiry is pushed into the past, forcing the next read to refresh.
	pub fn expired_copy(&self) -> Self {
		Self { expires_at: OffsetDateTime::UNIX_EPOCH, ..self.clone() }
	}
}
impl Debug for BearerTokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerTokenSet")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`BearerTokenSet`].
#[derive(Clone, Debug, Default)]
pub struct BearerTokenSetBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl BearerTokenSetBuilder {
	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant, used verbatim.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the provider-reported lifetime; [`EXPIRY_MARGIN`] is subtracted on build.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Consumes the builder and produces a [`BearerTokenSet`].
	pub fn build(self) -> Result<BearerTokenSet, BearerTokenSetBuilderError> {
		let access_token =
			self.access_token.ok_or(BearerTokenSetBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(BearerTokenSetBuilderError::MissingRefreshToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(lifetime)) => issued_at
				.checked_add(lifetime)
				.and_then(|instant| instant.checked_sub(EXPIRY_MARGIN))
				.ok_or(BearerTokenSetBuilderError::LifetimeOutOfRange { lifetime })?,
			(None, None) => return Err(BearerTokenSetBuilderError::MissingExpiry),
		};

		Ok(BearerTokenSet { access_token, refresh_token, issued_at, expires_at })
	}
}
