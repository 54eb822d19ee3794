//! Credential managers that own one credential lifecycle each.
//!
//! Both managers publish immutable snapshots through a `parking_lot::RwLock<Arc<_>>` and
//! serialize refreshes behind an `async_lock::Mutex`, re-checking freshness once the lock is
//! held so late callers reuse the result of the refresh they waited on.

pub mod aws;
pub mod oauth;

pub use aws::*;
pub use oauth::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	config::ConfigBuildError,
	error::ConfigError,
	obs::CredentialKind,
};

/// Freshness of the credential held by a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialState {
	/// Credential is usable without a refresh.
	Fresh,
	/// A refresh is in flight.
	Refreshing,
	/// Credential is missing or must be refreshed before use.
	Expired,
}

/// Marks a manager as refreshing for as long as the guard lives.
pub(crate) struct RefreshingFlag<'a>(&'a AtomicBool);
impl<'a> RefreshingFlag<'a> {
	pub(crate) fn raise(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::Release);

		Self(flag)
	}
}
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub(crate) fn is_refreshing(flag: &AtomicBool) -> bool {
	flag.load(Ordering::Acquire)
}

/// Runs `fut`, failing with [`Error::CredentialRefreshTimeout`] once `timeout` elapses.
///
/// A non-positive `timeout` is rejected before `fut` is polled.
pub(crate) async fn bounded<F, T>(credential: CredentialKind, timeout: Duration, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let limit = std::time::Duration::try_from(timeout)
		.ok()
		.filter(|limit| !limit.is_zero())
		.ok_or(ConfigError::from(ConfigBuildError::NonPositiveDuration {
			field: "refresh_timeout",
		}))?;

	match tokio::time::timeout(limit, fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::CredentialRefreshTimeout { credential, timeout }),
	}
}
