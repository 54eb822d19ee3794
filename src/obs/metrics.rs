//! Refresh counters: the global `spapi_auth_refresh_total` counter and per-manager tallies.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{CredentialKind, RefreshOutcome};

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(kind: CredentialKind, outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"spapi_auth_refresh_total",
			"credential" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Thread-safe counters for network exchanges performed by one credential manager.
///
/// Only calls that actually reach the provider are counted; cache hits are not.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of exchanges started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful exchanges.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self, kind: CredentialKind) {
		self.attempts.fetch_add(1, Ordering::Relaxed);

		record_refresh_outcome(kind, RefreshOutcome::Attempt);
	}

	pub(crate) fn record_success(&self, kind: CredentialKind) {
		self.success.fetch_add(1, Ordering::Relaxed);

		record_refresh_outcome(kind, RefreshOutcome::Success);
	}

	pub(crate) fn record_failure(&self, kind: CredentialKind) {
		self.failure.fetch_add(1, Ordering::Relaxed);

		record_refresh_outcome(kind, RefreshOutcome::Failure);
	}
}
