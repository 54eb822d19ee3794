//! Optional observability helpers for credential lifecycles.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `spapi_auth.credential` with the
//!   `credential` (lifecycle) and `stage` (call site) fields, plus warning events when a
//!   refresh fails.
//! - Enable `metrics` to increment the `spapi_auth_refresh_total` counter for every
//!   attempt/success/failure, labeled by `credential` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Credential lifecycles observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// OAuth bearer token exchange and refresh.
	OAuth,
	/// AWS AssumeRole temporary credentials.
	AssumeRole,
	/// Readiness-gate initialization.
	Initialization,
}
impl CredentialKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::OAuth => "oauth",
			CredentialKind::AssumeRole => "assume_role",
			CredentialKind::Initialization => "initialization",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry to a refresh or exchange.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
