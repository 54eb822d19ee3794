//! `tracing` spans and events for credential lifecycles; no-ops when the feature is off.
//!
//! Each span starts with an empty `outcome` field that the caller fills in once the
//! exchange settles, so a single span line shows both the call site and its result.

// self
use crate::{
	_prelude::*,
	obs::{CredentialKind, RefreshOutcome},
};

/// Future returned by [`CredentialSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedCredential<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`CredentialSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCredential<F> = F;

/// `spapi_auth.credential` span opened around one refresh or initialization.
#[derive(Clone, Debug)]
pub struct CredentialSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CredentialSpan {
	/// Opens a span for `kind` at call site `stage`.
	pub fn new(kind: CredentialKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"spapi_auth.credential",
				credential = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records how the refresh under this span ended.
	pub fn record_outcome(&self, outcome: RefreshOutcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}

	/// Records the outcome carried by `result` and hands it back.
	pub fn settle<T>(&self, result: Result<T>) -> Result<T> {
		self.record_outcome(match result {
			Ok(_) => RefreshOutcome::Success,
			Err(_) => RefreshOutcome::Failure,
		});

		result
	}

	/// Runs `fut` inside the span without holding an entered guard across `.await`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCredential<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn warn_event(kind: CredentialKind, message: &'static str, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(credential = kind.as_str(), %error, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, message, error);
	}
}

pub(crate) fn debug_event(kind: CredentialKind, message: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(credential = kind.as_str(), "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, message);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_are_noops_without_a_subscriber() {
		warn_event(CredentialKind::AssumeRole, "refresh failed", &Error::NotReady);
		debug_event(CredentialKind::OAuth, "token refreshed");
	}

	#[test]
	fn settle_returns_the_result_unchanged() {
		let span = CredentialSpan::new(CredentialKind::AssumeRole, "settle");

		assert_eq!(span.settle(Ok(3)).expect("Success should pass through."), 3);
		assert!(matches!(span.settle::<()>(Err(Error::NotReady)), Err(Error::NotReady)));
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CredentialSpan::new(CredentialKind::OAuth, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		span.record_outcome(RefreshOutcome::Success);

		assert_eq!(value, 42);
	}
}
