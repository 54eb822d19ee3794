//! Readiness gate serializing access to credentials that are still being initialized.
//!
//! The gate moves `NotReady → Initializing → Ready`; a failed initialization publishes
//! `Failed` and a later call may start over. `Ready` is terminal: credential freshness after
//! that point is handled per call by the credential managers, so a refresh failure only
//! fails the request that hit it.

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	error::Subsystem,
	obs::{self, CredentialKind, CredentialSpan, RefreshOutcome},
};

/// Lifecycle of the shared credential state.
#[derive(Clone, Debug)]
pub enum ReadinessState {
	/// Nobody has started initialization.
	NotReady,
	/// An initializer is running; callers wait for it.
	Initializing,
	/// Credentials are available.
	Ready,
	/// The last initialization failed in `subsystem`.
	Failed {
		/// Subsystem whose initialization failed.
		subsystem: Subsystem,
		/// Failure shared with every waiter.
		source: Arc<Error>,
	},
}
impl ReadinessState {
	/// Returns `true` for [`ReadinessState::Ready`].
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready)
	}

	/// The broadcast error for a failed state.
	pub fn error(&self) -> Option<Error> {
		match self {
			Self::Failed { subsystem, source } =>
				Some(Error::Initialization { subsystem: *subsystem, source: source.clone() }),
			_ => None,
		}
	}
}

/// Async readiness gate backed by a `tokio::sync::watch` channel.
#[derive(Debug)]
pub struct ReadinessGate {
	state: watch::Sender<ReadinessState>,
}
impl ReadinessGate {
	/// Creates a gate in [`ReadinessState::NotReady`].
	pub fn new() -> Self {
		Self { state: watch::Sender::new(ReadinessState::NotReady) }
	}

	/// Current state snapshot.
	pub fn state(&self) -> ReadinessState {
		self.state.borrow().clone()
	}

	/// Returns `true` once initialization has succeeded.
	pub fn is_ready(&self) -> bool {
		self.state.borrow().is_ready()
	}

	/// Subscribes to state transitions.
	pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
		self.state.subscribe()
	}

	/// Makes the gate ready, running `init` when no initialization is in progress.
	///
	/// - `Ready` returns immediately.
	/// - `Initializing` waits for the running initializer and reports its outcome.
	/// - `NotReady` or `Failed` claims the gate and runs `init`.
	///
	/// If the running initializer is dropped before it finishes, the gate falls back to
	/// `NotReady` and one of the waiters takes over.
	pub async fn ensure_ready<F, Fut>(&self, init: F) -> Result<()>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<(), (Subsystem, Error)>>,
	{
		loop {
			if self.is_ready() {
				return Ok(());
			}
			if self.try_claim() {
				return self.run(init).await;
			}

			let mut rx = self.state.subscribe();
			let settled = rx
				.wait_for(|state| !matches!(state, ReadinessState::Initializing))
				.await
				.map_err(|_| Error::NotReady)?
				.clone();

			match settled {
				ReadinessState::Ready => return Ok(()),
				ReadinessState::Failed { subsystem, source } =>
					return Err(Error::Initialization { subsystem, source }),
				ReadinessState::NotReady | ReadinessState::Initializing => continue,
			}
		}
	}

	/// Waits until the gate is `Ready` or `Failed` without starting initialization.
	pub async fn wait_ready(&self) -> Result<()> {
		let mut rx = self.state.subscribe();
		let settled = rx
			.wait_for(|state| matches!(state, ReadinessState::Ready | ReadinessState::Failed { .. }))
			.await
			.map_err(|_| Error::NotReady)?
			.clone();

		match settled.error() {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	fn try_claim(&self) -> bool {
		self.state.send_if_modified(|state| match state {
			ReadinessState::NotReady | ReadinessState::Failed { .. } => {
				*state = ReadinessState::Initializing;

				true
			},
			ReadinessState::Initializing | ReadinessState::Ready => false,
		})
	}

	async fn run<F, Fut>(&self, init: F) -> Result<()>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<(), (Subsystem, Error)>>,
	{
		let _abandon = AbandonGuard(&self.state);
		let span = CredentialSpan::new(CredentialKind::Initialization, "ensure_ready");

		obs::record_refresh_outcome(CredentialKind::Initialization, RefreshOutcome::Attempt);

		match span.instrument(init()).await {
			Ok(()) => {
				self.state.send_replace(ReadinessState::Ready);
				span.record_outcome(RefreshOutcome::Success);
				obs::record_refresh_outcome(CredentialKind::Initialization, RefreshOutcome::Success);
				obs::debug_event(CredentialKind::Initialization, "Credentials are ready.");

				Ok(())
			},
			Err((subsystem, e)) => {
				let source = Arc::new(e);
				let err = Error::Initialization { subsystem, source: source.clone() };

				span.record_outcome(RefreshOutcome::Failure);
				obs::record_refresh_outcome(CredentialKind::Initialization, RefreshOutcome::Failure);
				obs::warn_event(CredentialKind::Initialization, "Initialization failed.", &err);
				self.state.send_replace(ReadinessState::Failed { subsystem, source });

				Err(err)
			},
		}
	}
}
impl Default for ReadinessGate {
	fn default() -> Self {
		Self::new()
	}
}

// Resets an abandoned `Initializing` state so waiters can take over.
struct AbandonGuard<'a>(&'a watch::Sender<ReadinessState>);
impl Drop for AbandonGuard<'_> {
	fn drop(&mut self) {
		self.0.send_if_modified(|state| {
			if matches!(state, ReadinessState::Initializing) {
				*state = ReadinessState::NotReady;

				true
			} else {
				false
			}
		});
	}
}
