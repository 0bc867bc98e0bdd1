//!
//! Single-flight gate around [`LedgerSyncWatcher`].
//!
//! At most one watcher run is in flight at any time. A caller arriving while a run is in
//! flight joins it: it waits for that run to finish and receives its outcome instead of
//! starting a redundant run. The joining caller's own [`SyncOptions`] are not applied to the
//! run it joins.

use crate::sync::cancel::CancelSignal;
use crate::sync::ledger::LedgerSyncWatcher;
use crate::sync::types::{SyncError, SyncOptions, SyncPolicy, SyncReport};

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// `None` while the run is in flight, then the run's outcome.
type RunOutcome = Option<Result<(), RunFailure>>;

/// What a joiner learns about a failed run.
#[derive(Debug, Clone)]
struct RunFailure {
	message: String,
	fatal: bool,
}

impl RunFailure {
	fn interrupted() -> Self {
		Self {
			message: "sync run was interrupted".to_string(),
			fatal: false,
		}
	}

	fn into_error(self) -> SyncError {
		SyncError::SharedRunFailed {
			message: self.message,
			fatal: self.fatal,
		}
	}
}

/// Observable state of a [`SyncGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
	Idle,
	Running,
}

struct InFlight {
	options: SyncOptions,
	done_rx: watch::Receiver<RunOutcome>,
}

enum Entry<'a> {
	Run(RunGuard<'a>),
	Join(SyncOptions, watch::Receiver<RunOutcome>),
}

/// Owns the in-flight slot for the duration of one run.
///
/// Dropping the guard frees the slot and publishes the outcome, so the gate returns to
/// `Idle` on success, on error, and when the running future is dropped mid-run.
struct RunGuard<'a> {
	slot: &'a Mutex<Option<InFlight>>,
	done_tx: watch::Sender<RunOutcome>,
	outcome: Option<Result<(), RunFailure>>,
}

impl RunGuard<'_> {
	fn record(&mut self, result: &Result<SyncReport, SyncError>) {
		self.outcome = Some(match result {
			Ok(_) => Ok(()),
			Err(e) => Err(RunFailure {
				message: e.to_string(),
				fatal: e.is_fatal(),
			}),
		});
	}
}

impl Drop for RunGuard<'_> {
	fn drop(&mut self) {
		lock(self.slot).take();
		let outcome = self
			.outcome
			.take()
			.unwrap_or_else(|| Err(RunFailure::interrupted()));
		self.done_tx.send_replace(Some(outcome));
	}
}

fn lock(slot: &Mutex<Option<InFlight>>) -> MutexGuard<'_, Option<InFlight>> {
	slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-flight coordinator for ledger sync waits.
pub struct SyncGate {
	watcher: LedgerSyncWatcher,
	policy: SyncPolicy,
	slot: Mutex<Option<InFlight>>,
}

impl SyncGate {
	pub fn new(watcher: LedgerSyncWatcher, policy: SyncPolicy) -> Self {
		Self {
			watcher,
			policy,
			slot: Mutex::new(None),
		}
	}

	pub fn state(&self) -> GateState {
		if lock(&self.slot).is_some() {
			GateState::Running
		} else {
			GateState::Idle
		}
	}

	fn enter(&self, options: SyncOptions) -> Entry<'_> {
		let mut slot = lock(&self.slot);
		if let Some(in_flight) = slot.as_ref() {
			return Entry::Join(in_flight.options, in_flight.done_rx.clone());
		}

		let (done_tx, done_rx) = watch::channel(None);
		*slot = Some(InFlight { options, done_rx });
		Entry::Run(RunGuard {
			slot: &self.slot,
			done_tx,
			outcome: None,
		})
	}

	/// Wait until the registry and the ledger agree, sharing any run already in flight.
	///
	/// With the bypass policy this returns immediately without touching any source. A
	/// joiner's `timeout` bounds only its own wait; the run it joined carries on.
	pub async fn await_sync(
		&self,
		options: SyncOptions,
		cancel: &CancelSignal,
	) -> Result<SyncReport, SyncError> {
		if self.policy.bypass_sync {
			debug!("Sync bypass enabled, skipping ledger sync wait");
			return Ok(SyncReport::bypassed());
		}

		match self.enter(options) {
			Entry::Run(mut guard) => {
				let result = self.watcher.wait_for_sync(options, cancel).await;
				guard.record(&result);
				result
			}
			Entry::Join(running_options, done_rx) => {
				if options.throw_on_empty_registry && !running_options.throw_on_empty_registry {
					warn!(
						"Joining a sync run that does not check for an empty registry; \
						 the empty-registry requirement is not enforced for this wait"
					);
				}
				debug!("Sync already in progress, joining it");
				match options.timeout {
					Some(limit) => tokio::time::timeout(limit, Self::join(done_rx, cancel))
						.await
						.unwrap_or_else(|_| {
							warn!("Gave up waiting for the shared sync run after {:?}", limit);
							Err(SyncError::Cancelled)
						}),
					None => Self::join(done_rx, cancel).await,
				}
			}
		}
	}

	async fn join(
		mut done_rx: watch::Receiver<RunOutcome>,
		cancel: &CancelSignal,
	) -> Result<SyncReport, SyncError> {
		let outcome = tokio::select! {
			outcome = done_rx.wait_for(Option::is_some) => outcome.map(|o| o.clone()),
			_ = cancel.cancelled() => return Err(SyncError::Cancelled),
		};

		match outcome {
			Ok(Some(Ok(()))) => Ok(SyncReport {
				joined: true,
				..SyncReport::default()
			}),
			Ok(Some(Err(failure))) => Err(failure.into_error()),
			Ok(None) | Err(_) => Err(RunFailure::interrupted().into_error()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::mock::{MockLedger, MockRegistry, home_organization};
	use std::sync::Arc;
	use std::time::Duration;

	fn gate(registry: &MockRegistry, ledger: &MockLedger, policy: SyncPolicy) -> SyncGate {
		SyncGate::new(
			LedgerSyncWatcher::new(Arc::new(registry.clone()), Arc::new(ledger.clone())),
			policy,
		)
	}

	#[tokio::test(start_paused = true)]
	async fn releases_after_success() {
		let home = home_organization();
		let registry = MockRegistry::with_home(home.clone());
		let ledger = MockLedger::converged_with(&home);
		let gate = gate(&registry, &ledger, SyncPolicy::production());

		assert_eq!(gate.state(), GateState::Idle);
		gate.await_sync(SyncOptions::default(), &CancelSignal::new())
			.await
			.unwrap();
		assert_eq!(gate.state(), GateState::Idle);
	}

	#[tokio::test(start_paused = true)]
	async fn releases_after_fatal_error() {
		let home = home_organization();
		let registry = MockRegistry::with_home(home.clone());
		let ledger = MockLedger::converged_with(&home);
		ledger.set_root(&home.registry_id, crate::sync::EMPTY_TREE_HASH, true);
		let gate = gate(&registry, &ledger, SyncPolicy::production());

		let result = gate
			.await_sync(SyncOptions::default().require_registry(), &CancelSignal::new())
			.await;
		assert!(matches!(result, Err(SyncError::EmptyRegistry { .. })));
		assert_eq!(gate.state(), GateState::Idle);
	}

	#[tokio::test(start_paused = true)]
	async fn releases_when_the_run_is_dropped() {
		let registry = MockRegistry::new();
		let ledger = MockLedger::new();
		let gate = gate(&registry, &ledger, SyncPolicy::production());
		let cancel = CancelSignal::new();

		let abandoned = tokio::time::timeout(
			Duration::from_secs(7),
			gate.await_sync(SyncOptions::default(), &cancel),
		)
		.await;
		assert!(abandoned.is_err());
		assert_eq!(gate.state(), GateState::Idle);
	}

	#[tokio::test(start_paused = true)]
	async fn bypass_never_polls() {
		let registry = MockRegistry::new();
		let ledger = MockLedger::new();
		let gate = gate(&registry, &ledger, SyncPolicy::test_mode());

		let report = gate
			.await_sync(SyncOptions::default(), &CancelSignal::new())
			.await
			.unwrap();
		assert!(report.bypassed);
		assert_eq!(registry.home_calls(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn joiner_receives_the_runs_failure() {
		let home = home_organization();
		let registry = MockRegistry::with_home(home.clone());
		registry.set_home_delay(Duration::from_secs(1));
		let ledger = MockLedger::converged_with(&home);
		ledger.set_root(&home.registry_id, crate::sync::EMPTY_TREE_HASH, true);
		let gate = gate(&registry, &ledger, SyncPolicy::production());
		let cancel = CancelSignal::new();

		let (runner, joiner) = tokio::join!(
			gate.await_sync(SyncOptions::default().require_registry(), &cancel),
			gate.await_sync(SyncOptions::default(), &cancel),
		);

		assert!(matches!(runner, Err(SyncError::EmptyRegistry { .. })));
		assert!(matches!(joiner, Err(SyncError::SharedRunFailed { .. })));
		assert_eq!(registry.home_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn joiner_inherits_a_fatal_failure() {
		let home = home_organization();
		let registry = MockRegistry::with_home(home.clone());
		registry.set_home_delay(Duration::from_secs(1));
		let ledger = MockLedger::converged_with(&home);
		ledger.set_root(&home.registry_id, crate::sync::EMPTY_TREE_HASH, true);
		let gate = gate(&registry, &ledger, SyncPolicy::production());
		let cancel = CancelSignal::new();

		let (runner, joiner) = tokio::join!(
			gate.await_sync(SyncOptions::default().require_registry(), &cancel),
			gate.await_sync(SyncOptions::default().require_registry(), &cancel),
		);

		assert!(runner.unwrap_err().is_fatal());
		let joiner = joiner.unwrap_err();
		assert!(matches!(joiner, SyncError::SharedRunFailed { fatal: true, .. }));
		assert!(joiner.is_fatal());
	}

	#[tokio::test(start_paused = true)]
	async fn joiner_timeout_bounds_only_its_own_wait() {
		let registry = MockRegistry::new();
		let ledger = MockLedger::new();
		let gate = Arc::new(gate(&registry, &ledger, SyncPolicy::production()));
		let cancel = CancelSignal::new();

		let runner = {
			let gate = gate.clone();
			let cancel = cancel.clone();
			tokio::spawn(async move { gate.await_sync(SyncOptions::default(), &cancel).await })
		};
		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(gate.state(), GateState::Running);

		let start = tokio::time::Instant::now();
		let joiner = gate
			.await_sync(
				SyncOptions::default().with_timeout(Duration::from_secs(10)),
				&cancel,
			)
			.await;

		assert!(matches!(joiner, Err(SyncError::Cancelled)));
		assert_eq!(start.elapsed(), Duration::from_secs(10));
		// The run itself is still polling for the home organization.
		assert_eq!(gate.state(), GateState::Running);
		assert!(!runner.is_finished());

		cancel.cancel();
		assert!(matches!(runner.await.unwrap(), Err(SyncError::Cancelled)));
		assert_eq!(gate.state(), GateState::Idle);
	}
}
