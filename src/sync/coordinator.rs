//! Sync coordinator and integration point for the write-operation flows.
//!
//! `SyncCoordinator` owns one [`SyncGate`] and the two bounded watchers, and wires them
//! around the registry writes that need them:
//!
//! - recording the last processed block height waits for the wallet to settle and for the
//!   registry to agree with the ledger, before and after the write;
//! - committing staged data waits for the registry to agree with the ledger, commits, then
//!   waits for the staging queue to drain.
//!
//! The coordinator is the only owner of the gate, so every sync wait in the process goes
//! through the same single-flight slot.

use crate::client::{ClientError, DataLayerClient, RegistryClient, WalletClient};
use crate::sync::cancel::CancelSignal;
use crate::sync::confirmation::TransactionConfirmationWatcher;
use crate::sync::gate::{GateState, SyncGate};
use crate::sync::ledger::LedgerSyncWatcher;
use crate::sync::retry::RetryExecutor;
use crate::sync::sources::{
	LedgerNode, RegistryMetadataSource, RegistryWriter, StagingQueueSource, TransactionSource,
	WalletService,
};
use crate::sync::types::{
	LEDGER_POLL_INTERVAL, PollSettings, RetryBudget, SyncError, SyncOptions, SyncPolicy,
	SyncReport,
};
use crate::sync::warehouse::WarehouseRegistrationWatcher;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The collaborators a coordinator talks to.
#[derive(Clone)]
pub struct SyncSources {
	pub registry: Arc<dyn RegistryMetadataSource>,
	pub staging: Arc<dyn StagingQueueSource>,
	pub writer: Arc<dyn RegistryWriter>,
	pub ledger: Arc<dyn LedgerNode>,
	pub transactions: Arc<dyn TransactionSource>,
	pub wallet: Arc<dyn WalletService>,
}

impl SyncSources {
	/// Wire the production HTTP clients into their capability slots.
	pub fn from_clients(
		registry: RegistryClient,
		datalayer: DataLayerClient,
		wallet: WalletClient,
	) -> Self {
		let registry = Arc::new(registry);
		let wallet = Arc::new(wallet);
		Self {
			registry: registry.clone(),
			staging: registry.clone(),
			writer: registry,
			ledger: Arc::new(datalayer),
			transactions: wallet.clone(),
			wallet,
		}
	}
}

/// Timings and policy for a coordinator.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
	pub policy: SyncPolicy,
	pub ledger_poll_interval: Duration,
	pub confirmation: PollSettings,
	pub retry: RetryBudget,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			policy: SyncPolicy::production(),
			ledger_poll_interval: LEDGER_POLL_INTERVAL,
			confirmation: PollSettings::default(),
			retry: RetryBudget::default(),
		}
	}
}

/// Runs write operations with the sync waits they depend on.
pub struct SyncCoordinator {
	gate: SyncGate,
	transactions: TransactionConfirmationWatcher,
	warehouse: WarehouseRegistrationWatcher,
	wallet: Arc<dyn WalletService>,
	writer: Arc<dyn RegistryWriter>,
	retry: RetryExecutor,
	policy: SyncPolicy,
	cancel: CancelSignal,
}

impl SyncCoordinator {
	pub fn new(sources: SyncSources, settings: SyncSettings) -> Self {
		let watcher = LedgerSyncWatcher::new(sources.registry, sources.ledger)
			.with_interval(settings.ledger_poll_interval);
		let cancel = CancelSignal::new();

		Self {
			gate: SyncGate::new(watcher, settings.policy),
			transactions: TransactionConfirmationWatcher::new(
				sources.transactions,
				settings.confirmation,
				settings.policy,
			)
			.with_cancel(cancel.clone()),
			warehouse: WarehouseRegistrationWatcher::new(
				sources.staging,
				settings.confirmation,
				settings.policy,
			)
			.with_cancel(cancel.clone()),
			wallet: sources.wallet,
			writer: sources.writer,
			retry: RetryExecutor::new(settings.retry),
			policy: settings.policy,
			cancel,
		}
	}

	/// Handle for aborting in-flight and future sync waits from another task.
	pub fn cancel_signal(&self) -> CancelSignal {
		self.cancel.clone()
	}

	/// Abort every in-flight wait (sync, confirmation, registration, wallet) and every
	/// later one.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn gate_state(&self) -> GateState {
		self.gate.state()
	}

	/// Wait until the registry's metadata agrees with the ledger.
	pub async fn await_sync(&self, options: SyncOptions) -> Result<SyncReport, SyncError> {
		self.gate.await_sync(options, &self.cancel).await
	}

	/// Wait for a wallet transaction to be confirmed; `Ok(false)` when the watcher gave up.
	pub async fn confirm_transaction(&self, transaction_id: &str) -> Result<bool, SyncError> {
		self.transactions.wait_for_confirmation(transaction_id).await
	}

	/// Wait for staged changes to leave the registry's pending queue.
	pub async fn wait_for_warehouse_registration(&self) -> Result<bool, SyncError> {
		self.warehouse.wait_for_registration().await
	}

	async fn wait_for_wallet(&self) -> Result<(), SyncError> {
		if self.policy.bypass_sync {
			return Ok(());
		}
		tokio::select! {
			result = self.wallet.wait_for_all_transactions_to_confirm() => Ok(result?),
			_ = self.cancel.cancelled() => {
				info!("Wallet wait cancelled");
				Err(SyncError::Cancelled)
			}
		}
	}

	/// Record the last processed block height in the registry.
	///
	/// The write is retried within the configured budget; a rejected API key is not.
	pub async fn set_last_processed_height(&self, height: u64) -> Result<(), SyncError> {
		self.wait_for_wallet().await?;
		self.await_sync(SyncOptions::default()).await?;

		self.retry
			.run_while(
				move || self.writer.set_last_processed_height(height),
				|e: &ClientError| !e.is_fatal(),
			)
			.await?;

		self.wait_for_wallet().await?;
		self.await_sync(SyncOptions::default()).await?;
		info!("Last processed height set to {}", height);
		Ok(())
	}

	/// Commit staged registry changes and wait for them to register.
	///
	/// Returns the registration watcher's result; a commit is never retried because it is
	/// not idempotent.
	pub async fn commit_staging_data(&self) -> Result<bool, SyncError> {
		self.await_sync(SyncOptions::default()).await?;
		self.writer.commit_staging().await?;

		let registered = self.wait_for_warehouse_registration().await?;
		if !registered {
			warn!("Staged changes did not register before the confirmation ceiling");
		}
		Ok(registered)
	}
}
