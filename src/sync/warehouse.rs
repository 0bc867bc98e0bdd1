//! Staging queue drain watcher.
//!
//! After a commit the registry reports pending changes until the warehouse has taken them
//! in. This is the same bounded sleep-then-sample loop as transaction confirmation.

use crate::sync::cancel::CancelSignal;
use crate::sync::confirmation::poll_bounded;
use crate::sync::sources::StagingQueueSource;
use crate::sync::types::{PollSettings, SyncError, SyncPolicy};

use std::sync::Arc;
use tracing::{debug, info};

/// Waits for the registry's staging queue to drain after a commit.
///
/// Same polling contract as
/// [`TransactionConfirmationWatcher`](crate::sync::TransactionConfirmationWatcher):
/// `Ok(false)` when the ceiling is reached, `Err` only for fatal client errors.
pub struct WarehouseRegistrationWatcher {
	source: Arc<dyn StagingQueueSource>,
	settings: PollSettings,
	policy: SyncPolicy,
	cancel: CancelSignal,
}

impl WarehouseRegistrationWatcher {
	pub fn new(
		source: Arc<dyn StagingQueueSource>,
		settings: PollSettings,
		policy: SyncPolicy,
	) -> Self {
		Self {
			source,
			settings,
			policy,
			cancel: CancelSignal::new(),
		}
	}

	pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
		self.cancel = cancel;
		self
	}

	pub async fn wait_for_registration(&self) -> Result<bool, SyncError> {
		if self.policy.bypass_sync {
			debug!("Sync bypass enabled, skipping warehouse registration wait");
			return Ok(true);
		}

		info!("Waiting for staged changes to register with the warehouse");
		poll_bounded(self.settings, "Warehouse registration", &self.cancel, move || {
			self.source.staging_confirmed()
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::mock::{MockRegistry, MockReply};

	fn watcher(registry: &MockRegistry, policy: SyncPolicy) -> WarehouseRegistrationWatcher {
		WarehouseRegistrationWatcher::new(Arc::new(registry.clone()), PollSettings::default(), policy)
	}

	#[tokio::test(start_paused = true)]
	async fn confirmed_on_final_attempt() {
		let registry = MockRegistry::new();
		for _ in 0..59 {
			registry.push_staging(MockReply::Value(false));
		}
		registry.push_staging(MockReply::Value(true));

		let registered = watcher(&registry, SyncPolicy::production())
			.wait_for_registration()
			.await
			.unwrap();

		assert!(registered);
		assert_eq!(registry.staging_calls(), 60);
	}

	#[tokio::test(start_paused = true)]
	async fn never_drains() {
		let registry = MockRegistry::new();
		registry.push_staging(MockReply::Value(false));

		let registered = watcher(&registry, SyncPolicy::production())
			.wait_for_registration()
			.await
			.unwrap();

		assert!(!registered);
		assert_eq!(registry.staging_calls(), 60);
	}

	#[tokio::test(start_paused = true)]
	async fn already_cancelled_signal_stops_before_polling() {
		let registry = MockRegistry::new();
		let cancel = CancelSignal::new();
		cancel.cancel();

		let result = watcher(&registry, SyncPolicy::production())
			.with_cancel(cancel)
			.wait_for_registration()
			.await;

		assert!(matches!(result, Err(SyncError::Cancelled)));
		assert_eq!(registry.staging_calls(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_mode_skips_polling() {
		let registry = MockRegistry::new();
		registry.push_staging(MockReply::Value(false));

		let registered = watcher(&registry, SyncPolicy::test_mode())
			.wait_for_registration()
			.await
			.unwrap();

		assert!(registered);
		assert_eq!(registry.staging_calls(), 0);
	}
}
