//!
//! Bounded confirmation polling.
//!
//! `TransactionConfirmationWatcher` waits for one wallet transaction to be confirmed. The
//! polling loop itself is shared with the warehouse registration watcher: sleep, sample,
//! stop on a positive sample, give up after the attempt ceiling. Giving up is reported as
//! `Ok(false)`; the caller decides how serious that is. A tripped [`CancelSignal`] ends the
//! wait with [`SyncError::Cancelled`] without waiting for the current sleep or sample.

use crate::client::ClientError;
use crate::sync::cancel::CancelSignal;
use crate::sync::sources::TransactionSource;
use crate::sync::types::{PollSettings, SyncError, SyncPolicy};

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sleep-then-sample loop with an attempt ceiling.
///
/// Returns `Ok(true)` on the first positive sample and `Ok(false)` once `max_attempts`
/// samples came back negative. A fatal client error propagates; any other error ends the
/// loop with `Ok(false)` after logging it.
pub(crate) async fn poll_bounded<F, Fut>(
	settings: PollSettings,
	label: &str,
	cancel: &CancelSignal,
	mut sample: F,
) -> Result<bool, SyncError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<bool, ClientError>>,
{
	for attempt in 1..=settings.max_attempts {
		let sampled = tokio::select! {
			sampled = async {
				tokio::time::sleep(settings.interval).await;
				sample().await
			} => sampled,
			_ = cancel.cancelled() => {
				info!("{} wait cancelled after {} attempt(s)", label, attempt - 1);
				return Err(SyncError::Cancelled);
			}
		};

		match sampled {
			Ok(true) => {
				info!("{} confirmed after {} attempt(s)", label, attempt);
				return Ok(true);
			}
			Ok(false) => {
				debug!(
					"{} not confirmed yet (attempt {}/{})",
					label, attempt, settings.max_attempts
				);
			}
			Err(e) if e.is_fatal() => {
				error!("{}: {}", label, e);
				return Err(e.into());
			}
			Err(e) => {
				error!("Error while checking {}: {}", label, e);
				return Ok(false);
			}
		}
	}

	warn!(
		"{} not confirmed after {} attempts, giving up",
		label, settings.max_attempts
	);
	Ok(false)
}

/// Waits for a specific wallet transaction to be confirmed.
pub struct TransactionConfirmationWatcher {
	source: Arc<dyn TransactionSource>,
	settings: PollSettings,
	policy: SyncPolicy,
	cancel: CancelSignal,
}

impl TransactionConfirmationWatcher {
	pub fn new(
		source: Arc<dyn TransactionSource>,
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

	/// Observe `cancel` instead of a private, never-tripped signal.
	pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
		self.cancel = cancel;
		self
	}

	/// Poll until `transaction_id` is confirmed or the ceiling is reached.
	///
	/// # Returns
	/// `Ok(true)` when confirmed, `Ok(false)` on timeout or a non-fatal lookup error,
	/// `Err` for fatal errors such as a rejected API key, and [`SyncError::Cancelled`] once
	/// the cancel signal trips.
	pub async fn wait_for_confirmation(&self, transaction_id: &str) -> Result<bool, SyncError> {
		if self.policy.bypass_sync {
			debug!("Sync bypass enabled, treating {} as confirmed", transaction_id);
			return Ok(true);
		}

		info!("Waiting for transaction {} to confirm", transaction_id);
		let label = format!("Transaction {}", transaction_id);
		poll_bounded(self.settings, &label, &self.cancel, move || {
			self.source.transaction_confirmed(transaction_id)
		})
		.await
	}
}
