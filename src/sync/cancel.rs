//! Cooperative cancellation for sync waits.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal shared between the owner of a sync wait and the wait itself.
///
/// Cancellation is sticky: once tripped, every current and future wait observing this
/// signal exits with [`SyncError::Cancelled`](crate::sync::SyncError::Cancelled).
#[derive(Clone)]
pub struct CancelSignal {
	state_tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
	pub fn new() -> Self {
		let (state_tx, _) = watch::channel(false);
		Self {
			state_tx: Arc::new(state_tx),
		}
	}

	/// Trip the signal.
	pub fn cancel(&self) {
		self.state_tx.send_replace(true);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.state_tx.borrow()
	}

	/// Resolves once the signal has been tripped.
	pub async fn cancelled(&self) {
		let mut state_rx = self.state_tx.subscribe();
		// The sender lives in `self`, so the channel cannot close while we wait.
		let _ = state_rx.wait_for(|cancelled| *cancelled).await;
	}
}

impl Default for CancelSignal {
	fn default() -> Self {
		Self::new()
	}
}
