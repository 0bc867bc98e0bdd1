//!
//! Bounded retry for a single idempotent operation.
//!
//! The executor drives [`backoff::future::retry_notify`] with a fixed-interval policy that
//! allows exactly `max_attempts` invocations. There is no sleep after the final attempt,
//! and the final error is returned unchanged.

use crate::sync::types::RetryBudget;

use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-interval backoff that stops after the budget's attempts are spent.
#[derive(Debug, Clone)]
struct AttemptBudget {
	interval: Duration,
	max_retries: u32,
	remaining_retries: u32,
}

impl AttemptBudget {
	fn new(budget: RetryBudget) -> Self {
		let max_retries = budget.max_attempts().saturating_sub(1);
		Self {
			interval: budget.interval(),
			max_retries,
			remaining_retries: max_retries,
		}
	}
}

impl Backoff for AttemptBudget {
	fn reset(&mut self) {
		self.remaining_retries = self.max_retries;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		if self.remaining_retries == 0 {
			return None;
		}
		self.remaining_retries -= 1;
		Some(self.interval)
	}
}

/// Runs an operation until it succeeds or its [`RetryBudget`] is exhausted.
///
/// Attempts run sequentially on the calling task. The operation must be safe to repeat;
/// the executor does no deduplication.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
	budget: RetryBudget,
}

impl RetryExecutor {
	pub fn new(budget: RetryBudget) -> Self {
		Self { budget }
	}

	/// Retry every failure.
	pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Display,
	{
		self.run_while(operation, |_| true).await
	}

	/// Retry only failures for which `retryable` returns true; others are returned at once.
	pub async fn run_while<T, E, F, Fut, P>(&self, mut operation: F, retryable: P) -> Result<T, E>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Display,
		P: Fn(&E) -> bool,
	{
		let retryable = &retryable;
		let max_attempts = self.budget.max_attempts();
		let mut failed_attempts = 0u32;

		retry_notify(
			AttemptBudget::new(self.budget),
			|| {
				let attempt = operation();
				async move {
					attempt.await.map_err(|e| {
						if retryable(&e) {
							backoff::Error::transient(e)
						} else {
							backoff::Error::permanent(e)
						}
					})
				}
			},
			|err: E, delay: Duration| {
				failed_attempts += 1;
				warn!(
					"Attempt {}/{} failed: {}; retrying in {:?}",
					failed_attempts, max_attempts, err, delay
				);
			},
		)
		.await
	}
}
