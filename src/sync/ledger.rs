//!
//! Ledger/registry convergence watcher.
//!
//! The registry records the hashes of two data layer trees for the home organization: the
//! registry tree (units, projects) and the organization's own tree. After any write, those
//! recorded hashes lag behind the ledger node until the registry catches up. This module
//! polls both sides until, on a single iteration, both on-chain roots are confirmed and both
//! match what the registry recorded.
//!
//! Each iteration checks, in order:
//! 1. the home organization exists,
//! 2. the registry tree root is confirmed,
//! 3. the registry tree is not the empty tree (only when the caller requires content),
//! 4. the registry tree hash matches the registry's record,
//! 5. the organization tree root is confirmed,
//! 6. the organization tree hash matches the registry's record.
//!
//! There is no attempt ceiling. The loop ends on convergence, on a fatal condition, or when
//! the [`CancelSignal`] trips or the optional timeout elapses.

use crate::sync::cancel::CancelSignal;
use crate::sync::sources::{LedgerNode, RegistryMetadataSource};
use crate::sync::types::{LEDGER_POLL_INTERVAL, RootHash, SyncError, SyncOptions, SyncReport};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why an iteration did not converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
	NoHomeOrganization,
	RegistryRootUnconfirmed,
	RegistryHashMismatch { ledger: RootHash, registry: RootHash },
	OrgRootUnconfirmed,
	OrgHashMismatch { ledger: RootHash, registry: RootHash },
}

impl fmt::Display for Divergence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Divergence::NoHomeOrganization => write!(f, "no home organization"),
			Divergence::RegistryRootUnconfirmed => write!(f, "registry root not confirmed"),
			Divergence::RegistryHashMismatch { ledger, registry } => {
				write!(f, "registry hash {} != ledger {}", registry, ledger)
			}
			Divergence::OrgRootUnconfirmed => write!(f, "organization root not confirmed"),
			Divergence::OrgHashMismatch { ledger, registry } => {
				write!(f, "organization hash {} != ledger {}", registry, ledger)
			}
		}
	}
}

/// Per-run bookkeeping, discarded when the run ends.
#[derive(Debug, Default)]
struct SyncAttemptState {
	/// Set on the first divergent iteration; drives the one-time recovery notice.
	first_sync_after_failure: bool,
	iterations: u32,
	missing_home_org_polls: u32,
}

impl SyncAttemptState {
	fn report(&self) -> SyncReport {
		SyncReport {
			iterations: self.iterations,
			missing_home_org_polls: self.missing_home_org_polls,
			recovered: self.first_sync_after_failure,
			..SyncReport::default()
		}
	}
}

/// Polls the ledger node and the registry until they agree.
pub struct LedgerSyncWatcher {
	registry: Arc<dyn RegistryMetadataSource>,
	ledger: Arc<dyn LedgerNode>,
	interval: Duration,
}

impl LedgerSyncWatcher {
	pub fn new(registry: Arc<dyn RegistryMetadataSource>, ledger: Arc<dyn LedgerNode>) -> Self {
		Self {
			registry,
			ledger,
			interval: LEDGER_POLL_INTERVAL,
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Run one iteration of the convergence check.
	///
	/// Returns `Ok(None)` when converged and `Ok(Some(reason))` when the caller should poll
	/// again. Fetches happen strictly in order, never in parallel.
	pub async fn check_once(&self, options: &SyncOptions) -> Result<Option<Divergence>, SyncError> {
		let home = match self.registry.home_organization().await? {
			Some(home) => home,
			None => return Ok(Some(Divergence::NoHomeOrganization)),
		};

		let registry_root = self.ledger.get_root(&home.registry_id).await?;
		if !registry_root.confirmed {
			return Ok(Some(Divergence::RegistryRootUnconfirmed));
		}

		if options.throw_on_empty_registry && registry_root.hash.is_empty_tree() {
			return Err(SyncError::EmptyRegistry {
				registry_id: home.registry_id,
			});
		}

		if registry_root.hash != home.registry_hash {
			return Ok(Some(Divergence::RegistryHashMismatch {
				ledger: registry_root.hash,
				registry: home.registry_hash,
			}));
		}

		let org_root = self.ledger.get_root(&home.org_uid).await?;
		if !org_root.confirmed {
			return Ok(Some(Divergence::OrgRootUnconfirmed));
		}

		if org_root.hash != home.org_hash {
			return Ok(Some(Divergence::OrgHashMismatch {
				ledger: org_root.hash,
				registry: home.org_hash,
			}));
		}

		Ok(None)
	}

	/// Block until the registry and the ledger agree.
	///
	/// # Errors
	/// * [`SyncError::EmptyRegistry`] when `throw_on_empty_registry` is set and the confirmed
	///   registry root is the empty tree.
	/// * [`SyncError::Cancelled`] when `cancel` trips or `options.timeout` elapses.
	/// * [`SyncError::Client`] for any failed fetch.
	pub async fn wait_for_sync(
		&self,
		options: SyncOptions,
		cancel: &CancelSignal,
	) -> Result<SyncReport, SyncError> {
		match options.timeout {
			Some(limit) => tokio::time::timeout(limit, self.poll(&options, cancel))
				.await
				.unwrap_or_else(|_| {
					warn!("Gave up waiting for ledger sync after {:?}", limit);
					Err(SyncError::Cancelled)
				}),
			None => self.poll(&options, cancel).await,
		}
	}

	async fn poll(
		&self,
		options: &SyncOptions,
		cancel: &CancelSignal,
	) -> Result<SyncReport, SyncError> {
		let mut state = SyncAttemptState::default();

		loop {
			if cancel.is_cancelled() {
				return Err(SyncError::Cancelled);
			}
			state.iterations += 1;

			match self.check_once(options).await? {
				None => {
					if state.first_sync_after_failure {
						info!(
							"Registry is in sync with the ledger after {} checks",
							state.iterations
						);
					}
					return Ok(state.report());
				}
				Some(divergence) => {
					if divergence == Divergence::NoHomeOrganization {
						state.missing_home_org_polls += 1;
						warn!("Cannot find home organization, waiting for it to be created");
					} else {
						debug!("Registry not in sync: {}", divergence);
					}

					if !state.first_sync_after_failure {
						info!("Waiting for registry to sync with the ledger ({})", divergence);
						state.first_sync_after_failure = true;
					}
				}
			}

			tokio::select! {
				_ = tokio::time::sleep(self.interval) => {}
				_ = cancel.cancelled() => {
					info!("Ledger sync wait cancelled");
					return Err(SyncError::Cancelled);
				}
			}
		}
	}
}
