use crate::client::ClientError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Hash of the empty data layer tree, used to detect a registry with no content.
pub const EMPTY_TREE_HASH: &str =
	"0x0000000000000000000000000000000000000000000000000000000000000000";

/// Default sleep between LedgerSyncWatcher iterations.
pub const LEDGER_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default sleep before each poll of a bounded confirmation watcher.
pub const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default attempt ceiling of a bounded confirmation watcher (~30 minutes).
pub const CONFIRMATION_MAX_ATTEMPTS: u32 = 60;

/// A tree root hash, normalized to lowercase hex without a `0x` prefix.
///
/// The ledger node and the registry do not agree on prefix or case, so every hash is
/// normalized on construction and compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RootHash(String);

impl RootHash {
	pub fn new(raw: &str) -> Self {
		let trimmed = raw.trim();
		let stripped = trimmed
			.strip_prefix("0x")
			.or_else(|| trimmed.strip_prefix("0X"))
			.unwrap_or(trimmed);
		Self(stripped.to_ascii_lowercase())
	}

	/// The well-known empty tree sentinel.
	pub fn empty_tree() -> Self {
		Self::new(EMPTY_TREE_HASH)
	}

	/// True when this is a 32-byte all-zero hash.
	pub fn is_empty_tree(&self) -> bool {
		hex::decode(&self.0)
			.map(|bytes| bytes.len() == 32 && bytes.iter().all(|b| *b == 0))
			.unwrap_or(false)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for RootHash {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}

impl From<&str> for RootHash {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<RootHash> for String {
	fn from(value: RootHash) -> Self {
		format!("0x{}", value.0)
	}
}

impl fmt::Display for RootHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", self.0)
	}
}

/// The operator's own registry entry, fetched fresh on every sync iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeOrganization {
	pub org_uid: String,
	/// Id of the registry tree on the ledger.
	pub registry_id: String,
	/// Registry tree hash as recorded off-chain.
	pub registry_hash: RootHash,
	/// Organization tree hash as recorded off-chain.
	pub org_hash: RootHash,
}

/// One sample of an on-chain tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRoot {
	pub hash: RootHash,
	pub confirmed: bool,
}

/// Attempt budget for [`RetryExecutor`](crate::sync::RetryExecutor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
	max_attempts: u32,
	interval: Duration,
}

impl RetryBudget {
	/// Create a budget, rejecting `max_attempts == 0`.
	pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, SyncError> {
		if max_attempts == 0 {
			return Err(SyncError::InvalidConfig(
				"retry budget needs at least one attempt".to_string(),
			));
		}
		Ok(Self {
			max_attempts,
			interval,
		})
	}

	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}
}

impl Default for RetryBudget {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			interval: Duration::from_secs(2),
		}
	}
}

/// Interval and ceiling for the bounded confirmation watchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
	pub interval: Duration,
	pub max_attempts: u32,
}

impl Default for PollSettings {
	fn default() -> Self {
		Self {
			interval: CONFIRMATION_POLL_INTERVAL,
			max_attempts: CONFIRMATION_MAX_ATTEMPTS,
		}
	}
}

/// Operating policy injected at construction time.
///
/// With `bypass_sync` set, confirmation watchers report success without polling and
/// sync waits return immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncPolicy {
	pub bypass_sync: bool,
}

impl SyncPolicy {
	pub fn production() -> Self {
		Self { bypass_sync: false }
	}

	pub fn test_mode() -> Self {
		Self { bypass_sync: true }
	}
}

/// Per-call options for a ledger sync wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
	/// Fail immediately when the confirmed registry root is the empty tree.
	pub throw_on_empty_registry: bool,
	/// Abort the wait with [`SyncError::Cancelled`] after this long.
	pub timeout: Option<Duration>,
}

impl SyncOptions {
	pub fn require_registry(mut self) -> Self {
		self.throw_on_empty_registry = true;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

/// Summary of one LedgerSyncWatcher run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
	/// Loop iterations performed, including the converging one.
	pub iterations: u32,
	/// Iterations on which no home organization was found.
	pub missing_home_org_polls: u32,
	/// True when at least one iteration diverged before convergence.
	pub recovered: bool,
	/// True when the policy skipped the wait entirely.
	pub bypassed: bool,
	/// True when this caller joined a run started by another caller.
	pub joined: bool,
}

impl SyncReport {
	pub fn bypassed() -> Self {
		Self {
			bypassed: true,
			..Self::default()
		}
	}
}

/// Error types for sync waits and write-operation flows
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Registry tree {registry_id} is empty on the ledger")]
	EmptyRegistry { registry_id: String },

	#[error("Sync wait was cancelled")]
	Cancelled,

	#[error("Client error: {0}")]
	Client(#[from] ClientError),

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	/// The run this caller joined failed; `fatal` mirrors the runner's own error.
	#[error("Joined sync run failed: {message}")]
	SharedRunFailed { message: String, fatal: bool },
}

impl SyncError {
	/// Fatal errors abort the current write flow and are never retried.
	pub fn is_fatal(&self) -> bool {
		match self {
			SyncError::EmptyRegistry { .. } | SyncError::InvalidConfig(_) => true,
			SyncError::Client(e) => e.is_fatal(),
			SyncError::SharedRunFailed { fatal, .. } => *fatal,
			_ => false,
		}
	}
}
