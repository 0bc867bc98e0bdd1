//! Synchronization-confirmation core
//!
//! Writes to the ledger are asynchronous and the registry's view of the ledger lags behind
//! it. Every component here waits, by polling, until independently operated services agree:
//!
//! - `retry`: bounded retry of a single idempotent operation.
//! - `confirmation`: waits for one wallet transaction to be confirmed (bounded).
//! - `warehouse`: waits for the registry's staging queue to drain (bounded).
//! - `ledger`: waits until the registry's recorded tree hashes match confirmed on-chain roots.
//! - `gate`: single-flight wrapper so only one ledger wait runs at a time.
//! - `coordinator`: owns the gate and brackets registry writes with the waits they need.
//!
//! Collaborators are reached through the traits in `sources`; `mock` provides in-memory
//! implementations for tests and dry runs.

/// Cooperative cancellation signal
pub mod cancel;
/// Transaction confirmation watcher and the shared bounded polling loop
pub mod confirmation;
/// Write-operation flows around the gate
pub mod coordinator;
/// Single-flight gate
pub mod gate;
/// Ledger/registry convergence watcher
pub mod ledger;
/// In-memory sources
pub mod mock;
/// Bounded retry executor
pub mod retry;
/// Capability traits
pub mod sources;
/// Data model and error types
pub mod types;
/// Staging queue registration watcher
pub mod warehouse;

pub use cancel::CancelSignal;
pub use confirmation::TransactionConfirmationWatcher;
pub use coordinator::{SyncCoordinator, SyncSettings, SyncSources};
pub use gate::{GateState, SyncGate};
pub use ledger::{Divergence, LedgerSyncWatcher};
pub use retry::RetryExecutor;
pub use sources::*;
pub use types::*;
pub use warehouse::WarehouseRegistrationWatcher;
