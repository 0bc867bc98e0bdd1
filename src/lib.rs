//! Client-side coordination between a distributed ledger, an off-chain registry and a
//! wallet service.
//!
//! Writes reach the ledger asynchronously and the registry's record of the ledger lags
//! behind it. The [`sync`] module provides the polling watchers and the single-flight gate
//! that make a write wait until all three services agree; [`client`] provides the HTTP
//! implementations of the services.

pub mod client;
pub mod config;
pub mod sync;
pub mod telemetry;

pub use config::{AppConfig, OperatingMode};
pub use sync::{
	CancelSignal, SyncCoordinator, SyncError, SyncGate, SyncOptions, SyncPolicy, SyncReport,
	SyncSettings, SyncSources,
};
