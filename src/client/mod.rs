//! Service clients for the registry, the ledger node's data layer and the wallet.
//!
//! These are the production implementations of the capability traits in
//! [`crate::sync::sources`]. Request shaping and status mapping live here; the sync core
//! only ever sees [`ClientError`].

/// Data layer RPC client (ledger node tree roots)
mod datalayer;
/// Shared reqwest helpers
mod http;
/// Registry REST client
mod registry;
/// Wire types and the client error enum
mod types;
/// Wallet RPC client
mod wallet;

pub use datalayer::DataLayerClient;
pub use registry::RegistryClient;
pub use types::*;
pub use wallet::WalletClient;
