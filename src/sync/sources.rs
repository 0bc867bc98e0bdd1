//! Capabilities the sync core consumes from its collaborators.
//!
//! Each trait is one narrow operation against one service. The HTTP clients in
//! [`crate::client`] implement them for production; [`crate::sync::mock`] implements them
//! in memory for tests and dry runs.

use crate::client::ClientError;
use crate::sync::types::{HomeOrganization, LedgerRoot};

/// Reports whether a specific wallet transaction has been confirmed.
#[async_trait::async_trait]
pub trait TransactionSource: Send + Sync {
	async fn transaction_confirmed(&self, transaction_id: &str) -> Result<bool, ClientError>;
}

/// Reports whether the registry's staging queue has drained.
#[async_trait::async_trait]
pub trait StagingQueueSource: Send + Sync {
	/// `true` once no pending staging transactions remain.
	async fn staging_confirmed(&self) -> Result<bool, ClientError>;
}

/// Samples on-chain tree roots.
#[async_trait::async_trait]
pub trait LedgerNode: Send + Sync {
	async fn get_root(&self, tree_id: &str) -> Result<LedgerRoot, ClientError>;
}

/// Reads the registry's off-chain view of the operator's organization.
#[async_trait::async_trait]
pub trait RegistryMetadataSource: Send + Sync {
	async fn home_organization(&self) -> Result<Option<HomeOrganization>, ClientError>;
}

/// Wallet-side settling of outstanding transactions.
#[async_trait::async_trait]
pub trait WalletService: Send + Sync {
	/// Resolves once the wallet reports no unconfirmed transactions.
	async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), ClientError>;
}

/// Registry writes performed by the coordinated write flows.
#[async_trait::async_trait]
pub trait RegistryWriter: Send + Sync {
	async fn set_last_processed_height(&self, height: u64) -> Result<(), ClientError>;

	async fn commit_staging(&self) -> Result<(), ClientError>;
}
