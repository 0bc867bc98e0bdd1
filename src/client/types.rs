//! Wire types for the registry, data layer and wallet services.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Organization record as returned by the registry's `/v1/organizations` endpoint.
///
/// The registry keys the response object by organization uid; every record carries the
/// identifiers of the two data layer trees it owns along with the hashes the registry
/// believes are current.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
	/// Unique organization identifier, also the id of the organization's own tree.
	pub org_uid: String,
	/// Optional display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Id of the registry tree holding the organization's units and projects.
	#[serde(default)]
	pub registry_id: Option<String>,
	/// Registry tree hash as last recorded by the registry.
	#[serde(default)]
	pub registry_hash: Option<String>,
	/// Organization tree hash as last recorded by the registry.
	#[serde(default)]
	pub org_hash: Option<String>,
	/// Whether this record is the operator's own organization.
	#[serde(default)]
	pub is_home: bool,
}

/// `{ "confirmed": bool }` body shared by the staging pending-check and similar endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationStatus {
	pub confirmed: bool,
}

/// Response of the data layer `get_root` RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
	#[serde(default)]
	pub confirmed: bool,
	#[serde(default)]
	pub hash: Option<String>,
	#[serde(default)]
	pub success: bool,
	#[serde(default)]
	pub error: Option<String>,
}

/// Transaction record nested in the wallet `get_transaction` RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
	#[serde(default)]
	pub confirmed: bool,
	#[serde(default)]
	pub confirmed_at_height: Option<u64>,
	#[serde(default)]
	pub name: Option<String>,
}

/// Response of the wallet `get_transaction` RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
	#[serde(default)]
	pub transaction: Option<WalletTransaction>,
	#[serde(default)]
	pub success: bool,
	#[serde(default)]
	pub error: Option<String>,
}

/// Balance counters reported by the wallet `get_wallet_balance` RPC.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletBalance {
	#[serde(default)]
	pub confirmed_wallet_balance: u64,
	#[serde(default)]
	pub unconfirmed_wallet_balance: u64,
	#[serde(default)]
	pub pending_coin_removal_count: u64,
}

impl WalletBalance {
	/// True when the wallet has unconfirmed spends or pending coin removals.
	pub fn has_pending(&self) -> bool {
		self.confirmed_wallet_balance != self.unconfirmed_wallet_balance
			|| self.pending_coin_removal_count > 0
	}
}

/// Response of the wallet `get_wallet_balance` RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
	#[serde(default)]
	pub wallet_balance: Option<WalletBalance>,
	#[serde(default)]
	pub success: bool,
	#[serde(default)]
	pub error: Option<String>,
}

/// Error types for registry, data layer and wallet requests
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("Unauthorized ({status}): the API key was rejected")]
	Unauthorized { status: StatusCode },

	#[error("Unexpected HTTP status {status}: {body}")]
	Status { status: StatusCode, body: String },

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("RPC error: {0}")]
	Rpc(String),

	#[error("No data returned")]
	NoData,

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),
}

impl ClientError {
	/// Errors that must abort the enclosing write flow instead of being retried or swallowed.
	pub fn is_fatal(&self) -> bool {
		matches!(self, ClientError::Unauthorized { .. })
	}
}
