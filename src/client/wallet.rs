//!
//! RPC client for the wallet service.
//!
//! Provides transaction confirmation lookups for [`TransactionSource`] and the
//! "wait until the wallet is idle" capability used before registry writes.

use super::http::{build_http_client, decode_response, join, parse_base_url};
use super::types::{BalanceResponse, ClientError, TransactionResponse, WalletBalance};
use crate::sync::{TransactionSource, WalletService};

use reqwest::{Client, Url};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between wallet balance polls while waiting for pending transactions.
const WALLET_IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wallet RPC client
#[derive(Clone)]
pub struct WalletClient {
	http_client: Client,
	base_url: Url,
	/// Wallet whose balance is watched for pending spends.
	wallet_id: u32,
	idle_poll_interval: Duration,
}

impl WalletClient {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
		Ok(Self {
			http_client: build_http_client(timeout)?,
			base_url: parse_base_url(base_url)?,
			wallet_id: 1,
			idle_poll_interval: WALLET_IDLE_POLL_INTERVAL,
		})
	}

	pub fn with_wallet_id(mut self, wallet_id: u32) -> Self {
		self.wallet_id = wallet_id;
		self
	}

	async fn rpc<T: serde::de::DeserializeOwned>(
		&self,
		method: &str,
		body: serde_json::Value,
	) -> Result<T, ClientError> {
		let url = join(&self.base_url, method)?;
		let response = self.http_client.post(url).json(&body).send().await?;
		decode_response(response).await
	}

	/// Fetch the balance counters of the configured wallet.
	pub async fn wallet_balance(&self) -> Result<WalletBalance, ClientError> {
		let response: BalanceResponse = self
			.rpc("get_wallet_balance", json!({ "wallet_id": self.wallet_id }))
			.await?;
		if !response.success {
			return Err(ClientError::Rpc(
				response
					.error
					.unwrap_or_else(|| "get_wallet_balance failed".to_string()),
			));
		}
		response.wallet_balance.ok_or(ClientError::NoData)
	}
}

pub(crate) fn confirmed_from_response(response: TransactionResponse) -> Result<bool, ClientError> {
	if !response.success {
		return Err(ClientError::Rpc(
			response
				.error
				.unwrap_or_else(|| "get_transaction failed".to_string()),
		));
	}
	response
		.transaction
		.map(|tx| tx.confirmed)
		.ok_or(ClientError::NoData)
}

#[async_trait::async_trait]
impl TransactionSource for WalletClient {
	async fn transaction_confirmed(&self, transaction_id: &str) -> Result<bool, ClientError> {
		let response: TransactionResponse = self
			.rpc(
				"get_transaction",
				json!({ "transaction_id": transaction_id }),
			)
			.await?;
		confirmed_from_response(response)
	}
}

#[async_trait::async_trait]
impl WalletService for WalletClient {
	async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), ClientError> {
		let mut announced = false;
		loop {
			let balance = self.wallet_balance().await?;
			if !balance.has_pending() {
				if announced {
					info!("Wallet transactions confirmed");
				}
				return Ok(());
			}

			if !announced {
				info!("Waiting for wallet transactions to confirm");
				announced = true;
			}
			debug!(
				"Wallet {} pending: confirmed={} unconfirmed={} removals={}",
				self.wallet_id,
				balance.confirmed_wallet_balance,
				balance.unconfirmed_wallet_balance,
				balance.pending_coin_removal_count
			);
			tokio::time::sleep(self.idle_poll_interval).await;
		}
	}
}
