//! RPC client for the ledger node's data layer service.

use super::http::{build_http_client, decode_response, join, parse_base_url};
use super::types::{ClientError, RootResponse};
use crate::sync::{LedgerNode, LedgerRoot, RootHash};

use reqwest::{Client, Url};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Data layer RPC client
#[derive(Clone)]
pub struct DataLayerClient {
	http_client: Client,
	base_url: Url,
}

impl DataLayerClient {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
		Ok(Self {
			http_client: build_http_client(timeout)?,
			base_url: parse_base_url(base_url)?,
		})
	}
}

/// Convert a `get_root` response into a [`LedgerRoot`].
///
/// A tree that has never been written has no hash yet; it is reported as the empty tree.
pub(crate) fn root_from_response(response: RootResponse) -> Result<LedgerRoot, ClientError> {
	if !response.success {
		return Err(ClientError::Rpc(
			response
				.error
				.unwrap_or_else(|| "get_root returned success=false".to_string()),
		));
	}

	let hash = response
		.hash
		.map(|h| RootHash::new(&h))
		.unwrap_or_else(RootHash::empty_tree);

	Ok(LedgerRoot {
		hash,
		confirmed: response.confirmed,
	})
}

#[async_trait::async_trait]
impl LedgerNode for DataLayerClient {
	async fn get_root(&self, tree_id: &str) -> Result<LedgerRoot, ClientError> {
		let url = join(&self.base_url, "get_root")?;
		let response = self
			.http_client
			.post(url)
			.json(&json!({ "id": tree_id }))
			.send()
			.await?;
		let root = root_from_response(decode_response(response).await?)?;
		debug!(
			"Root of {}: {} (confirmed={})",
			tree_id, root.hash, root.confirmed
		);
		Ok(root)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn confirmed_root_is_parsed() {
		let response: RootResponse =
			serde_json::from_str(r#"{"confirmed": true, "hash": "0xAB12", "success": true}"#)
				.unwrap();
		let root = root_from_response(response).unwrap();
		assert!(root.confirmed);
		assert_eq!(root.hash, RootHash::new("ab12"));
	}

	#[test]
	fn missing_hash_is_empty_tree() {
		let response: RootResponse =
			serde_json::from_str(r#"{"confirmed": true, "success": true}"#).unwrap();
		let root = root_from_response(response).unwrap();
		assert!(root.hash.is_empty_tree());
	}

	#[test]
	fn unsuccessful_rpc_is_an_error() {
		let response: RootResponse =
			serde_json::from_str(r#"{"success": false, "error": "unknown store"}"#).unwrap();
		match root_from_response(response) {
			Err(ClientError::Rpc(msg)) => assert_eq!(msg, "unknown store"),
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
