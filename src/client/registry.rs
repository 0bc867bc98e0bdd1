//!
//! REST client for the off-chain registry service.
//!
//! The registry keeps the mutable metadata for the operator's organization, including the
//! tree hashes it believes are current on the ledger, and a staging queue of changes that
//! are pushed to the ledger on commit. Every request carries the configured API key.

use super::http::{build_http_client, decode_response, join, parse_base_url};
use super::types::{ClientError, ConfirmationStatus, OrganizationRecord};
use crate::sync::{
	HomeOrganization, RegistryMetadataSource, RegistryWriter, RootHash, StagingQueueSource,
};

use reqwest::{Client, RequestBuilder, Url};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Registry REST client
#[derive(Clone)]
pub struct RegistryClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the registry API.
	base_url: Url,
	/// Optional API key sent as `x-api-key`.
	api_key: Option<String>,
}

impl RegistryClient {
	/// Create a new registry client.
	///
	/// # Arguments
	/// * `base_url` - Root URL of the registry service.
	/// * `api_key` - API key injected into every request, if the registry requires one.
	/// * `timeout` - Per-request timeout.
	pub fn new(
		base_url: &str,
		api_key: Option<String>,
		timeout: Duration,
	) -> Result<Self, ClientError> {
		Ok(Self {
			http_client: build_http_client(timeout)?,
			base_url: parse_base_url(base_url)?,
			api_key,
		})
	}

	fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.api_key {
			Some(key) => request.header(API_KEY_HEADER, key),
			None => request,
		}
	}

	/// Fetch every organization the registry knows about, keyed by uid.
	pub async fn organizations(&self) -> Result<HashMap<String, OrganizationRecord>, ClientError> {
		let url = join(&self.base_url, "v1/organizations")?;
		let response = self.with_key(self.http_client.get(url)).send().await?;
		decode_response(response).await
	}
}

/// Pick the home organization out of the registry's organization map.
///
/// A home record without tree identifiers or hashes has not been provisioned on the ledger
/// yet and is treated as absent.
pub(crate) fn select_home(
	organizations: HashMap<String, OrganizationRecord>,
) -> Option<HomeOrganization> {
	let record = organizations.into_values().find(|org| org.is_home)?;

	match (record.registry_id, record.registry_hash, record.org_hash) {
		(Some(registry_id), Some(registry_hash), Some(org_hash)) => Some(HomeOrganization {
			org_uid: record.org_uid,
			registry_id,
			registry_hash: RootHash::new(&registry_hash),
			org_hash: RootHash::new(&org_hash),
		}),
		_ => {
			warn!(
				"Home organization {} is missing registry identifiers",
				record.org_uid
			);
			None
		}
	}
}

#[async_trait::async_trait]
impl RegistryMetadataSource for RegistryClient {
	async fn home_organization(&self) -> Result<Option<HomeOrganization>, ClientError> {
		Ok(select_home(self.organizations().await?))
	}
}

#[async_trait::async_trait]
impl StagingQueueSource for RegistryClient {
	async fn staging_confirmed(&self) -> Result<bool, ClientError> {
		let url = join(&self.base_url, "v1/staging/hasPendingTransactions")?;
		let response = self.with_key(self.http_client.get(url)).send().await?;
		let status: ConfirmationStatus = decode_response(response).await?;
		debug!("Staging pending check: confirmed={}", status.confirmed);
		Ok(status.confirmed)
	}
}

#[async_trait::async_trait]
impl RegistryWriter for RegistryClient {
	async fn set_last_processed_height(&self, height: u64) -> Result<(), ClientError> {
		let url = join(&self.base_url, "v1/organizations/metadata")?;
		let body = json!({ "lastProcessedHeight": height.to_string() });
		let response = self
			.with_key(self.http_client.post(url))
			.json(&body)
			.send()
			.await?;
		let _: serde_json::Value = decode_response(response).await?;
		info!("Recorded last processed height {}", height);
		Ok(())
	}

	async fn commit_staging(&self) -> Result<(), ClientError> {
		let url = join(&self.base_url, "v1/staging/commit")?;
		let response = self
			.with_key(self.http_client.post(url))
			.json(&json!({}))
			.send()
			.await?;
		let _: serde_json::Value = decode_response(response).await?;
		info!("Committed staging data");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(uid: &str, home: bool) -> OrganizationRecord {
		OrganizationRecord {
			org_uid: uid.to_string(),
			name: None,
			registry_id: Some(format!("{}-registry", uid)),
			registry_hash: Some("0xAA".to_string()),
			org_hash: Some("0xBB".to_string()),
			is_home: home,
		}
	}

	#[test]
	fn select_home_picks_flagged_record() {
		let mut orgs = HashMap::new();
		orgs.insert("x".to_string(), record("x", false));
		orgs.insert("h".to_string(), record("h", true));

		let home = select_home(orgs).unwrap();
		assert_eq!(home.org_uid, "h");
		assert_eq!(home.registry_id, "h-registry");
		assert_eq!(home.registry_hash, RootHash::new("aa"));
		assert_eq!(home.org_hash, RootHash::new("bb"));
	}

	#[test]
	fn select_home_without_home_record() {
		let mut orgs = HashMap::new();
		orgs.insert("x".to_string(), record("x", false));
		assert!(select_home(orgs).is_none());
		assert!(select_home(HashMap::new()).is_none());
	}

	#[test]
	fn unprovisioned_home_is_absent() {
		let mut home = record("h", true);
		home.org_hash = None;
		let mut orgs = HashMap::new();
		orgs.insert("h".to_string(), home);
		assert!(select_home(orgs).is_none());
	}

	#[test]
	fn client_rejects_bad_url() {
		assert!(RegistryClient::new("::", None, Duration::from_secs(1)).is_err());
	}
}
