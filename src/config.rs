//! File-based configuration.
//!
//! The configuration is a JSON document; every field has a default so a partial file (or
//! none at all) is valid. The operating mode is the only switch for the sync bypass.

use crate::sync::{PollSettings, RetryBudget, SyncError, SyncPolicy, SyncSettings};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Operating mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
	#[default]
	Production,
	/// Confirmation watchers and sync waits succeed immediately.
	Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
	pub url: String,
	pub api_key: Option<String>,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			url: "http://localhost:31310".to_string(),
			api_key: None,
		}
	}
}

/// Polling timings; the defaults are the production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
	pub ledger_poll_interval_secs: u64,
	pub confirmation_poll_interval_secs: u64,
	pub confirmation_max_attempts: u32,
	pub retry_max_attempts: u32,
	pub retry_interval_secs: u64,
}

impl Default for TimingConfig {
	fn default() -> Self {
		Self {
			ledger_poll_interval_secs: 5,
			confirmation_poll_interval_secs: 30,
			confirmation_max_attempts: 60,
			retry_max_attempts: 5,
			retry_interval_secs: 2,
		}
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	pub mode: OperatingMode,
	pub registry: RegistryConfig,
	/// Data layer RPC endpoint of the ledger node.
	pub datalayer_url: String,
	/// Wallet RPC endpoint.
	pub wallet_url: String,
	/// Wallet whose balance is watched for pending spends before registry writes.
	pub wallet_id: u32,
	pub http_timeout_secs: u64,
	pub timings: TimingConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			mode: OperatingMode::Production,
			registry: RegistryConfig::default(),
			datalayer_url: "https://localhost:8562".to_string(),
			wallet_url: "https://localhost:9256".to_string(),
			wallet_id: 1,
			http_timeout_secs: 30,
			timings: TimingConfig::default(),
		}
	}
}

impl AppConfig {
	/// Load and validate a JSON configuration file.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let raw = std::fs::read_to_string(path)?;
		let config: AppConfig = serde_json::from_str(&raw)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), SyncError> {
		if self.timings.confirmation_max_attempts == 0 {
			return Err(SyncError::InvalidConfig(
				"timings.confirmation_max_attempts must be at least 1".to_string(),
			));
		}
		self.retry_budget().map(|_| ())
	}

	pub fn http_timeout(&self) -> Duration {
		Duration::from_secs(self.http_timeout_secs)
	}

	pub fn sync_policy(&self) -> SyncPolicy {
		match self.mode {
			OperatingMode::Production => SyncPolicy::production(),
			OperatingMode::Test => SyncPolicy::test_mode(),
		}
	}

	pub fn retry_budget(&self) -> Result<RetryBudget, SyncError> {
		RetryBudget::new(
			self.timings.retry_max_attempts,
			Duration::from_secs(self.timings.retry_interval_secs),
		)
	}

	pub fn sync_settings(&self) -> Result<SyncSettings, SyncError> {
		Ok(SyncSettings {
			policy: self.sync_policy(),
			ledger_poll_interval: Duration::from_secs(self.timings.ledger_poll_interval_secs),
			confirmation: PollSettings {
				interval: Duration::from_secs(self.timings.confirmation_poll_interval_secs),
				max_attempts: self.timings.confirmation_max_attempts,
			},
			retry: self.retry_budget()?,
		})
	}
}
