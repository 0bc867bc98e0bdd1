use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use registry_sync::client::{DataLayerClient, RegistryClient, WalletClient};
use registry_sync::{AppConfig, SyncCoordinator, SyncOptions, SyncSources, telemetry};

#[derive(Parser, Debug)]
#[command(name = "registry-sync", about = "Wait for the registry, ledger and wallet to agree")]
struct Cli {
	/// Path to a JSON configuration file; defaults are used when omitted.
	#[arg(long)]
	config: Option<PathBuf>,

	/// Default log level, refined by RUST_LOG.
	#[arg(long, default_value = "info")]
	log_level: tracing::Level,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Block until the registry's tree hashes match the confirmed ledger roots.
	WaitSync {
		/// Fail if the registry tree on the ledger is empty.
		#[arg(long)]
		require_registry: bool,
		/// Give up after this many seconds.
		#[arg(long)]
		timeout_secs: Option<u64>,
	},
	/// Wait for a wallet transaction to be confirmed.
	ConfirmTx { transaction_id: String },
	/// Wait for the registry's staging queue to drain.
	WaitStaging,
	/// Commit staged registry changes and wait for them to register.
	CommitStaging,
	/// Record the last processed block height.
	SetHeight { height: u64 },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	telemetry::init(cli.log_level);

	let config = match &cli.config {
		Some(path) => AppConfig::load(path)
			.with_context(|| format!("Failed to load configuration from {}", path.display()))?,
		None => AppConfig::default(),
	};
	info!("Starting registry sync in {:?} mode", config.mode);

	let registry = RegistryClient::new(
		&config.registry.url,
		config.registry.api_key.clone(),
		config.http_timeout(),
	)?;
	let datalayer = DataLayerClient::new(&config.datalayer_url, config.http_timeout())?;
	let wallet = WalletClient::new(&config.wallet_url, config.http_timeout())?
		.with_wallet_id(config.wallet_id);

	let coordinator = SyncCoordinator::new(
		SyncSources::from_clients(registry, datalayer, wallet),
		config.sync_settings()?,
	);

	let cancel = coordinator.cancel_signal();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("Interrupt received, cancelling sync wait");
			cancel.cancel();
		}
	});

	match cli.command {
		Command::WaitSync {
			require_registry,
			timeout_secs,
		} => {
			let mut options = SyncOptions::default();
			if require_registry {
				options = options.require_registry();
			}
			if let Some(secs) = timeout_secs {
				options = options.with_timeout(Duration::from_secs(secs));
			}
			let report = coordinator.await_sync(options).await?;
			info!(
				"Registry in sync after {} check(s) (recovered: {})",
				report.iterations, report.recovered
			);
		}
		Command::ConfirmTx { transaction_id } => {
			if !coordinator.confirm_transaction(&transaction_id).await? {
				error!("Transaction {} was not confirmed", transaction_id);
				std::process::exit(2);
			}
		}
		Command::WaitStaging => {
			if !coordinator.wait_for_warehouse_registration().await? {
				error!("Staging queue did not drain");
				std::process::exit(2);
			}
		}
		Command::CommitStaging => {
			if !coordinator.commit_staging_data().await? {
				error!("Committed changes did not register");
				std::process::exit(2);
			}
		}
		Command::SetHeight { height } => {
			coordinator.set_last_processed_height(height).await?;
		}
	}

	Ok(())
}
