//! Convergence scenarios for the ledger sync watcher.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use registry_sync::sync::mock::{MockLedger, MockRegistry, MockReply, home_organization};
use registry_sync::sync::{
	CancelSignal, EMPTY_TREE_HASH, LedgerRoot, LedgerSyncWatcher, RootHash, SyncError,
	SyncOptions,
};
use tokio::time::Instant;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines for assertions.
#[derive(Clone, Default)]
struct LogBuffer {
	bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
	fn contents(&self) -> String {
		String::from_utf8(self.bytes.lock().unwrap().clone()).unwrap()
	}
}

impl<'a> MakeWriter<'a> for LogBuffer {
	type Writer = LogBuffer;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

impl Write for LogBuffer {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.bytes.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

fn watcher(registry: &MockRegistry, ledger: &MockLedger) -> LedgerSyncWatcher {
	LedgerSyncWatcher::new(Arc::new(registry.clone()), Arc::new(ledger.clone()))
}

fn confirmed(hash: &RootHash) -> MockReply<LedgerRoot> {
	MockReply::Value(LedgerRoot {
		hash: hash.clone(),
		confirmed: true,
	})
}

#[tokio::test(start_paused = true)]
async fn org_hash_mismatch_delays_success_until_it_matches() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::with_home(home.clone());
	let ledger = MockLedger::converged_with(&home);

	let stale = RootHash::new(&"ef".repeat(32));
	let mismatches = 4;
	let mut org_script = vec![confirmed(&stale); mismatches];
	org_script.push(confirmed(&home.org_hash));
	ledger.script_root(&home.org_uid, org_script);

	let start = Instant::now();
	let report = watcher(&registry, &ledger)
		.wait_for_sync(SyncOptions::default(), &CancelSignal::new())
		.await?;

	assert_eq!(report.iterations, mismatches as u32 + 1);
	assert!(report.recovered);
	assert_eq!(ledger.root_calls(&home.org_uid), mismatches as u32 + 1);
	assert_eq!(ledger.root_calls(&home.registry_id), mismatches as u32 + 1);
	assert_eq!(start.elapsed(), Duration::from_secs(5 * mismatches as u64));
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_registry_fails_on_first_iteration_before_org_check() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::with_home(home.clone());
	let ledger = MockLedger::converged_with(&home);
	ledger.set_root(&home.registry_id, EMPTY_TREE_HASH, true);

	let start = Instant::now();
	let result = watcher(&registry, &ledger)
		.wait_for_sync(SyncOptions::default().require_registry(), &CancelSignal::new())
		.await;

	match &result {
		Err(SyncError::EmptyRegistry { registry_id }) => assert_eq!(registry_id, &home.registry_id),
		other => panic!("expected an empty registry error, got {:?}", other),
	}
	assert!(result.unwrap_err().is_fatal());
	assert_eq!(registry.home_calls(), 1);
	assert_eq!(ledger.root_calls(&home.org_uid), 0);
	assert_eq!(start.elapsed(), Duration::ZERO);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_empty_registry_is_not_fatal_yet() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::with_home(home.clone());
	let ledger = MockLedger::converged_with(&home);
	ledger.script_root(
		&home.registry_id,
		vec![
			MockReply::Value(LedgerRoot {
				hash: RootHash::empty_tree(),
				confirmed: false,
			}),
			confirmed(&home.registry_hash),
		],
	);

	let report = watcher(&registry, &ledger)
		.wait_for_sync(SyncOptions::default().require_registry(), &CancelSignal::new())
		.await?;

	assert_eq!(report.iterations, 2);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_home_organization_then_converged() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::new();
	registry.push_home(MockReply::Value(None));
	registry.push_home(MockReply::Value(None));
	registry.push_home(MockReply::Value(Some(home.clone())));
	let ledger = MockLedger::converged_with(&home);

	let logs = LogBuffer::default();
	let subscriber = tracing_subscriber::fmt()
		.with_writer(logs.clone())
		.with_max_level(Level::INFO)
		.with_ansi(false)
		.without_time()
		.finish();
	let _guard = tracing::subscriber::set_default(subscriber);

	let report = watcher(&registry, &ledger)
		.wait_for_sync(SyncOptions::default(), &CancelSignal::new())
		.await?;

	let logs = logs.contents();
	assert_eq!(logs.matches("Cannot find home organization").count(), 2);
	assert_eq!(logs.matches("Waiting for registry to sync with the ledger").count(), 1);
	assert!(logs.contains("Registry is in sync with the ledger after 3 checks"));

	assert_eq!(report.iterations, 3);
	assert_eq!(report.missing_home_org_polls, 2);
	assert!(report.recovered);
	assert_eq!(registry.home_calls(), 3);
	// The ledger is only consulted once a home organization exists.
	assert_eq!(ledger.total_calls(), 2);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn converged_state_is_idempotent() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::with_home(home.clone());
	let ledger = MockLedger::converged_with(&home);
	let watcher = watcher(&registry, &ledger);
	let cancel = CancelSignal::new();

	let start = Instant::now();
	let first = watcher.wait_for_sync(SyncOptions::default(), &cancel).await?;
	let second = watcher.wait_for_sync(SyncOptions::default(), &cancel).await?;

	assert_eq!(first.iterations, 1);
	assert_eq!(second.iterations, 1);
	assert!(!first.recovered && !second.recovered);
	assert_eq!(registry.home_calls(), 2);
	assert_eq!(start.elapsed(), Duration::ZERO);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn registry_hash_lag_is_tolerated() -> Result<()> {
	let home = home_organization();
	let registry = MockRegistry::new();
	let mut lagging = home.clone();
	lagging.registry_hash = RootHash::new(&"01".repeat(32));
	registry.push_home(MockReply::Value(Some(lagging)));
	registry.push_home(MockReply::Value(Some(home.clone())));
	let ledger = MockLedger::converged_with(&home);

	let report = watcher(&registry, &ledger)
		.wait_for_sync(SyncOptions::default(), &CancelSignal::new())
		.await?;

	assert_eq!(report.iterations, 2);
	// First iteration stops at the registry hash comparison.
	assert_eq!(ledger.root_calls(&home.org_uid), 1);
	Ok(())
}
