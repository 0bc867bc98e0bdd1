//! In-memory sources for tests and dry runs.
//!
//! Every mock replays a scripted sequence of replies; the last reply repeats once the
//! script runs out. Invocation counters are exposed for assertions.

use crate::client::ClientError;
use crate::sync::sources::{
	LedgerNode, RegistryMetadataSource, RegistryWriter, StagingQueueSource, TransactionSource,
	WalletService,
};
use crate::sync::types::{HomeOrganization, LedgerRoot, RootHash};

use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
	Value(T),
	/// Behaves like a rejected API key.
	Unauthorized,
	/// Behaves like a transport failure with the given response detail.
	Transport(String),
}

impl<T> MockReply<T> {
	fn into_result(self) -> Result<T, ClientError> {
		match self {
			MockReply::Value(value) => Ok(value),
			MockReply::Unauthorized => Err(ClientError::Unauthorized {
				status: StatusCode::UNAUTHORIZED,
			}),
			MockReply::Transport(body) => Err(ClientError::Status {
				status: StatusCode::SERVICE_UNAVAILABLE,
				body,
			}),
		}
	}
}

#[derive(Debug)]
struct Script<T> {
	replies: VecDeque<MockReply<T>>,
	fallback: MockReply<T>,
}

impl<T: Clone> Script<T> {
	fn new(fallback: MockReply<T>) -> Self {
		Self {
			replies: VecDeque::new(),
			fallback,
		}
	}

	fn push(&mut self, reply: MockReply<T>) {
		self.replies.push_back(reply);
	}

	fn replace(&mut self, replies: Vec<MockReply<T>>) {
		self.replies = replies.into();
	}

	fn next(&mut self) -> Result<T, ClientError> {
		let reply = if self.replies.len() > 1 {
			self.replies.pop_front().unwrap_or_else(|| self.fallback.clone())
		} else {
			self.replies.front().cloned().unwrap_or_else(|| self.fallback.clone())
		};
		reply.into_result()
	}
}

/// A home organization with distinct, non-empty hashes.
pub fn home_organization() -> HomeOrganization {
	HomeOrganization {
		org_uid: "org-home".to_string(),
		registry_id: "registry-home".to_string(),
		registry_hash: RootHash::new(&"ab".repeat(32)),
		org_hash: RootHash::new(&"cd".repeat(32)),
	}
}

struct RegistryState {
	home: Script<Option<HomeOrganization>>,
	staging: Script<bool>,
	writes: Script<()>,
	home_delay: Option<Duration>,
	home_calls: u32,
	staging_calls: u32,
	recorded_heights: Vec<u64>,
	height_attempts: u32,
	commits: u32,
}

/// Mock registry: home organization, staging queue and writes.
#[derive(Clone)]
pub struct MockRegistry {
	state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
	/// Registry with no home organization and an empty staging queue.
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(RegistryState {
				home: Script::new(MockReply::Value(None)),
				staging: Script::new(MockReply::Value(true)),
				writes: Script::new(MockReply::Value(())),
				home_delay: None,
				home_calls: 0,
				staging_calls: 0,
				recorded_heights: Vec::new(),
				height_attempts: 0,
				commits: 0,
			})),
		}
	}

	pub fn with_home(home: HomeOrganization) -> Self {
		let registry = Self::new();
		registry.push_home(MockReply::Value(Some(home)));
		registry
	}

	pub fn push_home(&self, reply: MockReply<Option<HomeOrganization>>) {
		self.state.lock().unwrap().home.push(reply);
	}

	pub fn push_staging(&self, reply: MockReply<bool>) {
		self.state.lock().unwrap().staging.push(reply);
	}

	pub fn push_write(&self, reply: MockReply<()>) {
		self.state.lock().unwrap().writes.push(reply);
	}

	/// Delay every home organization lookup, keeping a sync run in flight.
	pub fn set_home_delay(&self, delay: Duration) {
		self.state.lock().unwrap().home_delay = Some(delay);
	}

	pub fn home_calls(&self) -> u32 {
		self.state.lock().unwrap().home_calls
	}

	pub fn staging_calls(&self) -> u32 {
		self.state.lock().unwrap().staging_calls
	}

	pub fn recorded_heights(&self) -> Vec<u64> {
		self.state.lock().unwrap().recorded_heights.clone()
	}

	pub fn height_attempts(&self) -> u32 {
		self.state.lock().unwrap().height_attempts
	}

	pub fn commits(&self) -> u32 {
		self.state.lock().unwrap().commits
	}
}

impl Default for MockRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl RegistryMetadataSource for MockRegistry {
	async fn home_organization(&self) -> Result<Option<HomeOrganization>, ClientError> {
		let (reply, delay) = {
			let mut state = self.state.lock().unwrap();
			state.home_calls += 1;
			(state.home.next(), state.home_delay)
		};
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		reply
	}
}

#[async_trait::async_trait]
impl StagingQueueSource for MockRegistry {
	async fn staging_confirmed(&self) -> Result<bool, ClientError> {
		let mut state = self.state.lock().unwrap();
		state.staging_calls += 1;
		state.staging.next()
	}
}

#[async_trait::async_trait]
impl RegistryWriter for MockRegistry {
	async fn set_last_processed_height(&self, height: u64) -> Result<(), ClientError> {
		let mut state = self.state.lock().unwrap();
		state.height_attempts += 1;
		state.writes.next()?;
		state.recorded_heights.push(height);
		Ok(())
	}

	async fn commit_staging(&self) -> Result<(), ClientError> {
		let mut state = self.state.lock().unwrap();
		state.writes.next()?;
		state.commits += 1;
		Ok(())
	}
}

#[derive(Default)]
struct LedgerState {
	roots: HashMap<String, Script<LedgerRoot>>,
	calls: HashMap<String, u32>,
}

/// Mock ledger node with one root script per tree id.
#[derive(Clone, Default)]
pub struct MockLedger {
	state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
	/// Ledger node that knows no trees.
	pub fn new() -> Self {
		Self::default()
	}

	/// Ledger node whose confirmed roots match everything `home` recorded.
	pub fn converged_with(home: &HomeOrganization) -> Self {
		let ledger = Self::new();
		ledger.set_root(&home.registry_id, home.registry_hash.as_str(), true);
		ledger.set_root(&home.org_uid, home.org_hash.as_str(), true);
		ledger
	}

	/// Replace the script of `tree_id` with a single repeating root.
	pub fn set_root(&self, tree_id: &str, hash: &str, confirmed: bool) {
		self.script_root(
			tree_id,
			vec![MockReply::Value(LedgerRoot {
				hash: RootHash::new(hash),
				confirmed,
			})],
		);
	}

	/// Replace the script of `tree_id`.
	pub fn script_root(&self, tree_id: &str, replies: Vec<MockReply<LedgerRoot>>) {
		let mut state = self.state.lock().unwrap();
		state
			.roots
			.entry(tree_id.to_string())
			.or_insert_with(|| Script::new(MockReply::Transport(format!("unknown tree {}", tree_id))))
			.replace(replies);
	}

	pub fn root_calls(&self, tree_id: &str) -> u32 {
		self.state
			.lock()
			.unwrap()
			.calls
			.get(tree_id)
			.copied()
			.unwrap_or(0)
	}

	pub fn total_calls(&self) -> u32 {
		self.state.lock().unwrap().calls.values().sum()
	}
}

#[async_trait::async_trait]
impl LedgerNode for MockLedger {
	async fn get_root(&self, tree_id: &str) -> Result<LedgerRoot, ClientError> {
		let mut state = self.state.lock().unwrap();
		*state.calls.entry(tree_id.to_string()).or_insert(0) += 1;
		match state.roots.get_mut(tree_id) {
			Some(script) => script.next(),
			None => Err(ClientError::Rpc(format!("unknown tree {}", tree_id))),
		}
	}
}

struct WalletState {
	confirmations: Script<bool>,
	confirmation_calls: u32,
	idle_waits: u32,
	idle_delay: Option<Duration>,
}

/// Mock wallet: transaction confirmations and idle waits.
#[derive(Clone)]
pub struct MockWallet {
	state: Arc<Mutex<WalletState>>,
}

impl MockWallet {
	/// Wallet that never confirms and is always idle.
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(WalletState {
				confirmations: Script::new(MockReply::Value(false)),
				confirmation_calls: 0,
				idle_waits: 0,
				idle_delay: None,
			})),
		}
	}

	pub fn push_confirmation(&self, reply: MockReply<bool>) {
		self.state.lock().unwrap().confirmations.push(reply);
	}

	/// Make every idle wait take `delay`, as if transactions stayed pending that long.
	pub fn set_idle_delay(&self, delay: Duration) {
		self.state.lock().unwrap().idle_delay = Some(delay);
	}

	pub fn confirmation_calls(&self) -> u32 {
		self.state.lock().unwrap().confirmation_calls
	}

	pub fn idle_waits(&self) -> u32 {
		self.state.lock().unwrap().idle_waits
	}
}

impl Default for MockWallet {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl TransactionSource for MockWallet {
	async fn transaction_confirmed(&self, _transaction_id: &str) -> Result<bool, ClientError> {
		let mut state = self.state.lock().unwrap();
		state.confirmation_calls += 1;
		state.confirmations.next()
	}
}

#[async_trait::async_trait]
impl WalletService for MockWallet {
	async fn wait_for_all_transactions_to_confirm(&self) -> Result<(), ClientError> {
		let delay = {
			let mut state = self.state.lock().unwrap();
			state.idle_waits += 1;
			state.idle_delay
		};
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		Ok(())
	}
}
