//! In-memory node whose behaviour is scripted per broadcast.
//!
//! Each broadcast consumes the next `BroadcastScript` (or the default, which
//! includes the transaction on the first poll). Inclusion heights grow from
//! the height at submission, one block per successful status lookup.

use crate::{BroadcastResponse, NodeError, NodeInterface};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use vesting_types::{
	AccountInfo, SignedTransaction, TxEvent, TxHash, TxStatus, CODE_WRONG_SEQUENCE,
};

const INITIAL_HEIGHT: u64 = 1_000;
const DEFAULT_GAS: u64 = 150_000;

/// How the node treats one broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastScript {
	broadcast_code: u32,
	broadcast_log: String,
	/// Successful lookups needed before the tx shows up; `None` never does.
	include_after: Option<u32>,
	exec_code: u32,
	exec_log: String,
	events: Vec<TxEvent>,
}

impl BroadcastScript {
	pub fn included_after(polls: u32) -> Self {
		Self {
			broadcast_code: 0,
			broadcast_log: String::new(),
			include_after: Some(polls.max(1)),
			exec_code: 0,
			exec_log: String::new(),
			events: Vec::new(),
		}
	}

	pub fn never_included() -> Self {
		Self {
			include_after: None,
			..Self::included_after(1)
		}
	}

	pub fn rejected(code: u32, log: &str) -> Self {
		Self::never_included().with_broadcast_code(code, log)
	}

	pub fn with_broadcast_code(mut self, code: u32, log: &str) -> Self {
		self.broadcast_code = code;
		self.broadcast_log = log.to_string();
		self
	}

	pub fn with_failure(mut self, code: u32, log: &str) -> Self {
		self.exec_code = code;
		self.exec_log = log.to_string();
		self
	}

	pub fn with_events(mut self, events: Vec<TxEvent>) -> Self {
		self.events = events;
		self
	}

	fn is_rejected(&self) -> bool {
		self.broadcast_code != 0 && self.broadcast_code != vesting_types::CODE_TX_IN_MEMPOOL
	}
}

impl Default for BroadcastScript {
	fn default() -> Self {
		Self::included_after(1)
	}
}

struct Tracked {
	script: BroadcastScript,
	submitted_at: u64,
	lookups: u32,
}

struct State {
	scripts: VecDeque<BroadcastScript>,
	tracked: HashMap<TxHash, Tracked>,
	height: u64,
	failing_broadcasts: u32,
	lost_responses: u32,
	failing_polls: u32,
	broadcast_count: u32,
	poll_count: u32,
	broadcasts: Vec<SignedTransaction>,
	simulations: Vec<SignedTransaction>,
	simulation_error: Option<String>,
	gas_used: u64,
	accounts: HashMap<String, AccountInfo>,
	query_response: serde_json::Value,
	queries: Vec<(String, serde_json::Value)>,
}

pub struct ScriptedNode {
	chain_id: String,
	state: Mutex<State>,
}

impl ScriptedNode {
	pub fn new(chain_id: &str) -> Self {
		Self {
			chain_id: chain_id.to_string(),
			state: Mutex::new(State {
				scripts: VecDeque::new(),
				tracked: HashMap::new(),
				height: INITIAL_HEIGHT,
				failing_broadcasts: 0,
				lost_responses: 0,
				failing_polls: 0,
				broadcast_count: 0,
				poll_count: 0,
				broadcasts: Vec::new(),
				simulations: Vec::new(),
				simulation_error: None,
				gas_used: DEFAULT_GAS,
				accounts: HashMap::new(),
				query_response: serde_json::json!({}),
				queries: Vec::new(),
			}),
		}
	}

	fn state(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn push_script(&self, script: BroadcastScript) {
		self.state().scripts.push_back(script);
	}

	/// The next `n` broadcasts fail with a transient error.
	pub fn fail_next_broadcasts(&self, n: u32) {
		self.state().failing_broadcasts = n;
	}

	/// The next `n` broadcasts are processed, but the caller sees a transient
	/// error instead of the response.
	pub fn lose_next_broadcast_responses(&self, n: u32) {
		self.state().lost_responses = n;
	}

	/// The next `n` status lookups fail with a transient error.
	pub fn fail_next_polls(&self, n: u32) {
		self.state().failing_polls = n;
	}

	pub fn fail_simulation(&self, log: &str) {
		self.state().simulation_error = Some(log.to_string());
	}

	pub fn set_gas_used(&self, gas: u64) {
		self.state().gas_used = gas;
	}

	pub fn set_account(&self, address: &str, account_number: u64, sequence: u64) {
		self.state().accounts.insert(
			address.to_string(),
			AccountInfo {
				address: address.to_string(),
				account_number,
				sequence,
			},
		);
	}

	pub fn set_query_response(&self, response: serde_json::Value) {
		self.state().query_response = response;
	}

	/// Broadcast calls, including failed ones.
	pub fn broadcast_count(&self) -> u32 {
		self.state().broadcast_count
	}

	/// Status lookups, including failed ones.
	pub fn poll_count(&self) -> u32 {
		self.state().poll_count
	}

	pub fn current_height(&self) -> u64 {
		self.state().height
	}

	/// Transactions that reached the node, in order.
	pub fn broadcasts(&self) -> Vec<SignedTransaction> {
		self.state().broadcasts.clone()
	}

	pub fn simulations(&self) -> Vec<SignedTransaction> {
		self.state().simulations.clone()
	}

	pub fn queries(&self) -> Vec<(String, serde_json::Value)> {
		self.state().queries.clone()
	}
}

#[async_trait]
impl NodeInterface for ScriptedNode {
	fn chain_id(&self) -> &str {
		&self.chain_id
	}

	async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastResponse, NodeError> {
		let mut state = self.state();
		state.broadcast_count += 1;
		if state.failing_broadcasts > 0 {
			state.failing_broadcasts -= 1;
			return Err(NodeError::Transient("connection refused".to_string()));
		}

		let hash = tx.hash();
		if state.tracked.contains_key(&hash) {
			// Sending the same bytes again reuses a spent sequence.
			return Ok(BroadcastResponse {
				hash,
				code: CODE_WRONG_SEQUENCE,
				codespace: "sdk".to_string(),
				raw_log: "account sequence mismatch".to_string(),
			});
		}

		let script = state.scripts.pop_front().unwrap_or_default();
		state.broadcasts.push(tx.clone());

		let response = BroadcastResponse {
			hash: hash.clone(),
			code: script.broadcast_code,
			codespace: if script.broadcast_code == 0 {
				String::new()
			} else {
				"sdk".to_string()
			},
			raw_log: script.broadcast_log.clone(),
		};

		if !script.is_rejected() {
			let submitted_at = state.height;
			state.tracked.insert(
				hash,
				Tracked {
					script,
					submitted_at,
					lookups: 0,
				},
			);
		}
		if state.lost_responses > 0 {
			state.lost_responses -= 1;
			return Err(NodeError::Transient("connection reset".to_string()));
		}
		Ok(response)
	}

	async fn get_transaction(&self, hash: &TxHash) -> Result<Option<TxStatus>, NodeError> {
		let mut state = self.state();
		state.poll_count += 1;
		if state.failing_polls > 0 {
			state.failing_polls -= 1;
			return Err(NodeError::Transient("request timed out".to_string()));
		}

		let Some(tracked) = state.tracked.get_mut(hash) else {
			return Ok(None);
		};
		tracked.lookups += 1;
		let included = matches!(tracked.script.include_after, Some(n) if tracked.lookups >= n);
		if !included {
			return Ok(None);
		}

		let status = TxStatus {
			hash: hash.clone(),
			height: tracked.submitted_at + u64::from(tracked.script.include_after.unwrap_or(1)),
			code: tracked.script.exec_code,
			codespace: if tracked.script.exec_code == 0 {
				String::new()
			} else {
				"wasm".to_string()
			},
			raw_log: tracked.script.exec_log.clone(),
			gas_used: DEFAULT_GAS,
			events: tracked.script.events.clone(),
		};
		state.height = state.height.max(status.height);
		Ok(Some(status))
	}

	async fn latest_height(&self) -> Result<u64, NodeError> {
		Ok(self.state().height)
	}

	async fn account(&self, address: &str) -> Result<AccountInfo, NodeError> {
		Ok(self
			.state()
			.accounts
			.get(address)
			.cloned()
			.unwrap_or_else(|| AccountInfo {
				address: address.to_string(),
				account_number: 1,
				sequence: 0,
			}))
	}

	async fn simulate(&self, tx: &SignedTransaction) -> Result<u64, NodeError> {
		let mut state = self.state();
		state.simulations.push(tx.clone());
		match &state.simulation_error {
			Some(log) => Err(NodeError::Status {
				status: 400,
				body: log.clone(),
			}),
			None => Ok(state.gas_used),
		}
	}

	async fn query_contract(
		&self,
		contract: &str,
		query: &serde_json::Value,
	) -> Result<serde_json::Value, NodeError> {
		let mut state = self.state();
		state.queries.push((contract.to_string(), query.clone()));
		Ok(state.query_response.clone())
	}
}
