//! Deploy, delegate and withdraw flows plus single contract actions.
//!
//! Each flow waits for every transaction to be confirmed before building the
//! next one, and records artifacts only after the step that produced them is
//! confirmed.

use crate::error::FlowError;
use crate::runner::{FlowReport, StepRunner};
use crate::tx::ConfirmedTx;
use crate::{Role, VestingOps};
use chrono::Utc;
use tracing::info;
use vesting_types::{ChainMsg, Coin, Coins, ExecuteMsg, InstantiateMsg, QueryMsg};

const STORE_CODE: &str = "store_code";
const INSTANTIATE: &str = "instantiate";
const LOAD_CONTRACT: &str = "load_contract";

/// Parses a configured amount such as `500000uluna`.
pub fn configured_coin(step: &str, raw: &str) -> Result<Coin, FlowError> {
	raw.parse()
		.map_err(|e| FlowError::invalid_input(step, format!("amount '{}': {}", raw, e)))
}

impl VestingOps {
	/// Stores the contract code, instantiates it and records both artifacts.
	pub async fn deploy(&self) -> Result<FlowReport, FlowError> {
		let mut runner = self.runner("deploy");
		let deploy = &self.config.deploy;
		let deployer = self.accounts.get(Role::Deployer);

		let wasm = runner
			.run("read_wasm", async {
				tokio::fs::read(&deploy.wasm_path).await.map_err(|e| {
					FlowError::invalid_input(
						"read_wasm",
						format!("{}: {}", deploy.wasm_path.display(), e),
					)
				})
			})
			.await?;
		info!(bytes = wasm.len(), "Read contract code");

		let store = ChainMsg::store_code(deployer.address(), &wasm);
		let stored = runner
			.step(
				STORE_CODE,
				self.submitter
					.submit(STORE_CODE, deployer, vec![store], &deploy.store_memo),
			)
			.await?;

		let raw_code_id = stored.attribute("store_code", "code_id")?;
		let code_id: u64 = raw_code_id.parse().map_err(|_| {
			FlowError::invalid_input(STORE_CODE, format!("code id '{}' is not a number", raw_code_id))
		})?;
		self.storage
			.store_code_id(code_id)
			.await
			.map_err(|e| FlowError::storage(STORE_CODE, e))?;

		let start_time = Utc::now().timestamp();
		let end_time = i64::try_from(deploy.vesting_duration_secs)
			.ok()
			.and_then(|duration| start_time.checked_add(duration))
			.ok_or_else(|| {
				FlowError::invalid_input(
					INSTANTIATE,
					format!(
						"vesting duration of {}s is out of range",
						deploy.vesting_duration_secs
					),
				)
			})?;
		let msg = InstantiateMsg {
			owner: self.accounts.owner.address().to_string(),
			recipient: self.accounts.recipient.address().to_string(),
			cliff_amount: deploy.cliff_amount.clone(),
			vesting_amount: deploy.vesting_amount.clone(),
			start_time: start_time.to_string(),
			end_time: end_time.to_string(),
		};
		let funds: Coins = deploy.initial_funds.parse().map_err(|e| {
			FlowError::invalid_input(
				INSTANTIATE,
				format!("initial funds '{}': {}", deploy.initial_funds, e),
			)
		})?;
		let instantiate =
			ChainMsg::instantiate(deployer.address(), code_id, &deploy.label, &msg, funds)
				.map_err(|e| FlowError::invalid_input(INSTANTIATE, e.to_string()))?;

		let instantiated = runner
			.step(
				INSTANTIATE,
				self.submitter.submit(
					INSTANTIATE,
					deployer,
					vec![instantiate],
					&deploy.instantiate_memo,
				),
			)
			.await?;

		let address = instantiated.attribute("instantiate", "_contract_address")?;
		self.storage
			.store_contract_address(address)
			.await
			.map_err(|e| FlowError::storage(INSTANTIATE, e))?;
		info!(code_id, contract = address, "Contract deployed");

		Ok(runner.finish())
	}

	/// Delegates, redelegates, undelegates and withdraws rewards as the owner.
	pub async fn delegate_flow(&self) -> Result<FlowReport, FlowError> {
		let flows = &self.config.flows;
		let messages = vec![
			ExecuteMsg::DelegateFunds {
				validator: flows.validator.clone(),
				amount: configured_coin("delegate_funds", &flows.delegate_amount)?,
			},
			ExecuteMsg::RedelegateFunds {
				src_validator: flows.validator.clone(),
				dst_validator: flows.dst_validator.clone(),
				amount: configured_coin("redelegate_funds", &flows.redelegate_amount)?,
			},
			ExecuteMsg::UndelegateFunds {
				validator: flows.validator.clone(),
				amount: configured_coin("undelegate_funds", &flows.undelegate_amount)?,
			},
			ExecuteMsg::WithdrawDelegatorReward {
				validator: flows.validator.clone(),
			},
		];

		let steps = messages.into_iter().map(|msg| (Role::Owner, msg)).collect();
		self.run_actions("delegate", steps).await
	}

	/// Whitelists the recipient, then withdraws cliff and vested funds as the
	/// recipient.
	pub async fn withdraw_flow(&self) -> Result<FlowReport, FlowError> {
		let denom = &self.config.flows.withdraw_denom;
		let steps = vec![
			(
				Role::Owner,
				ExecuteMsg::AddToWhitelist {
					addresses: vec![self.accounts.recipient.address().to_string()],
				},
			),
			(
				Role::Recipient,
				ExecuteMsg::WithdrawCliffVestedFunds {
					denom: denom.clone(),
				},
			),
			(
				Role::Recipient,
				ExecuteMsg::WithdrawVestedFunds {
					denom: denom.clone(),
				},
			),
		];

		self.run_actions("withdraw", steps).await
	}

	/// Sends a single contract message.
	pub async fn execute(&self, role: Role, msg: ExecuteMsg) -> Result<FlowReport, FlowError> {
		let flow = msg.action();
		self.run_actions(flow, vec![(role, msg)]).await
	}

	/// Runs a smart query against the deployed contract.
	pub async fn query(&self, query: QueryMsg) -> Result<serde_json::Value, FlowError> {
		let step = query.name();
		let mut runner = self.runner(step);
		let contract = self.load_contract(&mut runner).await?;

		let query = serde_json::to_value(&query)
			.map_err(|e| FlowError::invalid_input(step, e.to_string()))?;
		let node = self.delivery().node();
		runner
			.run(step, async {
				self.delivery()
					.retry_policy()
					.run(step, || node.query_contract(&contract, &query))
					.await
					.map_err(|e| FlowError::Delivery {
						step: step.to_string(),
						source: e.into(),
					})
			})
			.await
	}

	async fn load_contract(&self, runner: &mut StepRunner) -> Result<String, FlowError> {
		let contract = runner
			.run(LOAD_CONTRACT, async {
				self.storage
					.contract_address()
					.await
					.map_err(|e| FlowError::storage(LOAD_CONTRACT, e))
			})
			.await?;
		info!(contract = %contract, "Using contract");
		Ok(contract)
	}

	async fn run_actions(
		&self,
		flow: &str,
		steps: Vec<(Role, ExecuteMsg)>,
	) -> Result<FlowReport, FlowError> {
		let mut runner = self.runner(flow);
		let contract = self.load_contract(&mut runner).await?;

		for (role, msg) in steps {
			self.run_action(&mut runner, &contract, role, &msg).await?;
		}

		Ok(runner.finish())
	}

	async fn run_action(
		&self,
		runner: &mut StepRunner,
		contract: &str,
		role: Role,
		msg: &ExecuteMsg,
	) -> Result<ConfirmedTx, FlowError> {
		let step = msg.action();
		let account = self.accounts.get(role);
		let chain_msg = ChainMsg::execute(account.address(), contract, msg, Coins::default())
			.map_err(|e| FlowError::invalid_input(step, e.to_string()))?;
		info!(step, signer = %role, "Executing contract message");

		runner
			.step(step, self.submitter.submit(step, account, vec![chain_msg], ""))
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Accounts;
	use async_trait::async_trait;
	use std::sync::Arc;
	use std::time::Duration;
	use tokio_util::sync::CancellationToken;
	use vesting_account::{AccountError, AccountInterface, AccountService};
	use vesting_config::{Config, ConfigLoader};
	use vesting_delivery::implementations::scripted::{BroadcastScript, ScriptedNode};
	use vesting_delivery::{DeliveryService, PollConfig, RetryPolicy};
	use vesting_storage::implementations::file::create_storage;
	use vesting_storage::implementations::memory::MemoryStorage;
	use vesting_storage::{StorageInterface, StorageService, CONTRACT_ADDRESS_KEY};
	use vesting_types::{
		SignedTransaction, SignerData, TxEvent, UnsignedTransaction, CODE_INSUFFICIENT_FEE,
	};

	const CONFIG: &str = r#"
[network]
endpoint = "http://localhost:1317"
chain_id = "pisco-1"

[delivery]
poll_interval_ms = 1000
poll_timeout_ms = 3000

[signer]
program = "terra-sign"

[accounts.deployer]
address = "terra1deployer"
key = "0"

[accounts.owner]
address = "terra1owner"
key = "1"

[accounts.recipient]
address = "terra1recipient"
key = "2"
"#;

	/// Signs by encoding the signer and the transaction as JSON.
	struct JsonSigner {
		address: String,
	}

	#[async_trait]
	impl AccountInterface for JsonSigner {
		fn address(&self) -> &str {
			&self.address
		}

		async fn sign_transaction(
			&self,
			tx: &UnsignedTransaction,
			signer_data: &SignerData,
		) -> Result<SignedTransaction, AccountError> {
			let envelope = serde_json::json!({
				"signer": self.address,
				"sequence": signer_data.sequence,
				"account_number": signer_data.account_number,
				"tx": tx,
			});
			Ok(SignedTransaction::new(serde_json::to_vec(&envelope).unwrap()))
		}
	}

	fn account(address: &str) -> Arc<AccountService> {
		Arc::new(AccountService::new(Box::new(JsonSigner {
			address: address.to_string(),
		})))
	}

	fn decode(tx: &SignedTransaction) -> serde_json::Value {
		serde_json::from_slice(&tx.bytes).unwrap()
	}

	struct Harness {
		node: Arc<ScriptedNode>,
		ops: VestingOps,
		cancel: CancellationToken,
	}

	fn harness_with(config: Config, storage: Box<dyn StorageInterface>) -> Harness {
		let node = Arc::new(ScriptedNode::new("pisco-1"));
		let delivery = DeliveryService::new(node.clone(), &config.delivery)
			.with_poll_config(PollConfig::new(
				Duration::from_millis(1000),
				Duration::from_millis(3000),
			))
			.with_retry_policy(RetryPolicy::new(
				1,
				Duration::from_millis(10),
				Duration::from_millis(10),
			));
		let accounts = Accounts {
			deployer: account("terra1deployer"),
			owner: account("terra1owner"),
			recipient: account("terra1recipient"),
		};
		let cancel = CancellationToken::new();
		let ops = VestingOps::new(
			config,
			accounts,
			Arc::new(delivery),
			Arc::new(StorageService::new(storage)),
			cancel.clone(),
		);
		Harness { node, ops, cancel }
	}

	async fn harness_with_contract() -> Harness {
		let storage = MemoryStorage::new();
		storage
			.write(CONTRACT_ADDRESS_KEY, "terra1contract")
			.await
			.unwrap();
		harness_with(ConfigLoader::from_toml(CONFIG).unwrap(), Box::new(storage))
	}

	fn executed_actions(node: &ScriptedNode) -> Vec<(String, String)> {
		node.broadcasts()
			.iter()
			.map(|tx| {
				let value = decode(tx);
				let msg = &value["tx"]["body"]["messages"][0];
				let action = msg["msg"]
					.as_object()
					.and_then(|o| o.keys().next().cloned())
					.unwrap_or_default();
				(value["signer"].as_str().unwrap().to_string(), action)
			})
			.collect()
	}

	#[tokio::test(start_paused = true)]
	async fn test_deploy_records_artifacts() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("vesting.wasm");
		std::fs::write(&wasm_path, b"\0asm\x01\0\0\0").unwrap();

		let mut config = ConfigLoader::from_toml(CONFIG).unwrap();
		config.deploy.wasm_path = wasm_path;
		let artifacts = dir.path().join("scripts");
		let h = harness_with(config, create_storage(artifacts.clone()));

		h.node.push_script(BroadcastScript::included_after(1).with_events(vec![
			TxEvent::new("message", &[("action", "/cosmwasm.wasm.v1.MsgStoreCode")]),
			TxEvent::new("store_code", &[("code_checksum", "ab"), ("code_id", "8123")]),
		]));
		h.node.push_script(BroadcastScript::included_after(2).with_events(vec![
			TxEvent::new(
				"instantiate",
				&[("_contract_address", "terra1vesting"), ("code_id", "8123")],
			),
		]));

		let report = h.ops.deploy().await.unwrap();

		let steps: Vec<_> = report.steps.iter().map(|s| s.step.as_str()).collect();
		assert_eq!(steps, vec!["store_code", "instantiate"]);
		assert_eq!(
			std::fs::read_to_string(artifacts.join("code_id.txt")).unwrap(),
			"8123"
		);
		assert_eq!(
			std::fs::read_to_string(artifacts.join("address.txt")).unwrap(),
			"terra1vesting"
		);

		let broadcasts = h.node.broadcasts();
		assert_eq!(broadcasts.len(), 2);
		let instantiate = decode(&broadcasts[1]);
		let msg = &instantiate["tx"]["body"]["messages"][0];
		assert_eq!(msg["code_id"], "8123");
		assert_eq!(msg["msg"]["owner"], "terra1owner");
		assert_eq!(msg["msg"]["recipient"], "terra1recipient");
		assert_eq!(msg["funds"][0]["amount"], "10000000");
		let start: i64 = msg["msg"]["start_time"].as_str().unwrap().parse().unwrap();
		let end: i64 = msg["msg"]["end_time"].as_str().unwrap().parse().unwrap();
		assert_eq!(end - start, 86_400);
		assert_eq!(
			instantiate["tx"]["body"]["memo"],
			"Instantiate a Community Pool Vesting Smart Contract"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_store_writes_no_artifacts() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("vesting.wasm");
		std::fs::write(&wasm_path, b"\0asm").unwrap();

		let mut config = ConfigLoader::from_toml(CONFIG).unwrap();
		config.deploy.wasm_path = wasm_path;
		let artifacts = dir.path().join("scripts");
		let h = harness_with(config, create_storage(artifacts.clone()));
		h.node.push_script(BroadcastScript::never_included());

		let err = h.ops.deploy().await.unwrap_err();

		assert!(matches!(err, FlowError::ConfirmationTimedOut { attempts: 3, .. }));
		assert_eq!(err.step(), "store_code");
		assert_eq!(h.node.broadcast_count(), 1);
		assert!(!artifacts.join("code_id.txt").exists());
		assert!(!artifacts.join("address.txt").exists());
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_instantiate_keeps_only_code_id() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("vesting.wasm");
		std::fs::write(&wasm_path, b"\0asm").unwrap();

		let mut config = ConfigLoader::from_toml(CONFIG).unwrap();
		config.deploy.wasm_path = wasm_path;
		let storage = MemoryStorage::new();
		let h = harness_with(config, Box::new(storage));
		h.node.push_script(BroadcastScript::included_after(1).with_events(vec![
			TxEvent::new("store_code", &[("code_id", "77")]),
		]));
		h.node.push_script(
			BroadcastScript::included_after(1).with_failure(5, "Invalid vesting schedule"),
		);

		let err = h.ops.deploy().await.unwrap_err();

		assert!(matches!(err, FlowError::ExecutionFailed { .. }));
		assert_eq!(err.step(), "instantiate");
		assert_eq!(h.ops.storage().code_id().await.unwrap(), 77);
		assert!(h.ops.storage().contract_address().await.is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_out_of_range_vesting_duration() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("vesting.wasm");
		std::fs::write(&wasm_path, b"\0asm").unwrap();

		let mut config = ConfigLoader::from_toml(CONFIG).unwrap();
		config.deploy.wasm_path = wasm_path;
		config.deploy.vesting_duration_secs = u64::MAX;
		let h = harness_with(config, Box::new(MemoryStorage::new()));
		h.node.push_script(BroadcastScript::included_after(1).with_events(vec![
			TxEvent::new("store_code", &[("code_id", "77")]),
		]));

		let err = h.ops.deploy().await.unwrap_err();

		assert!(matches!(err, FlowError::InvalidInput { .. }));
		assert_eq!(err.step(), "instantiate");
		assert_eq!(h.node.broadcast_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_store_without_code_id_event() {
		let dir = tempfile::tempdir().unwrap();
		let wasm_path = dir.path().join("vesting.wasm");
		std::fs::write(&wasm_path, b"\0asm").unwrap();

		let mut config = ConfigLoader::from_toml(CONFIG).unwrap();
		config.deploy.wasm_path = wasm_path;
		let h = harness_with(config, Box::new(MemoryStorage::new()));
		h.node.push_script(BroadcastScript::included_after(1));

		let err = h.ops.deploy().await.unwrap_err();

		assert!(matches!(err, FlowError::MissingEvent { .. }));
		assert!(h.ops.storage().code_id().await.is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_delegate_flow_runs_in_order() {
		let h = harness_with_contract().await;

		let report = h.ops.delegate_flow().await.unwrap();

		let steps: Vec<_> = report.steps.iter().map(|s| s.step.as_str()).collect();
		assert_eq!(
			steps,
			vec![
				"delegate_funds",
				"redelegate_funds",
				"undelegate_funds",
				"withdraw_delegator_reward"
			]
		);
		let actions = executed_actions(&h.node);
		assert!(actions.iter().all(|(signer, _)| signer == "terra1owner"));

		let first = decode(&h.node.broadcasts()[0]);
		let msg = &first["tx"]["body"]["messages"][0];
		assert_eq!(msg["contract"], "terra1contract");
		assert_eq!(
			msg["msg"]["delegate_funds"]["validator"],
			"terravaloper1zdpgj8am5nqqvht927k3etljyl6a52kwqndjz2"
		);
		assert_eq!(msg["msg"]["delegate_funds"]["amount"]["amount"], "500000");
	}

	#[tokio::test(start_paused = true)]
	async fn test_rejection_halts_flow() {
		let h = harness_with_contract().await;
		h.node.push_script(BroadcastScript::included_after(1));
		h.node.push_script(BroadcastScript::rejected(
			CODE_INSUFFICIENT_FEE,
			"insufficient fee",
		));

		let err = h.ops.delegate_flow().await.unwrap_err();

		match &err {
			FlowError::BroadcastRejected { step, reason, .. } => {
				assert_eq!(step, "redelegate_funds");
				assert_eq!(reason.log(), "insufficient fee");
			}
			other => panic!("unexpected error {:?}", other),
		}
		assert_eq!(h.node.broadcast_count(), 2);
		// Only the delegation was polled.
		assert_eq!(h.node.poll_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_withdraw_flow_signers() {
		let h = harness_with_contract().await;

		h.ops.withdraw_flow().await.unwrap();

		assert_eq!(
			executed_actions(&h.node),
			vec![
				("terra1owner".to_string(), "add_to_whitelist".to_string()),
				(
					"terra1recipient".to_string(),
					"withdraw_cliff_vested_funds".to_string()
				),
				(
					"terra1recipient".to_string(),
					"withdraw_vested_funds".to_string()
				),
			]
		);
		let whitelist = decode(&h.node.broadcasts()[0]);
		assert_eq!(
			whitelist["tx"]["body"]["messages"][0]["msg"]["add_to_whitelist"]["addresses"][0],
			"terra1recipient"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_fee_is_sized_from_simulation() {
		let h = harness_with_contract().await;
		h.node.set_gas_used(100_000);
		h.node.set_account("terra1owner", 42, 9);

		h.ops
			.execute(
				Role::Owner,
				ExecuteMsg::UpdateRecipient {
					recipient: "terra1new".to_string(),
				},
			)
			.await
			.unwrap();

		let simulated = decode(&h.node.simulations()[0]);
		assert_eq!(simulated["tx"]["auth_info"]["fee"]["gas_limit"], "2000000");

		let sent = decode(&h.node.broadcasts()[0]);
		assert_eq!(sent["tx"]["auth_info"]["fee"]["gas_limit"], "175000");
		assert_eq!(sent["tx"]["auth_info"]["fee"]["amount"][0]["amount"], "2625");
		assert_eq!(sent["tx"]["auth_info"]["fee"]["amount"][0]["denom"], "uluna");
		assert_eq!(sent["sequence"], 9);
		assert_eq!(sent["account_number"], 42);
	}

	#[tokio::test(start_paused = true)]
	async fn test_simulation_failure_is_not_broadcast() {
		let h = harness_with_contract().await;
		h.node.fail_simulation("execute wasm contract failed: Unauthorized");

		let err = h
			.ops
			.execute(
				Role::Recipient,
				ExecuteMsg::UpdateOwner {
					owner: "terra1mallory".to_string(),
				},
			)
			.await
			.unwrap_err();

		assert!(matches!(err, FlowError::SimulationFailed { .. }));
		assert_eq!(err.step(), "update_owner");
		assert_eq!(h.node.broadcast_count(), 0);
	}

	#[tokio::test]
	async fn test_missing_contract_address() {
		let config = ConfigLoader::from_toml(CONFIG).unwrap();
		let h = harness_with(config, Box::new(MemoryStorage::new()));

		let err = h.ops.delegate_flow().await.unwrap_err();

		assert!(matches!(err, FlowError::Storage { .. }));
		assert_eq!(err.step(), "load_contract");
		assert_eq!(h.node.broadcast_count(), 0);
	}

	#[tokio::test]
	async fn test_cancelled_flow_sends_nothing() {
		let h = harness_with_contract().await;
		h.cancel.cancel();

		let err = h.ops.withdraw_flow().await.unwrap_err();

		assert!(matches!(err, FlowError::Cancelled { .. }));
		assert_eq!(h.node.broadcast_count(), 0);
	}

	#[tokio::test]
	async fn test_query_contract() {
		let h = harness_with_contract().await;
		h.node.set_query_response(serde_json::json!({
			"owner": "terra1owner",
			"recipient": "terra1recipient"
		}));

		let config = h.ops.query(QueryMsg::QueryConfig).await.unwrap();

		assert_eq!(config["owner"], "terra1owner");
		let queries = h.node.queries();
		assert_eq!(queries[0].0, "terra1contract");
		assert_eq!(queries[0].1, serde_json::json!("query_config"));
	}
}
