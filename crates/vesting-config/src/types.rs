//! Configuration types for the vesting operations tooling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Log level used when RUST_LOG is not set
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Node endpoint and fee settings
	pub network: NetworkConfig,
	/// Confirmation polling and retry settings
	#[serde(default)]
	pub delivery: DeliveryConfig,
	/// External signer program
	pub signer: SignerConfig,
	/// Signing accounts by role
	pub accounts: AccountsConfig,
	/// Artifact persistence
	#[serde(default)]
	pub storage: StorageConfig,
	/// Contract deployment parameters
	#[serde(default)]
	pub deploy: DeployConfig,
	/// Parameters of the lifecycle flows
	#[serde(default)]
	pub flows: FlowsConfig,
}

/// Chain and node settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// LCD REST endpoint
	pub endpoint: String,
	/// Chain the transactions target, e.g. `pisco-1`
	pub chain_id: String,
	/// Bech32 address prefix
	#[serde(default = "default_prefix")]
	pub prefix: String,
	/// Safety multiplier applied to simulated gas
	#[serde(default = "default_gas_adjustment")]
	pub gas_adjustment: f64,
	/// Price per unit of gas, by fee denomination
	#[serde(default = "default_gas_prices")]
	pub gas_prices: BTreeMap<String, f64>,
	/// Denomination fees are paid in
	#[serde(default = "default_fee_denom")]
	pub fee_denom: String,
	/// Per-request HTTP timeout
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

impl NetworkConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn fee_gas_price(&self) -> Option<f64> {
		self.gas_prices.get(&self.fee_denom).copied()
	}
}

/// Confirmation polling settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_poll_timeout_ms")]
	pub poll_timeout_ms: u64,
	/// Retries for a single node request failing with a transient error
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			poll_timeout_ms: default_poll_timeout_ms(),
			max_retries: default_max_retries(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
		}
	}
}

impl DeliveryConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn poll_timeout(&self) -> Duration {
		Duration::from_millis(self.poll_timeout_ms)
	}
}

/// External program producing signed transaction bytes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
	pub program: String,
	#[serde(default)]
	pub args: Vec<String>,
	/// Environment variable holding the signing credential
	#[serde(default = "default_credential_env")]
	pub credential_env: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	pub address: String,
	/// Key name or derivation index passed to the signer
	pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsConfig {
	pub deployer: AccountConfig,
	pub owner: AccountConfig,
	pub recipient: AccountConfig,
}

impl AccountsConfig {
	pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AccountConfig)> {
		[
			("deployer", &self.deployer),
			("owner", &self.owner),
			("recipient", &self.recipient),
		]
		.into_iter()
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Directory holding `code_id.txt` and `address.txt`
	#[serde(default = "default_artifact_dir")]
	pub artifact_dir: PathBuf,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			artifact_dir: default_artifact_dir(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
	pub wasm_path: PathBuf,
	pub label: String,
	pub store_memo: String,
	pub instantiate_memo: String,
	pub cliff_amount: String,
	pub vesting_amount: String,
	pub vesting_duration_secs: u64,
	/// Funds sent with instantiation, e.g. `10000000uluna`
	pub initial_funds: String,
}

impl Default for DeployConfig {
	fn default() -> Self {
		Self {
			wasm_path: PathBuf::from("./artifacts/community_pool_vesting.wasm"),
			label: "Create a Community Pool Vesting Smart Contract".to_string(),
			store_memo: "Community Pool Vesting Smart Contract".to_string(),
			instantiate_memo: "Instantiate a Community Pool Vesting Smart Contract".to_string(),
			cliff_amount: "1".to_string(),
			vesting_amount: "1000".to_string(),
			vesting_duration_secs: 86_400,
			initial_funds: "10000000uluna".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowsConfig {
	pub validator: String,
	pub dst_validator: String,
	pub delegate_amount: String,
	pub redelegate_amount: String,
	pub undelegate_amount: String,
	pub withdraw_denom: String,
}

impl Default for FlowsConfig {
	fn default() -> Self {
		Self {
			validator: "terravaloper1zdpgj8am5nqqvht927k3etljyl6a52kwqndjz2".to_string(),
			dst_validator: "terravaloper13sulzl3p0wk2t0x7aws7w8glmrh83z4y8atvgr".to_string(),
			delegate_amount: "500000uluna".to_string(),
			redelegate_amount: "100000uluna".to_string(),
			undelegate_amount: "100000uluna".to_string(),
			withdraw_denom: "uluna".to_string(),
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_prefix() -> String {
	"terra".to_string()
}

fn default_gas_adjustment() -> f64 {
	1.75
}

fn default_gas_prices() -> BTreeMap<String, f64> {
	BTreeMap::from([("uluna".to_string(), 0.015)])
}

fn default_fee_denom() -> String {
	"uluna".to_string()
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

fn default_poll_interval_ms() -> u64 {
	1_000
}

fn default_poll_timeout_ms() -> u64 {
	60_000
}

fn default_max_retries() -> u32 {
	3
}

fn default_initial_backoff_ms() -> u64 {
	500
}

fn default_max_backoff_ms() -> u64 {
	5_000
}

fn default_credential_env() -> String {
	"MNEMONIC".to_string()
}

fn default_artifact_dir() -> PathBuf {
	PathBuf::from("./scripts")
}
