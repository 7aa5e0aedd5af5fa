//! Node client for the Cosmos SDK REST gateway (LCD).

use crate::{BroadcastResponse, DeliveryError, NodeError, NodeInterface};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use vesting_config::NetworkConfig;
use vesting_types::{
	serde_helpers::u64_string, AccountInfo, SignedTransaction, TxEvent, TxHash, TxStatus,
};

/// LCD client bound to one chain.
pub struct LcdNode {
	client: reqwest::Client,
	/// Base URL without a trailing slash.
	endpoint: String,
	chain_id: String,
}

impl LcdNode {
	pub fn new(config: &NetworkConfig) -> Result<Self, DeliveryError> {
		let client = reqwest::Client::builder()
			.timeout(config.request_timeout())
			.build()
			.map_err(|e| DeliveryError::Config(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: config.endpoint.trim_end_matches('/').to_string(),
			chain_id: config.chain_id.clone(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.endpoint, path)
	}

	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
		debug!(path, "LCD GET");
		let response = self
			.client
			.get(self.url(path))
			.send()
			.await
			.map_err(map_request_error)?;
		decode(response).await
	}

	async fn post<T: DeserializeOwned>(
		&self,
		path: &str,
		body: &serde_json::Value,
	) -> Result<T, NodeError> {
		debug!(path, "LCD POST");
		let response = self
			.client
			.post(self.url(path))
			.json(body)
			.send()
			.await
			.map_err(map_request_error)?;
		decode(response).await
	}
}

fn map_request_error(e: reqwest::Error) -> NodeError {
	if e.is_timeout() || e.is_connect() || e.is_request() {
		NodeError::Transient(e.to_string())
	} else {
		NodeError::Decode(e.to_string())
	}
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NodeError> {
	let status = response.status();
	let body = response
		.text()
		.await
		.map_err(|e| NodeError::Transient(format!("Failed to read response body: {}", e)))?;

	if !status.is_success() {
		return Err(classify_status(status, body));
	}

	serde_json::from_str(&body).map_err(|e| NodeError::Decode(e.to_string()))
}

fn classify_status(status: StatusCode, body: String) -> NodeError {
	if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
		NodeError::Transient(format!("HTTP {}: {}", status.as_u16(), body))
	} else if status == StatusCode::NOT_FOUND || is_not_found_message(&body) {
		NodeError::NotFound(body)
	} else {
		NodeError::Status {
			status: status.as_u16(),
			body,
		}
	}
}

/// The gateway reports unknown transactions as a 400 or 404 with a
/// "tx not found" message, depending on the node version.
fn is_not_found_message(body: &str) -> bool {
	body.to_ascii_lowercase().contains("not found")
}

#[derive(Deserialize)]
struct TxResponseEnvelope {
	tx_response: TxResponse,
}

#[derive(Deserialize)]
struct TxResponse {
	txhash: String,
	#[serde(default, with = "u64_string")]
	height: u64,
	#[serde(default)]
	code: u32,
	#[serde(default)]
	codespace: String,
	#[serde(default)]
	raw_log: String,
	#[serde(default, with = "u64_string")]
	gas_used: u64,
	#[serde(default)]
	events: Vec<TxEvent>,
}

impl From<TxResponse> for TxStatus {
	fn from(r: TxResponse) -> Self {
		TxStatus {
			hash: TxHash::new(&r.txhash),
			height: r.height,
			code: r.code,
			codespace: r.codespace,
			raw_log: r.raw_log,
			gas_used: r.gas_used,
			events: r.events,
		}
	}
}

#[derive(Deserialize)]
struct LatestBlock {
	block: Block,
}

#[derive(Deserialize)]
struct Block {
	header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
	#[serde(with = "u64_string")]
	height: u64,
}

#[derive(Deserialize)]
struct AccountEnvelope {
	account: serde_json::Value,
}

#[derive(Deserialize)]
struct BaseAccount {
	address: String,
	#[serde(default, with = "u64_string")]
	account_number: u64,
	#[serde(default, with = "u64_string")]
	sequence: u64,
}

#[derive(Deserialize)]
struct SimulateResponse {
	gas_info: GasInfo,
}

#[derive(Deserialize)]
struct GasInfo {
	#[serde(with = "u64_string")]
	gas_used: u64,
}

#[derive(Deserialize)]
struct SmartQueryResponse {
	data: serde_json::Value,
}

/// Finds the base account inside plain and vesting account encodings.
fn parse_account(account: &serde_json::Value) -> Result<AccountInfo, NodeError> {
	let base = if account.get("address").is_some() {
		account
	} else if let Some(base) = account.get("base_account") {
		base
	} else if let Some(base) = account
		.get("base_vesting_account")
		.and_then(|v| v.get("base_account"))
	{
		base
	} else {
		return Err(NodeError::Decode(format!(
			"Unrecognised account encoding: {}",
			account
		)));
	};

	let parsed: BaseAccount =
		serde_json::from_value(base.clone()).map_err(|e| NodeError::Decode(e.to_string()))?;
	Ok(AccountInfo {
		address: parsed.address,
		account_number: parsed.account_number,
		sequence: parsed.sequence,
	})
}

#[async_trait]
impl NodeInterface for LcdNode {
	fn chain_id(&self) -> &str {
		&self.chain_id
	}

	async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastResponse, NodeError> {
		let body = serde_json::json!({
			"tx_bytes": tx.to_base64(),
			"mode": "BROADCAST_MODE_SYNC",
		});
		let envelope: TxResponseEnvelope = self.post("/cosmos/tx/v1beta1/txs", &body).await?;
		let r = envelope.tx_response;

		Ok(BroadcastResponse {
			hash: TxHash::new(&r.txhash),
			code: r.code,
			codespace: r.codespace,
			raw_log: r.raw_log,
		})
	}

	async fn get_transaction(&self, hash: &TxHash) -> Result<Option<TxStatus>, NodeError> {
		let path = format!("/cosmos/tx/v1beta1/txs/{}", hash);
		match self.get::<TxResponseEnvelope>(&path).await {
			Ok(envelope) => Ok(Some(envelope.tx_response.into())),
			Err(NodeError::NotFound(_)) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn latest_height(&self) -> Result<u64, NodeError> {
		let latest: LatestBlock = self
			.get("/cosmos/base/tendermint/v1beta1/blocks/latest")
			.await?;
		Ok(latest.block.header.height)
	}

	async fn account(&self, address: &str) -> Result<AccountInfo, NodeError> {
		let path = format!("/cosmos/auth/v1beta1/accounts/{}", address);
		let envelope: AccountEnvelope = self.get(&path).await?;
		parse_account(&envelope.account)
	}

	async fn simulate(&self, tx: &SignedTransaction) -> Result<u64, NodeError> {
		let body = serde_json::json!({ "tx_bytes": tx.to_base64() });
		let response: SimulateResponse = self.post("/cosmos/tx/v1beta1/simulate", &body).await?;
		Ok(response.gas_info.gas_used)
	}

	async fn query_contract(
		&self,
		contract: &str,
		query: &serde_json::Value,
	) -> Result<serde_json::Value, NodeError> {
		let encoded = URL_SAFE.encode(query.to_string());
		let path = format!("/cosmwasm/wasm/v1/contract/{}/smart/{}", contract, encoded);
		let response: SmartQueryResponse = self.get(&path).await?;
		Ok(response.data)
	}
}

/// Creates the node client for the configured network.
pub fn create_node(config: &NetworkConfig) -> Result<Arc<dyn NodeInterface>, DeliveryError> {
	Ok(Arc::new(LcdNode::new(config)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use vesting_types::find_attribute;

	#[test]
	fn test_tx_response_decoding() {
		let raw = json!({
			"tx": {},
			"tx_response": {
				"height": "4521337",
				"txhash": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
				"codespace": "",
				"code": 0,
				"raw_log": "[]",
				"gas_wanted": "300000",
				"gas_used": "182041",
				"events": [
					{
						"type": "store_code",
						"attributes": [
							{ "key": "code_checksum", "value": "aa", "index": true },
							{ "key": "code_id", "value": "8123", "index": true }
						]
					}
				]
			}
		});

		let envelope: TxResponseEnvelope = serde_json::from_value(raw).unwrap();
		let status: TxStatus = envelope.tx_response.into();
		assert_eq!(status.height, 4_521_337);
		assert_eq!(status.gas_used, 182_041);
		assert!(status.is_success());
		assert_eq!(
			status.hash.as_str(),
			"9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08"
		);
		assert_eq!(
			find_attribute(&status.events, "store_code", "code_id"),
			Some("8123")
		);
	}

	#[test]
	fn test_rejected_broadcast_decoding() {
		let raw = json!({
			"tx_response": {
				"height": "0",
				"txhash": "ABCD",
				"codespace": "sdk",
				"code": 13,
				"raw_log": "insufficient fees; got: 10uluna required: 4500uluna: insufficient fee"
			}
		});

		let envelope: TxResponseEnvelope = serde_json::from_value(raw).unwrap();
		assert_eq!(envelope.tx_response.code, 13);
		assert_eq!(envelope.tx_response.codespace, "sdk");
		assert!(envelope.tx_response.events.is_empty());
	}

	#[test]
	fn test_account_encodings() {
		let plain = json!({
			"@type": "/cosmos.auth.v1beta1.BaseAccount",
			"address": "terra1owner",
			"pub_key": null,
			"account_number": "12",
			"sequence": "7"
		});
		let info = parse_account(&plain).unwrap();
		assert_eq!((info.account_number, info.sequence), (12, 7));

		let vesting = json!({
			"@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
			"base_vesting_account": {
				"base_account": {
					"address": "terra1vesting",
					"account_number": "99",
					"sequence": "0"
				},
				"original_vesting": []
			},
			"start_time": "0"
		});
		let info = parse_account(&vesting).unwrap();
		assert_eq!(info.address, "terra1vesting");
		assert_eq!(info.account_number, 99);

		assert!(matches!(
			parse_account(&json!({ "@type": "unknown" })),
			Err(NodeError::Decode(_))
		));
	}

	#[test]
	fn test_status_classification() {
		assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
		assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
		assert!(matches!(
			classify_status(StatusCode::NOT_FOUND, String::new()),
			NodeError::NotFound(_)
		));
		assert!(matches!(
			classify_status(
				StatusCode::BAD_REQUEST,
				r#"{"code":5,"message":"tx not found: ABCD"}"#.to_string()
			),
			NodeError::NotFound(_)
		));
		assert!(matches!(
			classify_status(StatusCode::BAD_REQUEST, "invalid request".to_string()),
			NodeError::Status { status: 400, .. }
		));
	}

	#[test]
	fn test_endpoint_normalisation() {
		let config = NetworkConfig {
			endpoint: "https://pisco-lcd.terra.dev/".to_string(),
			chain_id: "pisco-1".to_string(),
			prefix: "terra".to_string(),
			gas_adjustment: 1.75,
			gas_prices: [("uluna".to_string(), 0.015)].into_iter().collect(),
			fee_denom: "uluna".to_string(),
			request_timeout_ms: 5000,
		};
		let node = LcdNode::new(&config).unwrap();
		assert_eq!(
			node.url("/cosmos/tx/v1beta1/txs"),
			"https://pisco-lcd.terra.dev/cosmos/tx/v1beta1/txs"
		);
		assert_eq!(node.chain_id(), "pisco-1");
	}
}
