//! Message builder for the vesting contract.
//!
//! Contract payloads (`InstantiateMsg`, `ExecuteMsg`, `QueryMsg`) mirror the
//! contract's JSON schema. `ChainMsg` wraps them into the wasm module messages
//! that end up in a transaction body.

use crate::coin::{Coin, Coins};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Instantiation parameters for a freshly stored vesting contract.
///
/// Times are unix seconds and amounts are integers, both rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateMsg {
	pub owner: String,
	pub recipient: String,
	pub cliff_amount: String,
	pub vesting_amount: String,
	pub start_time: String,
	pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
	WithdrawVestedFunds {
		denom: String,
	},
	WithdrawCliffVestedFunds {
		denom: String,
	},
	WithdrawDelegatorReward {
		validator: String,
	},
	DelegateFunds {
		validator: String,
		amount: Coin,
	},
	UndelegateFunds {
		validator: String,
		amount: Coin,
	},
	RedelegateFunds {
		src_validator: String,
		dst_validator: String,
		amount: Coin,
	},
	AddToWhitelist {
		addresses: Vec<String>,
	},
	RemoveFromWhitelist {
		addresses: Vec<String>,
	},
	UpdateOwner {
		owner: String,
	},
	UpdateRecipient {
		recipient: String,
	},
}

impl ExecuteMsg {
	/// Short operation name used in logs and step labels.
	pub fn action(&self) -> &'static str {
		match self {
			ExecuteMsg::WithdrawVestedFunds { .. } => "withdraw_vested_funds",
			ExecuteMsg::WithdrawCliffVestedFunds { .. } => "withdraw_cliff_vested_funds",
			ExecuteMsg::WithdrawDelegatorReward { .. } => "withdraw_delegator_reward",
			ExecuteMsg::DelegateFunds { .. } => "delegate_funds",
			ExecuteMsg::UndelegateFunds { .. } => "undelegate_funds",
			ExecuteMsg::RedelegateFunds { .. } => "redelegate_funds",
			ExecuteMsg::AddToWhitelist { .. } => "add_to_whitelist",
			ExecuteMsg::RemoveFromWhitelist { .. } => "remove_from_whitelist",
			ExecuteMsg::UpdateOwner { .. } => "update_owner",
			ExecuteMsg::UpdateRecipient { .. } => "update_recipient",
		}
	}
}

/// Contract queries. The contract takes them as bare strings such as
/// `"query_config"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
	QueryConfig,
	QueryState,
}

impl QueryMsg {
	pub fn name(&self) -> &'static str {
		match self {
			QueryMsg::QueryConfig => "query_config",
			QueryMsg::QueryState => "query_state",
		}
	}
}

/// Wasm module messages carried in a transaction body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ChainMsg {
	#[serde(rename = "/cosmwasm.wasm.v1.MsgStoreCode")]
	StoreCode {
		sender: String,
		/// Base64 encoded wasm bytecode.
		wasm_byte_code: String,
	},
	#[serde(rename = "/cosmwasm.wasm.v1.MsgInstantiateContract")]
	InstantiateContract {
		sender: String,
		admin: String,
		#[serde(with = "crate::serde_helpers::u64_string")]
		code_id: u64,
		label: String,
		msg: serde_json::Value,
		funds: Coins,
	},
	#[serde(rename = "/cosmwasm.wasm.v1.MsgExecuteContract")]
	ExecuteContract {
		sender: String,
		contract: String,
		msg: serde_json::Value,
		funds: Coins,
	},
}

impl ChainMsg {
	pub fn store_code(sender: impl Into<String>, wasm: &[u8]) -> Self {
		ChainMsg::StoreCode {
			sender: sender.into(),
			wasm_byte_code: STANDARD.encode(wasm),
		}
	}

	/// Instantiates `code_id` with the deployer as contract admin.
	pub fn instantiate(
		sender: impl Into<String>,
		code_id: u64,
		label: impl Into<String>,
		msg: &InstantiateMsg,
		funds: Coins,
	) -> Result<Self, serde_json::Error> {
		let sender = sender.into();
		Ok(ChainMsg::InstantiateContract {
			admin: sender.clone(),
			sender,
			code_id,
			label: label.into(),
			msg: serde_json::to_value(msg)?,
			funds,
		})
	}

	pub fn execute(
		sender: impl Into<String>,
		contract: impl Into<String>,
		msg: &ExecuteMsg,
		funds: Coins,
	) -> Result<Self, serde_json::Error> {
		Ok(ChainMsg::ExecuteContract {
			sender: sender.into(),
			contract: contract.into(),
			msg: serde_json::to_value(msg)?,
			funds,
		})
	}

	pub fn sender(&self) -> &str {
		match self {
			ChainMsg::StoreCode { sender, .. }
			| ChainMsg::InstantiateContract { sender, .. }
			| ChainMsg::ExecuteContract { sender, .. } => sender,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_execute_msg_matches_contract_schema() {
		let msg = ExecuteMsg::RedelegateFunds {
			src_validator: "terravaloper1src".to_string(),
			dst_validator: "terravaloper1dst".to_string(),
			amount: Coin::new(100_000, "uluna"),
		};

		assert_eq!(
			serde_json::to_value(&msg).unwrap(),
			json!({
				"redelegate_funds": {
					"src_validator": "terravaloper1src",
					"dst_validator": "terravaloper1dst",
					"amount": { "denom": "uluna", "amount": "100000" }
				}
			})
		);
		assert_eq!(msg.action(), "redelegate_funds");
	}

	#[test]
	fn test_query_msg_serialization() {
		assert_eq!(
			serde_json::to_value(QueryMsg::QueryConfig).unwrap(),
			json!("query_config")
		);
		assert_eq!(
			serde_json::to_value(QueryMsg::QueryState).unwrap(),
			json!("query_state")
		);
		assert_eq!(
			serde_json::from_value::<QueryMsg>(json!("query_state")).unwrap(),
			QueryMsg::QueryState
		);
	}

	#[test]
	fn test_execute_contract_message() {
		let msg = ChainMsg::execute(
			"terra1owner",
			"terra1contract",
			&ExecuteMsg::AddToWhitelist {
				addresses: vec!["terra1friend".to_string()],
			},
			Coins::default(),
		)
		.unwrap();

		let value = serde_json::to_value(&msg).unwrap();
		assert_eq!(value["@type"], "/cosmwasm.wasm.v1.MsgExecuteContract");
		assert_eq!(value["contract"], "terra1contract");
		assert_eq!(value["msg"]["add_to_whitelist"]["addresses"][0], "terra1friend");
		assert_eq!(value["funds"], json!([]));
		assert_eq!(msg.sender(), "terra1owner");
	}

	#[test]
	fn test_store_and_instantiate_messages() {
		let store = ChainMsg::store_code("terra1deployer", b"\0asm");
		let value = serde_json::to_value(&store).unwrap();
		assert_eq!(value["@type"], "/cosmwasm.wasm.v1.MsgStoreCode");
		assert_eq!(value["wasm_byte_code"], "AGFzbQ==");

		let init = InstantiateMsg {
			owner: "terra1owner".to_string(),
			recipient: "terra1recipient".to_string(),
			cliff_amount: "1".to_string(),
			vesting_amount: "1000".to_string(),
			start_time: "1700000000".to_string(),
			end_time: "1700086400".to_string(),
		};
		let msg = ChainMsg::instantiate(
			"terra1deployer",
			42,
			"vesting",
			&init,
			"10000000uluna".parse().unwrap(),
		)
		.unwrap();
		let value = serde_json::to_value(&msg).unwrap();
		assert_eq!(value["code_id"], "42");
		assert_eq!(value["admin"], "terra1deployer");
		assert_eq!(value["msg"]["vesting_amount"], "1000");
		assert_eq!(value["funds"][0]["amount"], "10000000");

		let back: ChainMsg = serde_json::from_value(value).unwrap();
		assert_eq!(back, msg);
	}
}
