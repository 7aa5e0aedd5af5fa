//! Transaction types exchanged between the builder, the signer and the node.

use crate::coin::Coins;
use crate::messages::ChainMsg;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Transaction hash as reported by the node: uppercase hex SHA-256 of the
/// signed transaction bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
	/// Normalises a hash received from the node or the command line.
	pub fn new(hash: impl AsRef<str>) -> Self {
		TxHash(hash.as_ref().trim().trim_start_matches("0x").to_uppercase())
	}

	/// Computes the hash the node will assign to these bytes.
	pub fn of_bytes(bytes: &[u8]) -> Self {
		TxHash(hex::encode_upper(Sha256::digest(bytes)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// First eight characters, for log lines.
	pub fn short(&self) -> String {
		let mut chars = self.0.chars();
		let prefix: String = chars.by_ref().take(8).collect();
		if chars.next().is_some() {
			format!("{}..", prefix)
		} else {
			prefix
		}
	}
}

impl fmt::Display for TxHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Signed, encoded transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	pub bytes: Vec<u8>,
}

impl SignedTransaction {
	pub fn new(bytes: Vec<u8>) -> Self {
		Self { bytes }
	}

	pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
		Ok(Self::new(STANDARD.decode(encoded.trim())?))
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(&self.bytes)
	}

	pub fn hash(&self) -> TxHash {
		TxHash::of_bytes(&self.bytes)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxBody {
	pub messages: Vec<ChainMsg>,
	pub memo: String,
	#[serde(with = "crate::serde_helpers::u64_string")]
	pub timeout_height: u64,
	pub extension_options: Vec<serde_json::Value>,
	pub non_critical_extension_options: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
	pub amount: Coins,
	#[serde(with = "crate::serde_helpers::u64_string")]
	pub gas_limit: u64,
	pub payer: String,
	pub granter: String,
}

impl Fee {
	pub fn new(amount: Coins, gas_limit: u64) -> Self {
		Self {
			amount,
			gas_limit,
			payer: String::new(),
			granter: String::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
	pub signer_infos: Vec<serde_json::Value>,
	pub fee: Fee,
}

/// Unsigned transaction in the node's JSON encoding, the format external
/// signers accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
	pub body: TxBody,
	pub auth_info: AuthInfo,
	pub signatures: Vec<String>,
}

impl UnsignedTransaction {
	pub fn new(messages: Vec<ChainMsg>, memo: impl Into<String>, fee: Fee) -> Self {
		Self {
			body: TxBody {
				messages,
				memo: memo.into(),
				timeout_height: 0,
				extension_options: Vec::new(),
				non_critical_extension_options: Vec::new(),
			},
			auth_info: AuthInfo {
				signer_infos: Vec::new(),
				fee,
			},
			signatures: Vec::new(),
		}
	}

	pub fn with_fee(mut self, fee: Fee) -> Self {
		self.auth_info.fee = fee;
		self
	}
}

/// On-chain account numbers needed to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
	pub address: String,
	pub account_number: u64,
	pub sequence: u64,
}

/// Everything a signer needs besides the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerData {
	pub chain_id: String,
	pub account_number: u64,
	pub sequence: u64,
}

/// A transaction the node accepted into its mempool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
	pub hash: TxHash,
	pub submitted_at: DateTime<Utc>,
	/// Latest block height seen just before the broadcast, when known.
	pub submitted_height: Option<u64>,
}

impl PendingTransaction {
	pub fn new(hash: TxHash) -> Self {
		Self {
			hash,
			submitted_at: Utc::now(),
			submitted_height: None,
		}
	}

	pub fn with_height(mut self, height: Option<u64>) -> Self {
		self.submitted_height = height;
		self
	}
}
