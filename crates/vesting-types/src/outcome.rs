//! Transaction outcomes and the events they carry.

use crate::transaction::TxHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cosmos SDK error code for an underfunded fee.
pub const CODE_INSUFFICIENT_FEE: u32 = 13;
/// Cosmos SDK error code for an account sequence mismatch.
pub const CODE_WRONG_SEQUENCE: u32 = 32;
/// Cosmos SDK error code for a transaction already in the mempool cache.
pub const CODE_TX_IN_MEMPOOL: u32 = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
	pub key: String,
	#[serde(default)]
	pub value: String,
}

/// An ABCI event emitted while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
	pub fn new(kind: impl Into<String>, attributes: &[(&str, &str)]) -> Self {
		Self {
			kind: kind.into(),
			attributes: attributes
				.iter()
				.map(|(k, v)| EventAttribute {
					key: k.to_string(),
					value: v.to_string(),
				})
				.collect(),
		}
	}

	pub fn attribute(&self, key: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|a| a.key == key)
			.map(|a| a.value.as_str())
	}
}

/// Looks up the first `key` attribute on an event of type `kind`.
pub fn find_attribute<'a>(events: &'a [TxEvent], kind: &str, key: &str) -> Option<&'a str> {
	events
		.iter()
		.filter(|e| e.kind == kind)
		.find_map(|e| e.attribute(key))
}

/// Why a transaction did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
	/// The node refused the broadcast (CheckTx).
	Rejected {
		code: u32,
		codespace: String,
		log: String,
	},
	/// The transaction was included but execution returned an error.
	Execution {
		code: u32,
		codespace: String,
		log: String,
	},
}

impl FailureReason {
	pub fn code(&self) -> u32 {
		match self {
			FailureReason::Rejected { code, .. } | FailureReason::Execution { code, .. } => *code,
		}
	}

	pub fn log(&self) -> &str {
		match self {
			FailureReason::Rejected { log, .. } | FailureReason::Execution { log, .. } => log,
		}
	}
}

impl fmt::Display for FailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FailureReason::Rejected {
				code,
				codespace,
				log,
			} => write!(f, "rejected ({}/{}): {}", codespace, code, log),
			FailureReason::Execution {
				code,
				codespace,
				log,
			} => write!(f, "execution failed ({}/{}): {}", codespace, code, log),
		}
	}
}

/// Final state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
	Confirmed {
		hash: TxHash,
		height: u64,
		gas_used: u64,
		events: Vec<TxEvent>,
	},
	Failed {
		/// Absent when the node rejected the broadcast without a hash.
		hash: Option<TxHash>,
		reason: FailureReason,
	},
	TimedOut {
		hash: TxHash,
		attempts: u32,
	},
}

impl TransactionOutcome {
	pub fn is_confirmed(&self) -> bool {
		matches!(self, TransactionOutcome::Confirmed { .. })
	}

	pub fn hash(&self) -> Option<&TxHash> {
		match self {
			TransactionOutcome::Confirmed { hash, .. } | TransactionOutcome::TimedOut { hash, .. } => {
				Some(hash)
			}
			TransactionOutcome::Failed { hash, .. } => hash.as_ref(),
		}
	}
}

/// Status of a transaction the node has indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatus {
	pub hash: TxHash,
	pub height: u64,
	pub code: u32,
	pub codespace: String,
	pub raw_log: String,
	pub gas_used: u64,
	pub events: Vec<TxEvent>,
}

impl TxStatus {
	pub fn is_success(&self) -> bool {
		self.code == 0
	}

	/// Converts an indexed status into a terminal outcome.
	pub fn into_outcome(self) -> TransactionOutcome {
		if self.is_success() {
			TransactionOutcome::Confirmed {
				hash: self.hash,
				height: self.height,
				gas_used: self.gas_used,
				events: self.events,
			}
		} else {
			TransactionOutcome::Failed {
				hash: Some(self.hash),
				reason: FailureReason::Execution {
					code: self.code,
					codespace: self.codespace,
					log: self.raw_log,
				},
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status(code: u32) -> TxStatus {
		TxStatus {
			hash: TxHash::new("ABCD"),
			height: 120,
			code,
			codespace: if code == 0 { String::new() } else { "wasm".to_string() },
			raw_log: "Unauthorized".to_string(),
			gas_used: 90_000,
			events: vec![TxEvent::new(
				"instantiate",
				&[("_contract_address", "terra1contract"), ("code_id", "7")],
			)],
		}
	}

	#[test]
	fn test_find_attribute() {
		let events = vec![
			TxEvent::new("message", &[("action", "/cosmwasm.wasm.v1.MsgStoreCode")]),
			TxEvent::new("store_code", &[("code_checksum", "aa"), ("code_id", "42")]),
		];
		assert_eq!(find_attribute(&events, "store_code", "code_id"), Some("42"));
		assert_eq!(find_attribute(&events, "instantiate", "code_id"), None);
	}

	#[test]
	fn test_successful_status_confirms() {
		let outcome = status(0).into_outcome();
		match &outcome {
			TransactionOutcome::Confirmed { height, events, .. } => {
				assert_eq!(*height, 120);
				assert_eq!(
					find_attribute(events, "instantiate", "_contract_address"),
					Some("terra1contract")
				);
			}
			other => panic!("unexpected outcome {:?}", other),
		}
		assert!(outcome.is_confirmed());
		assert_eq!(outcome.hash().map(|h| h.as_str()), Some("ABCD"));
	}

	#[test]
	fn test_failed_status_reports_execution_error() {
		let outcome = status(5).into_outcome();
		match outcome {
			TransactionOutcome::Failed { hash, reason } => {
				assert_eq!(hash, Some(TxHash::new("ABCD")));
				assert_eq!(reason.code(), 5);
				assert_eq!(reason.log(), "Unauthorized");
				assert_eq!(
					reason.to_string(),
					"execution failed (wasm/5): Unauthorized"
				);
			}
			other => panic!("unexpected outcome {:?}", other),
		}
	}
}
