use thiserror::Error;
use vesting_account::AccountError;
use vesting_delivery::DeliveryError;
use vesting_storage::StorageError;
use vesting_types::{FailureReason, TransactionOutcome, TxHash};

/// Why a flow stopped. Every variant names the step it stopped at.
#[derive(Debug, Error)]
pub enum FlowError {
	#[error("{step}: broadcast rejected: {reason}")]
	BroadcastRejected {
		step: String,
		hash: Option<TxHash>,
		reason: FailureReason,
	},

	#[error("{step}: {reason} (tx {})", display_hash(.hash))]
	ExecutionFailed {
		step: String,
		hash: Option<TxHash>,
		reason: FailureReason,
	},

	#[error("{step}: no final status for tx {hash} after {attempts} polls")]
	ConfirmationTimedOut {
		step: String,
		hash: TxHash,
		attempts: u32,
	},

	#[error("{step}: simulation failed: {message}")]
	SimulationFailed { step: String, message: String },

	#[error("{step}: confirmed transaction has no {event}.{attribute} event attribute")]
	MissingEvent {
		step: String,
		event: String,
		attribute: String,
	},

	#[error("{step}: cancelled")]
	Cancelled { step: String },

	#[error("{step}: {source}")]
	Signing {
		step: String,
		#[source]
		source: AccountError,
	},

	#[error("{step}: {source}")]
	Delivery {
		step: String,
		#[source]
		source: DeliveryError,
	},

	#[error("{step}: {source}")]
	Storage {
		step: String,
		#[source]
		source: StorageError,
	},

	#[error("{step}: invalid input: {message}")]
	InvalidInput { step: String, message: String },
}

fn display_hash(hash: &Option<TxHash>) -> String {
	hash.as_ref()
		.map(|h| h.to_string())
		.unwrap_or_else(|| "unknown".to_string())
}

impl FlowError {
	pub fn step(&self) -> &str {
		match self {
			FlowError::BroadcastRejected { step, .. }
			| FlowError::ExecutionFailed { step, .. }
			| FlowError::ConfirmationTimedOut { step, .. }
			| FlowError::SimulationFailed { step, .. }
			| FlowError::MissingEvent { step, .. }
			| FlowError::Cancelled { step }
			| FlowError::Signing { step, .. }
			| FlowError::Delivery { step, .. }
			| FlowError::Storage { step, .. }
			| FlowError::InvalidInput { step, .. } => step,
		}
	}

	/// Transaction the flow stopped on, when one was submitted.
	pub fn tx_hash(&self) -> Option<&TxHash> {
		match self {
			FlowError::BroadcastRejected { hash, .. } | FlowError::ExecutionFailed { hash, .. } => {
				hash.as_ref()
			}
			FlowError::ConfirmationTimedOut { hash, .. } => Some(hash),
			_ => None,
		}
	}

	pub(crate) fn invalid_input(step: &str, message: impl Into<String>) -> Self {
		FlowError::InvalidInput {
			step: step.to_string(),
			message: message.into(),
		}
	}

	pub(crate) fn storage(step: &str, source: StorageError) -> Self {
		FlowError::Storage {
			step: step.to_string(),
			source,
		}
	}

	/// Maps a non-confirmed outcome to the error that halts the flow.
	pub(crate) fn from_outcome(step: &str, outcome: TransactionOutcome) -> Self {
		let step = step.to_string();
		match outcome {
			TransactionOutcome::Failed { hash, reason } => match reason {
				FailureReason::Rejected { .. } => FlowError::BroadcastRejected { step, hash, reason },
				FailureReason::Execution { .. } => FlowError::ExecutionFailed { step, hash, reason },
			},
			TransactionOutcome::TimedOut { hash, attempts } => FlowError::ConfirmationTimedOut {
				step,
				hash,
				attempts,
			},
			TransactionOutcome::Confirmed { hash, .. } => FlowError::InvalidInput {
				step,
				message: format!("tx {} confirmed but treated as a failure", hash),
			},
		}
	}
}
