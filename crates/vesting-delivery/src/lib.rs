//! Transaction delivery for the vesting operations tooling.
//!
//! `DeliveryService::submit_and_confirm` broadcasts a signed transaction and
//! polls the node until the transaction is included, fails or the polling
//! budget runs out. Callers receive a `TransactionOutcome` instead of assuming
//! success after a fixed delay.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use vesting_config::DeliveryConfig;
use vesting_types::{
	AccountInfo, FailureReason, PendingTransaction, SignedTransaction, TransactionOutcome, TxHash,
	TxStatus, CODE_TX_IN_MEMPOOL, CODE_WRONG_SEQUENCE,
};

pub mod implementations {
	pub mod lcd;
	#[cfg(any(test, feature = "testing"))]
	pub mod scripted;
}
pub mod retry;

pub use implementations::lcd::{create_node, LcdNode};
pub use retry::RetryPolicy;

/// Errors reported by a node client.
#[derive(Debug, Error)]
pub enum NodeError {
	/// Connection failures, timeouts and overloaded nodes.
	#[error("Transient network error: {0}")]
	Transient(String),
	#[error("Node returned HTTP {status}: {body}")]
	Status { status: u16, body: String },
	#[error("Failed to decode node response: {0}")]
	Decode(String),
	#[error("Not found: {0}")]
	NotFound(String),
}

impl NodeError {
	pub fn is_transient(&self) -> bool {
		matches!(self, NodeError::Transient(_))
	}
}

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Network error: {0}")]
	Network(#[from] NodeError),
	#[error("Chain mismatch: node serves {node}, transaction targets {requested}")]
	ChainMismatch { node: String, requested: String },
	#[error("Invalid configuration: {0}")]
	Config(String),
}

/// Node reply to a synchronous broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
	pub hash: TxHash,
	pub code: u32,
	pub codespace: String,
	pub raw_log: String,
}

/// Query and broadcast operations of a chain node.
#[async_trait]
pub trait NodeInterface: Send + Sync {
	/// Chain this node serves.
	fn chain_id(&self) -> &str;

	/// Submits signed bytes and returns the mempool admission result.
	async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastResponse, NodeError>;

	/// Returns `None` while the transaction is not indexed yet.
	async fn get_transaction(&self, hash: &TxHash) -> Result<Option<TxStatus>, NodeError>;

	/// Height of the newest committed block.
	async fn latest_height(&self) -> Result<u64, NodeError>;

	async fn account(&self, address: &str) -> Result<AccountInfo, NodeError>;

	/// Dry-runs a signed transaction and returns the gas it used.
	async fn simulate(&self, tx: &SignedTransaction) -> Result<u64, NodeError>;

	/// Runs a smart query against a contract.
	async fn query_contract(
		&self,
		contract: &str,
		query: &serde_json::Value,
	) -> Result<serde_json::Value, NodeError>;
}

/// Confirmation polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
	pub interval: Duration,
	pub timeout: Duration,
}

impl PollConfig {
	pub fn new(interval: Duration, timeout: Duration) -> Self {
		Self { interval, timeout }
	}

	pub fn from_config(config: &DeliveryConfig) -> Self {
		Self::new(config.poll_interval(), config.poll_timeout())
	}

	/// Number of status queries that fit in the timeout, rounded up.
	pub fn max_attempts(&self) -> u32 {
		let interval = self.interval.as_millis().max(1);
		let attempts = self.timeout.as_millis().div_ceil(interval);
		attempts.clamp(1, u32::MAX as u128) as u32
	}

	/// Wall-clock limit of a whole wait. The last poll starts before
	/// `timeout + interval` and must finish by then.
	pub fn budget(&self) -> Duration {
		self.timeout.saturating_add(self.interval)
	}
}

/// Result of handing a transaction to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastResult {
	Pending(PendingTransaction),
	Rejected {
		hash: Option<TxHash>,
		reason: FailureReason,
	},
}

/// Broadcasts transactions and tracks them to a terminal outcome.
pub struct DeliveryService {
	node: Arc<dyn NodeInterface>,
	poll: PollConfig,
	retry: RetryPolicy,
}

impl DeliveryService {
	pub fn new(node: Arc<dyn NodeInterface>, config: &DeliveryConfig) -> Self {
		Self {
			node,
			poll: PollConfig::from_config(config),
			retry: RetryPolicy::from_config(config),
		}
	}

	pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
		self.poll = poll;
		self
	}

	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	pub fn node(&self) -> &Arc<dyn NodeInterface> {
		&self.node
	}

	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	pub fn poll_config(&self) -> PollConfig {
		self.poll
	}

	/// Broadcasts `tx` and waits for its outcome using the service's polling
	/// configuration.
	pub async fn submit_and_confirm(
		&self,
		tx: &SignedTransaction,
		chain_id: &str,
	) -> Result<TransactionOutcome, DeliveryError> {
		self.submit_and_confirm_with(tx, chain_id, self.poll).await
	}

	/// Broadcasts `tx` and waits for its outcome.
	///
	/// A rejected broadcast returns `Failed` without polling. Only network
	/// failures of the broadcast itself produce an error.
	pub async fn submit_and_confirm_with(
		&self,
		tx: &SignedTransaction,
		chain_id: &str,
		poll: PollConfig,
	) -> Result<TransactionOutcome, DeliveryError> {
		let pending = match self.broadcast(tx, chain_id).await? {
			BroadcastResult::Pending(pending) => pending,
			BroadcastResult::Rejected { hash, reason } => {
				let shown = hash.as_ref().map(|h| h.as_str()).unwrap_or("-");
				error!(tx_hash = %shown, "Broadcast rejected: {}", reason);
				return Ok(TransactionOutcome::Failed { hash, reason });
			}
		};

		Ok(self.wait_for_confirmation(&pending, poll).await)
	}

	/// Hands the transaction to the node.
	pub async fn broadcast(
		&self,
		tx: &SignedTransaction,
		chain_id: &str,
	) -> Result<BroadcastResult, DeliveryError> {
		if self.node.chain_id() != chain_id {
			return Err(DeliveryError::ChainMismatch {
				node: self.node.chain_id().to_string(),
				requested: chain_id.to_string(),
			});
		}

		let local_hash = tx.hash();
		let submitted_height = match self
			.retry
			.run("latest_height", || self.node.latest_height())
			.await
		{
			Ok(height) => Some(height),
			Err(e) => {
				warn!("Could not read the chain height before broadcast: {}", e);
				None
			}
		};
		info!(
			tx_hash = %local_hash,
			chain_id,
			height = submitted_height,
			"Broadcasting transaction"
		);

		let mut sends = 0u32;
		let response = self
			.retry
			.run("broadcast", || {
				sends += 1;
				self.node.broadcast(tx)
			})
			.await
			.inspect_err(|e| {
				error!(tx_hash = %local_hash, "Broadcast did not reach the node: {}", e);
			})?;

		let hash = if response.hash.as_str().is_empty() {
			local_hash.clone()
		} else {
			if response.hash != local_hash {
				warn!(
					local = %local_hash,
					node = %response.hash,
					"Node reported a different transaction hash"
				);
			}
			response.hash.clone()
		};

		// A retried broadcast may find its own first attempt in the mempool,
		// or already committed, in which case the sequence no longer matches.
		let accepted = match response.code {
			0 | CODE_TX_IN_MEMPOOL => true,
			CODE_WRONG_SEQUENCE if sends > 1 => self.committed_earlier(&local_hash).await,
			_ => false,
		};
		if !accepted {
			return Ok(BroadcastResult::Rejected {
				hash: Some(hash),
				reason: FailureReason::Rejected {
					code: response.code,
					codespace: response.codespace,
					log: response.raw_log,
				},
			});
		}

		info!(tx_hash = %hash, "Transaction accepted into mempool");
		Ok(BroadcastResult::Pending(
			PendingTransaction::new(hash).with_height(submitted_height),
		))
	}

	/// Whether an earlier send of a retried broadcast already made it on chain.
	async fn committed_earlier(&self, hash: &TxHash) -> bool {
		match self
			.retry
			.run("get_transaction", || self.node.get_transaction(hash))
			.await
		{
			Ok(Some(_)) => {
				info!(tx_hash = %hash, "Retried broadcast was already committed");
				true
			}
			Ok(None) => false,
			Err(e) => {
				warn!(tx_hash = %hash, "Could not check for an earlier commit: {}", e);
				false
			}
		}
	}

	/// Polls until the transaction reaches a terminal state.
	///
	/// Attempt `n` starts `n` intervals after the call and owns the slot up to
	/// the next one. Transient retries stop at the end of the slot, and an
	/// attempt that gets no answer counts toward the budget like one that
	/// found nothing. Nothing runs past `PollConfig::budget`.
	pub async fn wait_for_confirmation(
		&self,
		pending: &PendingTransaction,
		poll: PollConfig,
	) -> TransactionOutcome {
		let hash = &pending.hash;
		let max_attempts = poll.max_attempts();
		let started = Instant::now();
		let deadline = started + poll.budget();
		info!(
			tx_hash = %hash.short(),
			"Waiting for inclusion (up to {} polls every {:?})",
			max_attempts,
			poll.interval
		);

		let mut slot = started;
		for attempt in 1..=max_attempts {
			slot += poll.interval;
			tokio::time::sleep_until(slot).await;
			let slot_end = (slot + poll.interval).min(deadline);

			let lookup = self
				.retry
				.run("get_transaction", || self.node.get_transaction(hash));
			match tokio::time::timeout_at(slot_end, lookup).await {
				Ok(Ok(Some(status))) => {
					let outcome = status.into_outcome();
					match &outcome {
						TransactionOutcome::Confirmed { height, .. } => {
							self.log_confirmed(pending, *height, attempt, started)
						}
						TransactionOutcome::Failed { reason, .. } => {
							error!(tx_hash = %hash, attempt, "Transaction failed: {}", reason)
						}
						TransactionOutcome::TimedOut { .. } => {}
					}
					return outcome;
				}
				Ok(Ok(None)) => {
					debug!(tx_hash = %hash.short(), attempt, "Transaction not yet included");
				}
				Ok(Err(e)) => {
					warn!(
						tx_hash = %hash.short(),
						attempt,
						"Status query failed, counting toward timeout: {}",
						e
					);
				}
				Err(_) => {
					warn!(
						tx_hash = %hash.short(),
						attempt,
						"Status query got no answer within {:?}, counting toward timeout",
						poll.interval
					);
				}
			}
		}

		error!(
			tx_hash = %hash,
			attempts = max_attempts,
			"No final status after {:?}",
			started.elapsed()
		);
		TransactionOutcome::TimedOut {
			hash: hash.clone(),
			attempts: max_attempts,
		}
	}

	fn log_confirmed(
		&self,
		pending: &PendingTransaction,
		height: u64,
		attempt: u32,
		started: Instant,
	) {
		let hash = &pending.hash;
		match pending.submitted_height {
			Some(submitted) if height < submitted => warn!(
				tx_hash = %hash,
				height,
				submitted,
				"Transaction confirmed below the height seen at submission"
			),
			Some(submitted) => info!(
				tx_hash = %hash,
				height,
				blocks = height - submitted,
				attempt,
				"Transaction confirmed in {}ms",
				started.elapsed().as_millis()
			),
			None => info!(
				tx_hash = %hash,
				height,
				attempt,
				"Transaction confirmed in {}ms",
				started.elapsed().as_millis()
			),
		}
	}

	/// One-off status lookup, retried on transient errors.
	pub async fn status(&self, hash: &TxHash) -> Result<Option<TxStatus>, DeliveryError> {
		Ok(self
			.retry
			.run("get_transaction", || self.node.get_transaction(hash))
			.await?)
	}
}
