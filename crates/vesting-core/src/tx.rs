//! Turns contract messages into confirmed transactions.
//!
//! Every submission queries the signer's account number and sequence, signs
//! once with a provisional fee to simulate, sizes gas and fee from the
//! simulation and signs again before handing the transaction to delivery.

use crate::error::FlowError;
use std::sync::Arc;
use tracing::{debug, info};
use vesting_account::AccountService;
use vesting_config::NetworkConfig;
use vesting_delivery::{DeliveryError, DeliveryService, NodeError};
use vesting_types::{
	ChainMsg, Coin, Coins, Fee, SignedTransaction, SignerData, TransactionOutcome, TxEvent, TxHash,
	UnsignedTransaction,
};

/// Gas limit of the provisional transaction used for simulation.
pub const SIMULATION_GAS_LIMIT: u64 = 2_000_000;

/// `ceil(gas_used × adjustment)`
pub fn gas_limit(gas_used: u64, adjustment: f64) -> u64 {
	(gas_used as f64 * adjustment).ceil() as u64
}

/// `ceil(gas_limit × price)`
pub fn fee_amount(gas_limit: u64, price: f64) -> u128 {
	(gas_limit as f64 * price).ceil() as u128
}

/// A transaction the chain executed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTx {
	pub step: String,
	pub hash: TxHash,
	pub height: u64,
	pub gas_used: u64,
	pub events: Vec<TxEvent>,
}

impl ConfirmedTx {
	/// Looks up a required event attribute.
	pub fn attribute(&self, event: &str, key: &str) -> Result<&str, FlowError> {
		vesting_types::find_attribute(&self.events, event, key).ok_or_else(|| {
			FlowError::MissingEvent {
				step: self.step.clone(),
				event: event.to_string(),
				attribute: key.to_string(),
			}
		})
	}
}

pub struct TxSubmitter {
	delivery: Arc<DeliveryService>,
	network: NetworkConfig,
}

impl TxSubmitter {
	pub fn new(delivery: Arc<DeliveryService>, network: NetworkConfig) -> Self {
		Self { delivery, network }
	}

	pub fn delivery(&self) -> &Arc<DeliveryService> {
		&self.delivery
	}

	fn fee_for(&self, step: &str, gas_limit: u64) -> Result<Fee, FlowError> {
		let price = self.network.fee_gas_price().ok_or_else(|| {
			FlowError::invalid_input(
				step,
				format!("no gas price configured for {}", self.network.fee_denom),
			)
		})?;
		let amount = Coins(vec![Coin::new(
			fee_amount(gas_limit, price),
			self.network.fee_denom.clone(),
		)]);
		Ok(Fee::new(amount, gas_limit))
	}

	async fn signer_data(&self, step: &str, address: &str) -> Result<SignerData, FlowError> {
		let node = self.delivery.node();
		let account = self
			.delivery
			.retry_policy()
			.run("account", || node.account(address))
			.await
			.map_err(|e| FlowError::Delivery {
				step: step.to_string(),
				source: DeliveryError::Network(e),
			})?;
		debug!(
			step,
			address,
			account_number = account.account_number,
			sequence = account.sequence,
			"Fetched signer account"
		);

		Ok(SignerData {
			chain_id: self.network.chain_id.clone(),
			account_number: account.account_number,
			sequence: account.sequence,
		})
	}

	async fn sign(
		&self,
		step: &str,
		account: &AccountService,
		tx: &UnsignedTransaction,
		signer_data: &SignerData,
	) -> Result<SignedTransaction, FlowError> {
		account
			.sign(tx, signer_data)
			.await
			.map_err(|source| FlowError::Signing {
				step: step.to_string(),
				source,
			})
	}

	/// Signs, sizes and submits `messages`, returning once the chain has
	/// executed them successfully.
	pub async fn submit(
		&self,
		step: &str,
		account: &AccountService,
		messages: Vec<ChainMsg>,
		memo: &str,
	) -> Result<ConfirmedTx, FlowError> {
		let signer_data = self.signer_data(step, account.address()).await?;

		let provisional = UnsignedTransaction::new(
			messages,
			memo,
			self.fee_for(step, SIMULATION_GAS_LIMIT)?,
		);
		let draft = self.sign(step, account, &provisional, &signer_data).await?;

		let node = self.delivery.node();
		let gas_used = self
			.delivery
			.retry_policy()
			.run("simulate", || node.simulate(&draft))
			.await
			.map_err(|e| match e {
				NodeError::Transient(_) => FlowError::Delivery {
					step: step.to_string(),
					source: DeliveryError::Network(e),
				},
				other => FlowError::SimulationFailed {
					step: step.to_string(),
					message: other.to_string(),
				},
			})?;

		let limit = gas_limit(gas_used, self.network.gas_adjustment);
		let fee = self.fee_for(step, limit)?;
		info!(step, gas_used, gas_limit = limit, fee = %fee.amount, "Estimated fee");

		let tx = provisional.with_fee(fee);
		let signed = self.sign(step, account, &tx, &signer_data).await?;

		let outcome = self
			.delivery
			.submit_and_confirm(&signed, &self.network.chain_id)
			.await
			.map_err(|source| FlowError::Delivery {
				step: step.to_string(),
				source,
			})?;

		match outcome {
			TransactionOutcome::Confirmed {
				hash,
				height,
				gas_used,
				events,
			} => Ok(ConfirmedTx {
				step: step.to_string(),
				hash,
				height,
				gas_used,
				events,
			}),
			other => Err(FlowError::from_outcome(step, other)),
		}
	}
}
