//! Operations on the community pool vesting contract.
//!
//! `VestingOps` owns the services a flow needs (signing accounts, delivery and
//! artifact storage) and exposes the deploy, delegate and withdraw flows as
//! well as single contract actions and queries.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use vesting_account::{create_account, AccountService};
use vesting_config::Config;
use vesting_delivery::{create_node, DeliveryService};
use vesting_storage::{implementations::file::create_storage, StorageService};
use vesting_types::ExecuteMsg;

pub mod error;
pub mod flows;
pub mod runner;
pub mod tx;

pub use error::FlowError;
pub use runner::{FlowReport, StepReport, StepRunner};
pub use tx::{ConfirmedTx, TxSubmitter};

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("Account error: {0}")]
	Account(String),
	#[error("Delivery error: {0}")]
	Delivery(String),
}

/// Signing roles used by the flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Deployer,
	Owner,
	Recipient,
}

impl Role {
	/// Account that is allowed to send `msg` by default.
	///
	/// Withdrawals are open to whitelisted accounts, the rest to the owner only.
	pub fn for_action(msg: &ExecuteMsg) -> Self {
		match msg {
			ExecuteMsg::WithdrawVestedFunds { .. } | ExecuteMsg::WithdrawCliffVestedFunds { .. } => {
				Role::Recipient
			}
			_ => Role::Owner,
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Role::Deployer => "deployer",
			Role::Owner => "owner",
			Role::Recipient => "recipient",
		})
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"deployer" => Ok(Role::Deployer),
			"owner" => Ok(Role::Owner),
			"recipient" => Ok(Role::Recipient),
			other => Err(format!("unknown role '{}'", other)),
		}
	}
}

/// Signing accounts by role.
pub struct Accounts {
	pub deployer: Arc<AccountService>,
	pub owner: Arc<AccountService>,
	pub recipient: Arc<AccountService>,
}

impl Accounts {
	pub fn from_config(config: &Config) -> Result<Self, CoreError> {
		let build = |role: Role| {
			let account = match role {
				Role::Deployer => &config.accounts.deployer,
				Role::Owner => &config.accounts.owner,
				Role::Recipient => &config.accounts.recipient,
			};
			create_account(&config.signer, account)
				.map(|provider| Arc::new(AccountService::new(provider)))
				.map_err(|e| CoreError::Account(format!("{}: {}", role, e)))
		};

		Ok(Self {
			deployer: build(Role::Deployer)?,
			owner: build(Role::Owner)?,
			recipient: build(Role::Recipient)?,
		})
	}

	pub fn get(&self, role: Role) -> &AccountService {
		match role {
			Role::Deployer => self.deployer.as_ref(),
			Role::Owner => self.owner.as_ref(),
			Role::Recipient => self.recipient.as_ref(),
		}
	}
}

pub struct VestingOps {
	config: Config,
	accounts: Accounts,
	submitter: TxSubmitter,
	storage: Arc<StorageService>,
	cancel: CancellationToken,
}

impl VestingOps {
	pub fn new(
		config: Config,
		accounts: Accounts,
		delivery: Arc<DeliveryService>,
		storage: Arc<StorageService>,
		cancel: CancellationToken,
	) -> Self {
		let submitter = TxSubmitter::new(delivery, config.network.clone());
		Self {
			config,
			accounts,
			submitter,
			storage,
			cancel,
		}
	}

	/// Wires the LCD node, file storage and command signers from `config`.
	pub fn from_config(config: Config, cancel: CancellationToken) -> Result<Self, CoreError> {
		let node =
			create_node(&config.network).map_err(|e| CoreError::Delivery(e.to_string()))?;
		let delivery = Arc::new(DeliveryService::new(node, &config.delivery));
		let storage = Arc::new(StorageService::new(create_storage(
			config.storage.artifact_dir.clone(),
		)));
		let accounts = Accounts::from_config(&config)?;

		Ok(Self::new(config, accounts, delivery, storage, cancel))
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn accounts(&self) -> &Accounts {
		&self.accounts
	}

	pub fn delivery(&self) -> &Arc<DeliveryService> {
		self.submitter.delivery()
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub(crate) fn runner(&self, flow: &str) -> StepRunner {
		StepRunner::new(flow, self.cancel.clone())
	}
}
