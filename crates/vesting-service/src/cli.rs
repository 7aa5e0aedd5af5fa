//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vesting_core::Role;
use vesting_types::Coin;

#[derive(Parser, Debug)]
#[command(name = "vesting-ops")]
#[command(about = "Deploy and operate the community pool vesting contract", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "VESTING_CONFIG", default_value = "config/pisco.toml")]
	pub config: PathBuf,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// Emit logs as JSON lines
	#[arg(long)]
	pub json_logs: bool,

	/// Account that signs single actions (deployer, owner, recipient)
	#[arg(long = "as", global = true, value_name = "ROLE")]
	pub signer: Option<Role>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Store the contract code, instantiate it and record both artifacts
	Deploy,

	/// Delegate, redelegate, undelegate and withdraw rewards
	DelegateFlow,

	/// Whitelist the recipient and withdraw cliff and vested funds
	WithdrawFlow,

	/// Delegate contract funds to a validator
	Delegate {
		#[arg(long)]
		validator: Option<String>,
		#[arg(long)]
		amount: Option<Coin>,
	},

	/// Move a delegation to another validator
	Redelegate {
		#[arg(long)]
		src_validator: Option<String>,
		#[arg(long)]
		dst_validator: Option<String>,
		#[arg(long)]
		amount: Option<Coin>,
	},

	/// Undelegate contract funds
	Undelegate {
		#[arg(long)]
		validator: Option<String>,
		#[arg(long)]
		amount: Option<Coin>,
	},

	/// Withdraw staking rewards from a validator
	WithdrawRewards {
		#[arg(long)]
		validator: Option<String>,
	},

	/// Withdraw funds vested so far
	WithdrawVested {
		#[arg(long)]
		denom: Option<String>,
	},

	/// Withdraw the cliff amount
	WithdrawCliffVested {
		#[arg(long)]
		denom: Option<String>,
	},

	/// Manage the withdrawal whitelist
	Whitelist {
		#[command(subcommand)]
		action: WhitelistAction,
	},

	/// Transfer contract ownership
	UpdateOwner { owner: String },

	/// Change the vesting recipient
	UpdateRecipient { recipient: String },

	/// Query the deployed contract
	Query {
		#[command(subcommand)]
		target: QueryTarget,
	},

	/// Show the on-chain status of a transaction
	Status { hash: String },

	/// Validate the configuration file
	Validate,
}

#[derive(Subcommand, Debug)]
pub enum WhitelistAction {
	Add {
		#[arg(required = true)]
		addresses: Vec<String>,
	},
	Remove {
		#[arg(required = true)]
		addresses: Vec<String>,
	},
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum QueryTarget {
	Config,
	State,
}
