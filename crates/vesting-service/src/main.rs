use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vesting_config::{Config, ConfigLoader};
use vesting_core::flows::configured_coin;
use vesting_core::{FlowError, FlowReport, Role, VestingOps};
use vesting_delivery::{create_node, DeliveryService};
use vesting_types::{ExecuteMsg, QueryMsg, TxHash};

mod cli;

use cli::{Args, Command, QueryTarget, WhitelistAction};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let loaded = ConfigLoader::new().with_file(&args.config).load();
	let log_level = args
		.log_level
		.clone()
		.or_else(|| loaded.as_ref().ok().map(|c| c.log_level.clone()))
		.unwrap_or_else(|| "info".to_string());
	setup_tracing(&log_level, args.json_logs)?;

	let config = loaded.context("Failed to load configuration")?;
	info!(
		chain_id = %config.network.chain_id,
		endpoint = %config.network.endpoint,
		"Configuration loaded"
	);

	match &args.command {
		Command::Validate => return validate(&config),
		Command::Status { hash } => return status(&config, hash).await,
		_ => {}
	}

	run_operation(args, config).await
}

fn validate(config: &Config) -> Result<()> {
	info!("Configuration is valid");
	for (role, account) in config.accounts.iter() {
		info!("  {}: {}", role, account.address);
	}
	info!("  Artifacts: {}", config.storage.artifact_dir.display());
	info!(
		"  Polling every {}ms for up to {}ms",
		config.delivery.poll_interval_ms, config.delivery.poll_timeout_ms
	);
	Ok(())
}

async fn status(config: &Config, hash: &str) -> Result<()> {
	let node = create_node(&config.network).context("Failed to create node client")?;
	let delivery = DeliveryService::new(node, &config.delivery);
	let hash = TxHash::new(hash);

	match delivery
		.status(&hash)
		.await
		.context("Failed to query transaction status")?
	{
		Some(status) => {
			let outcome = if status.is_success() {
				"confirmed"
			} else {
				"failed"
			};
			print_json(&serde_json::json!({
				"hash": status.hash.to_string(),
				"outcome": outcome,
				"height": status.height,
				"code": status.code,
				"codespace": status.codespace,
				"gas_used": status.gas_used,
				"raw_log": status.raw_log,
			}))
		}
		None => {
			warn!(tx_hash = %hash, "Transaction not found");
			print_json(&serde_json::json!({ "hash": hash.to_string(), "outcome": "pending" }))
		}
	}
}

async fn run_operation(args: Args, config: Config) -> Result<()> {
	let cancel = CancellationToken::new();
	let shutdown = cancel.clone();
	tokio::spawn(async move {
		shutdown_signal().await;
		warn!("Shutdown signal received, stopping after the current request");
		shutdown.cancel();
	});

	let ops = VestingOps::from_config(config, cancel).context("Failed to initialise services")?;

	let flows = &ops.config().flows;
	let signer = args.signer;
	let single = |msg: ExecuteMsg| {
		let role = signer.unwrap_or_else(|| Role::for_action(&msg));
		(role, msg)
	};

	let result: Result<FlowReport, FlowError> = match args.command {
		Command::Deploy => ops.deploy().await,
		Command::DelegateFlow => ops.delegate_flow().await,
		Command::WithdrawFlow => ops.withdraw_flow().await,
		Command::Query { target } => {
			let query = match target {
				QueryTarget::Config => QueryMsg::QueryConfig,
				QueryTarget::State => QueryMsg::QueryState,
			};
			let response = ops.query(query).await.map_err(report_error)?;
			return print_json(&response);
		}
		command => {
			let (role, msg) = single(action_message(command, flows).map_err(report_error)?);
			ops.execute(role, msg).await
		}
	};

	let report = result.map_err(report_error)?;
	print_json(&report)
}

/// Builds the contract message of a single-action command, filling unset
/// arguments from the flow defaults.
fn action_message(
	command: Command,
	flows: &vesting_config::FlowsConfig,
) -> Result<ExecuteMsg, FlowError> {
	let validator = |v: Option<String>| v.unwrap_or_else(|| flows.validator.clone());
	let denom = |d: Option<String>| d.unwrap_or_else(|| flows.withdraw_denom.clone());

	let msg = match command {
		Command::Delegate { validator: v, amount } => ExecuteMsg::DelegateFunds {
			validator: validator(v),
			amount: match amount {
				Some(amount) => amount,
				None => configured_coin("delegate_funds", &flows.delegate_amount)?,
			},
		},
		Command::Redelegate {
			src_validator,
			dst_validator,
			amount,
		} => ExecuteMsg::RedelegateFunds {
			src_validator: validator(src_validator),
			dst_validator: dst_validator.unwrap_or_else(|| flows.dst_validator.clone()),
			amount: match amount {
				Some(amount) => amount,
				None => configured_coin("redelegate_funds", &flows.redelegate_amount)?,
			},
		},
		Command::Undelegate { validator: v, amount } => ExecuteMsg::UndelegateFunds {
			validator: validator(v),
			amount: match amount {
				Some(amount) => amount,
				None => configured_coin("undelegate_funds", &flows.undelegate_amount)?,
			},
		},
		Command::WithdrawRewards { validator: v } => ExecuteMsg::WithdrawDelegatorReward {
			validator: validator(v),
		},
		Command::WithdrawVested { denom: d } => ExecuteMsg::WithdrawVestedFunds { denom: denom(d) },
		Command::WithdrawCliffVested { denom: d } => {
			ExecuteMsg::WithdrawCliffVestedFunds { denom: denom(d) }
		}
		Command::Whitelist { action } => match action {
			WhitelistAction::Add { addresses } => ExecuteMsg::AddToWhitelist { addresses },
			WhitelistAction::Remove { addresses } => ExecuteMsg::RemoveFromWhitelist { addresses },
		},
		Command::UpdateOwner { owner } => ExecuteMsg::UpdateOwner { owner },
		Command::UpdateRecipient { recipient } => ExecuteMsg::UpdateRecipient { recipient },
		other => {
			return Err(FlowError::InvalidInput {
				step: "cli".to_string(),
				message: format!("{:?} is not a contract action", other),
			})
		}
	};
	Ok(msg)
}

fn report_error(e: FlowError) -> anyhow::Error {
	match e.tx_hash() {
		Some(hash) => error!(step = e.step(), tx_hash = %hash, "Halted: {}", e),
		None => error!(step = e.step(), "Halted: {}", e),
	}
	anyhow::Error::new(e).context("Operation halted")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn setup_tracing(log_level: &str, json: bool) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	let registry = tracing_subscriber::registry().with(env_filter);
	// Logs go to stderr so stdout carries only the command output.
	if json {
		registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.try_init()?;
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.try_init()?;
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vesting_config::FlowsConfig;
	use vesting_types::Coin;

	#[test]
	fn test_action_defaults_from_flows() {
		let flows = FlowsConfig::default();

		let msg = action_message(
			Command::Delegate {
				validator: None,
				amount: None,
			},
			&flows,
		)
		.unwrap();
		assert_eq!(
			msg,
			ExecuteMsg::DelegateFunds {
				validator: flows.validator.clone(),
				amount: Coin::new(500_000, "uluna"),
			}
		);
		assert_eq!(Role::for_action(&msg), Role::Owner);

		let msg = action_message(Command::WithdrawVested { denom: None }, &flows).unwrap();
		assert_eq!(
			msg,
			ExecuteMsg::WithdrawVestedFunds {
				denom: "uluna".to_string()
			}
		);
		assert_eq!(Role::for_action(&msg), Role::Recipient);
	}

	#[test]
	fn test_action_overrides() {
		let flows = FlowsConfig::default();
		let msg = action_message(
			Command::Redelegate {
				src_validator: Some("terravaloper1a".to_string()),
				dst_validator: None,
				amount: Some(Coin::new(7, "uluna")),
			},
			&flows,
		)
		.unwrap();
		assert_eq!(
			msg,
			ExecuteMsg::RedelegateFunds {
				src_validator: "terravaloper1a".to_string(),
				dst_validator: flows.dst_validator.clone(),
				amount: Coin::new(7, "uluna"),
			}
		);

		assert!(action_message(Command::Deploy, &flows).is_err());
	}
}
