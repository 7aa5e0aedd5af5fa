//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/pisco.toml

use std::env;
use std::process;

use vesting_config::ConfigLoader;

fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::new().with_file(config_path).load() {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Endpoint: {}", config.network.endpoint);
			println!("Chain id: {}", config.network.chain_id);
			println!(
				"Polling: every {}ms for up to {}ms",
				config.delivery.poll_interval_ms, config.delivery.poll_timeout_ms
			);
			println!("Artifacts: {}", config.storage.artifact_dir.display());
			for (role, account) in config.accounts.iter() {
				println!("Account {}: {}", role, account.address);
			}
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{}", e);
			process::exit(1);
		}
	}
}
