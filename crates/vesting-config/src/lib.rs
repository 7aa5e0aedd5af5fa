// vesting-config/src/lib.rs

use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use vesting_types::{Coin, Coins};

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "VESTING_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Reads, substitutes, parses, overrides and validates the configuration.
	pub fn load(&self) -> Result<Config, ConfigError> {
		let path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;
		info!("Loading configuration from {:?}", path);

		if !path.exists() {
			return Err(ConfigError::FileNotFound(path.display().to_string()));
		}
		let content = std::fs::read_to_string(path)?;
		let substituted = substitute_env_vars(&content)?;

		let mut config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&substituted)?,
			Some("json") => Self::from_json(&substituted)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&substituted)?,
			_ => {
				return Err(ConfigError::ParseError(format!(
					"Unsupported config format: {:?}",
					path
				)))
			}
		};

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
		toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<Config, ConfigError> {
		serde_json::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<Config, ConfigError> {
		serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn env_var(&self, name: &str) -> Option<String> {
		env::var(format!("{}{}", self.env_prefix, name)).ok()
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Some(endpoint) = self.env_var("ENDPOINT") {
			debug!("Overriding endpoint from environment");
			config.network.endpoint = endpoint;
		}

		if let Some(chain_id) = self.env_var("CHAIN_ID") {
			debug!("Overriding chain id from environment");
			config.network.chain_id = chain_id;
		}

		if let Some(log_level) = self.env_var("LOG_LEVEL") {
			config.log_level = log_level;
		}

		if let Some(interval) = self.env_var("POLL_INTERVAL_MS") {
			config.delivery.poll_interval_ms = interval.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid poll interval: {}", e))
			})?;
		}

		if let Some(timeout) = self.env_var("POLL_TIMEOUT_MS") {
			config.delivery.poll_timeout_ms = timeout.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid poll timeout: {}", e))
			})?;
		}

		Ok(())
	}
}

/// Replaces `${VAR_NAME}` placeholders with environment values.
pub fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = content.to_string();

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	let fail = |msg: String| Err(ConfigError::ValidationError(msg));
	let network = &config.network;

	if !(network.endpoint.starts_with("http://") || network.endpoint.starts_with("https://")) {
		return fail(format!(
			"Endpoint must start with http:// or https://, got '{}'",
			network.endpoint
		));
	}

	if network.chain_id.trim().is_empty() {
		return fail("Chain id must not be empty".to_string());
	}

	if network.gas_adjustment < 1.0 {
		return fail(format!(
			"Gas adjustment must be at least 1.0, got {}",
			network.gas_adjustment
		));
	}

	match network.fee_gas_price() {
		Some(price) if price > 0.0 => {}
		Some(price) => {
			return fail(format!(
				"Gas price for fee denom '{}' must be positive, got {}",
				network.fee_denom, price
			))
		}
		None => {
			return fail(format!(
				"Fee denom '{}' has no gas price configured",
				network.fee_denom
			))
		}
	}

	let delivery = &config.delivery;
	if delivery.poll_interval_ms == 0 {
		return fail("Poll interval must be greater than zero".to_string());
	}
	if delivery.poll_timeout_ms < delivery.poll_interval_ms {
		return fail(format!(
			"Poll timeout ({}ms) must not be shorter than the poll interval ({}ms)",
			delivery.poll_timeout_ms, delivery.poll_interval_ms
		));
	}

	if config.signer.program.trim().is_empty() {
		return fail("Signer program must not be empty".to_string());
	}

	for (role, account) in config.accounts.iter() {
		if !account.address.starts_with(&format!("{}1", network.prefix)) {
			return fail(format!(
				"Address of account '{}' must start with '{}1', got '{}'",
				role, network.prefix, account.address
			));
		}
	}

	let flows = &config.flows;
	for (name, amount) in [
		("delegate_amount", &flows.delegate_amount),
		("redelegate_amount", &flows.redelegate_amount),
		("undelegate_amount", &flows.undelegate_amount),
	] {
		amount
			.parse::<Coin>()
			.map_err(|e| ConfigError::ValidationError(format!("Invalid {}: {}", name, e)))?;
	}

	config
		.deploy
		.initial_funds
		.parse::<Coins>()
		.map_err(|e| ConfigError::ValidationError(format!("Invalid initial_funds: {}", e)))?;

	Ok(())
}
