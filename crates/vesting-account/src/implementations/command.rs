//! External-program signer.
//!
//! Key material never enters this process. The unsigned transaction is written
//! to a temporary JSON file and the configured program (a wallet CLI or a small
//! wrapper script) signs and encodes it, printing the base64 transaction bytes
//! on stdout. The program inherits our environment, which is how the signing
//! credential reaches it.

use crate::{AccountError, AccountInterface};
use async_trait::async_trait;
use std::io::Write;
use tokio::process::Command;
use tracing::debug;
use vesting_config::{AccountConfig, SignerConfig};
use vesting_types::{SignedTransaction, SignerData, UnsignedTransaction};

pub struct CommandSigner {
	program: String,
	args: Vec<String>,
	key: String,
	address: String,
}

impl CommandSigner {
	pub fn new(
		program: impl Into<String>,
		args: Vec<String>,
		key: impl Into<String>,
		address: impl Into<String>,
	) -> Self {
		Self {
			program: program.into(),
			args,
			key: key.into(),
			address: address.into(),
		}
	}

	fn render_args(&self, tx_file: &str, signer_data: &SignerData) -> Vec<String> {
		self.args
			.iter()
			.map(|arg| {
				arg.replace("{tx_file}", tx_file)
					.replace("{chain_id}", &signer_data.chain_id)
					.replace("{account_number}", &signer_data.account_number.to_string())
					.replace("{sequence}", &signer_data.sequence.to_string())
					.replace("{key}", &self.key)
					.replace("{address}", &self.address)
			})
			.collect()
	}
}

#[async_trait]
impl AccountInterface for CommandSigner {
	fn address(&self) -> &str {
		&self.address
	}

	async fn sign_transaction(
		&self,
		tx: &UnsignedTransaction,
		signer_data: &SignerData,
	) -> Result<SignedTransaction, AccountError> {
		let json = serde_json::to_vec(tx)
			.map_err(|e| AccountError::SigningFailed(format!("Failed to encode tx: {}", e)))?;

		let mut tx_file = tempfile::Builder::new()
			.prefix("unsigned-tx-")
			.suffix(".json")
			.tempfile()?;
		tx_file.write_all(&json)?;
		tx_file.flush()?;

		let tx_path = tx_file.path().to_string_lossy().to_string();
		let args = self.render_args(&tx_path, signer_data);
		debug!(
			program = %self.program,
			address = %self.address,
			sequence = signer_data.sequence,
			"Invoking external signer"
		);

		let output = Command::new(&self.program)
			.args(&args)
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|e| {
				AccountError::SigningFailed(format!("Failed to run {}: {}", self.program, e))
			})?;

		if !output.status.success() {
			return Err(AccountError::SigningFailed(format!(
				"{} exited with {}: {}",
				self.program,
				output.status,
				String::from_utf8_lossy(&output.stderr).trim()
			)));
		}

		let stdout = String::from_utf8_lossy(&output.stdout);
		let encoded = stdout.trim();
		if encoded.is_empty() {
			return Err(AccountError::SigningFailed(format!(
				"{} produced no output",
				self.program
			)));
		}

		SignedTransaction::from_base64(encoded).map_err(|e| {
			AccountError::SigningFailed(format!("Signer output is not base64: {}", e))
		})
	}
}

/// Creates the signer for one configured account.
///
/// Fails early when the credential variable the signer relies on is unset.
pub fn create_account(
	signer: &SignerConfig,
	account: &AccountConfig,
) -> Result<Box<dyn AccountInterface>, AccountError> {
	if signer.program.trim().is_empty() {
		return Err(AccountError::InvalidConfig(
			"signer program is empty".to_string(),
		));
	}
	if std::env::var_os(&signer.credential_env).is_none() {
		return Err(AccountError::MissingCredential(
			signer.credential_env.clone(),
		));
	}

	Ok(Box::new(CommandSigner::new(
		signer.program.clone(),
		signer.args.clone(),
		account.key.clone(),
		account.address.clone(),
	)))
}
