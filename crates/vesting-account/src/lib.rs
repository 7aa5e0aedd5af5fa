use async_trait::async_trait;
use thiserror::Error;
use vesting_types::{SignedTransaction, SignerData, UnsignedTransaction};

pub mod implementations {
	pub mod command;
}

pub use implementations::command::{create_account, CommandSigner};

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid account configuration: {0}")]
	InvalidConfig(String),
	#[error("Missing signing credential: environment variable {0} is not set")]
	MissingCredential(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Signs transactions on behalf of one on-chain account.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Bech32 address of the account.
	fn address(&self) -> &str;

	/// Produces the encoded, signed transaction bytes.
	async fn sign_transaction(
		&self,
		tx: &UnsignedTransaction,
		signer_data: &SignerData,
	) -> Result<SignedTransaction, AccountError>;
}

pub struct AccountService {
	provider: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	pub fn address(&self) -> &str {
		self.provider.address()
	}

	pub async fn sign(
		&self,
		tx: &UnsignedTransaction,
		signer_data: &SignerData,
	) -> Result<SignedTransaction, AccountError> {
		self.provider.sign_transaction(tx, signer_data).await
	}
}
