//! Storage module for deployment artifacts.
//!
//! The deploy flow records two values for later flows: the uploaded code
//! identifier and the instantiated contract address. Each is kept as a single
//! plain UTF-8 value with no delimiters.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Artifact key of the uploaded code identifier.
pub const CODE_ID_KEY: &str = "code_id";
/// Artifact key of the instantiated contract address.
pub const CONTRACT_ADDRESS_KEY: &str = "address";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Artifact not found: {0}")]
	NotFound(String),
	/// Error that occurs when an artifact holds an unusable value.
	#[error("Invalid artifact {key}: {reason}")]
	Invalid { key: String, reason: String },
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Low-level interface for artifact backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Reads the value stored under `key`, trimmed of surrounding whitespace.
	async fn read(&self, key: &str) -> Result<String, StorageError>;

	/// Replaces the value stored under `key`.
	async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Typed access to the deployment artifacts.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	pub async fn code_id(&self) -> Result<u64, StorageError> {
		let raw = self.backend.read(CODE_ID_KEY).await?;
		raw.parse().map_err(|e| StorageError::Invalid {
			key: CODE_ID_KEY.to_string(),
			reason: format!("'{}' is not a code id: {}", raw, e),
		})
	}

	pub async fn store_code_id(&self, code_id: u64) -> Result<(), StorageError> {
		self.backend
			.write(CODE_ID_KEY, &code_id.to_string())
			.await?;
		info!(code_id, "Stored code id");
		Ok(())
	}

	pub async fn contract_address(&self) -> Result<String, StorageError> {
		let address = self.backend.read(CONTRACT_ADDRESS_KEY).await?;
		if address.is_empty() {
			return Err(StorageError::Invalid {
				key: CONTRACT_ADDRESS_KEY.to_string(),
				reason: "empty contract address".to_string(),
			});
		}
		Ok(address)
	}

	pub async fn store_contract_address(&self, address: &str) -> Result<(), StorageError> {
		self.backend.write(CONTRACT_ADDRESS_KEY, address).await?;
		info!(address, "Stored contract address");
		Ok(())
	}
}
