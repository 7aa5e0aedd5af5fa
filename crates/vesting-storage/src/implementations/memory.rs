//! In-memory artifact storage, for dry runs and tests.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStorage {
	values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn read(&self, key: &str) -> Result<String, StorageError> {
		self.values
			.read()
			.await
			.get(key)
			.map(|v| v.trim().to_string())
			.ok_or_else(|| StorageError::NotFound(key.to_string()))
	}

	async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.values
			.write()
			.await
			.insert(key.to_string(), value.to_string());
		Ok(())
	}
}
