//! File-based artifact storage.
//!
//! Each key maps to `<base_path>/<key>.txt` holding the bare value, the
//! layout the deployment scripts have always used (`code_id.txt`,
//! `address.txt`).

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		Self {
			base_path: base_path.into(),
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.txt", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn read(&self, key: &str) -> Result<String, StorageError> {
		let path = self.get_file_path(key);

		match fs::read_to_string(&path).await {
			Ok(data) => Ok(data.trim().to_string()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(StorageError::NotFound(path.display().to_string()))
			}
			Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(StorageError::Invalid {
				key: key.to_string(),
				reason: "not valid UTF-8".to_string(),
			}),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		// Create parent directory if it doesn't exist
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value.as_bytes())
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}
}

/// Creates a file storage rooted at the configured artifact directory.
pub fn create_storage(artifact_dir: impl Into<PathBuf>) -> Box<dyn StorageInterface> {
	Box::new(FileStorage::new(artifact_dir))
}
