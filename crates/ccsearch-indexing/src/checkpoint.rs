//! Durable cursor storage.
//!
//! The cursor is the highest log sequence whose records are committed to
//! the index. It is stored as a base-10 string under a single key.

use std::sync::Arc;

use async_trait::async_trait;

use ccsearch_storage::Storage;

use crate::blocking::run_blocking;
use crate::error::IndexingError;

/// Key/value store holding one cursor value.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Raw stored value, or `None` if nothing was ever written.
    async fn load(&self) -> Result<Option<String>, IndexingError>;

    /// Overwrite the stored value.
    async fn save(&self, cursor: u64) -> Result<(), IndexingError>;
}

/// [`CheckpointStore`] over the RocksDB `checkpoints` column family.
pub struct StorageCheckpointStore {
    storage: Arc<Storage>,
    key: String,
}

impl StorageCheckpointStore {
    pub fn new(storage: Arc<Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl CheckpointStore for StorageCheckpointStore {
    async fn load(&self) -> Result<Option<String>, IndexingError> {
        let storage = self.storage.clone();
        let key = self.key.clone();
        let raw = run_blocking(move || {
            storage.catch_up()?;
            storage.get_checkpoint(&key)
        })
        .await?;

        // Undecodable bytes surface as a non-numeric value
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn save(&self, cursor: u64) -> Result<(), IndexingError> {
        let storage = self.storage.clone();
        let key = self.key.clone();
        run_blocking(move || storage.put_checkpoint(&key, cursor.to_string().as_bytes())).await
    }
}
