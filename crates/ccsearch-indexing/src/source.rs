//! Log source seam: ordered range reads over the commit log.

use std::sync::Arc;

use async_trait::async_trait;

use ccsearch_storage::Storage;
use ccsearch_types::LogEntry;

use crate::blocking::run_blocking;
use crate::error::IndexingError;

/// Ordered, durable log consumed by cursor.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Up to `limit` entries with `sequence > cursor`, ascending by sequence.
    async fn fetch_after(&self, cursor: u64, limit: usize) -> Result<Vec<LogEntry>, IndexingError>;
}

/// [`LogSource`] over the RocksDB commit log.
///
/// With a follower [`Storage`] each fetch first catches up with the
/// primary, so entries appended by other processes become visible.
pub struct StorageLogSource {
    storage: Arc<Storage>,
}

impl StorageLogSource {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LogSource for StorageLogSource {
    async fn fetch_after(&self, cursor: u64, limit: usize) -> Result<Vec<LogEntry>, IndexingError> {
        let storage = self.storage.clone();
        run_blocking(move || {
            storage.catch_up()?;
            storage.get_entries_after(cursor, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_after() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        storage.append_batch(&["a", "b", "c"]).unwrap();

        let source = StorageLogSource::new(storage);
        let entries = source.fetch_after(1, 512).await.unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_follower_picks_up_new_entries() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("log");
        let writer = Storage::open(&log_path).unwrap();
        writer.append("a").unwrap();

        let follower =
            Storage::open_follower(&log_path, &temp_dir.path().join("follower")).unwrap();
        let source = StorageLogSource::new(Arc::new(follower));
        assert_eq!(source.fetch_after(0, 512).await.unwrap().len(), 1);

        writer.append_batch(&["b", "c"]).unwrap();
        let entries = source.fetch_after(1, 512).await.unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }
}
