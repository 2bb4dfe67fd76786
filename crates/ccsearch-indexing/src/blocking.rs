//! Storage calls on the blocking thread pool.

use ccsearch_storage::StorageError;

use crate::error::IndexingError;

/// Run a RocksDB call off the async worker threads.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, IndexingError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IndexingError::Background(e.to_string()))?
        .map_err(IndexingError::from)
}
