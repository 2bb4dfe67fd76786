//! Error types for the sync pipeline.

use ccsearch_search::SearchError;
use ccsearch_storage::StorageError;
use ccsearch_types::CcSearchError;
use thiserror::Error;

/// Errors that can occur in the sync pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkpoint load/save issues
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Log entry could not be parsed into its document shape
    #[error("Document error: {0}")]
    Document(#[from] CcSearchError),

    /// Search engine rejected or failed an operation
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Blocking storage worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    Background(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexingError::Checkpoint("failed to save".to_string());
        assert_eq!(err.to_string(), "Checkpoint error: failed to save");

        let err: IndexingError = CcSearchError::MalformedDocument("missing type".into()).into();
        assert_eq!(err.to_string(), "Document error: Malformed document: missing type");
    }
}
