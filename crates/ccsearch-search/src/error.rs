//! Search error types.

use thiserror::Error;

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index not found
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Schema mismatch
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index writer lock poisoned
    #[error("Index is locked: {0}")]
    IndexLocked(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the engine API
    #[error("Search API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// An enqueued engine task finished in failure
    #[error("Task {task_uid} failed: {message}")]
    TaskFailed { task_uid: u64, message: String },

    /// An enqueued engine task did not finish in time
    #[error("Task {0} did not finish before the timeout")]
    TaskTimeout(u64),

    /// Filter on an attribute not declared filterable
    #[error("Attribute `{0}` is not filterable")]
    InvalidFilter(String),

    /// Sort on an attribute not declared sortable
    #[error("Attribute `{0}` is not sortable")]
    InvalidSort(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    Background(String),
}
