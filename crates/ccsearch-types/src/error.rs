//! Error types for the cc-search system.

use thiserror::Error;

/// Unified error type for shared domain operations.
#[derive(Debug, Error)]
pub enum CcSearchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document payload did not match the expected shape
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CcSearchError::Config("page_size must be > 0".to_string());
        assert_eq!(err.to_string(), "Configuration error: page_size must be > 0");

        let err = CcSearchError::MalformedDocument("missing type".to_string());
        assert_eq!(err.to_string(), "Malformed document: missing type");
    }
}
