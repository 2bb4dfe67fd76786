//! Error types for the scheduler crate.

use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job period is zero
    #[error("Invalid interval for job {0}: period must be non-zero")]
    InvalidInterval(String),

    /// A job with this name is already registered
    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    /// Scheduler is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler is not running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::InvalidInterval("sync".to_string());
        assert!(err.to_string().contains("non-zero"));

        let err = SchedulerError::DuplicateJob("sync".to_string());
        assert!(err.to_string().contains("already registered"));

        let err = SchedulerError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = SchedulerError::NotRunning;
        assert!(err.to_string().contains("not running"));
    }
}
