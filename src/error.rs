//! Error types for the namequeue crate.

use thiserror::Error;

/// Result type alias for namequeue operations
pub type Result<T> = std::result::Result<T, NamedQueueError>;

/// Main error type for the namequeue crate
#[derive(Error, Debug)]
pub enum NamedQueueError {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The recorder has been closed and no longer accepts records.
    /// Used internally to unpark producers blocked in `claim` during
    /// shutdown; never surfaced through `add_record`.
    #[error("Recorder is closed")]
    Closed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Generic error for conditions that should not happen in a correctly
    /// functioning pipeline, such as a logic error in the code.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message describing the unexpected condition
        message: String,
    },
}

impl NamedQueueError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = NamedQueueError::config("test message");
        assert!(matches!(err, NamedQueueError::InvalidConfig { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_classification() {
        assert!(NamedQueueError::Timeout.is_recoverable());
        assert!(!NamedQueueError::Closed.is_recoverable());
        assert!(!NamedQueueError::unexpected("boom").is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = NamedQueueError::config("size hint must be non-negative");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: size hint must be non-negative"
        );
    }
}
