//! Error types for LeadSync.
//!
//! Library crates use [`LeadSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the HTTP layer maps it to status codes.

use std::path::PathBuf;

/// Top-level error type for all LeadSync operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadSyncError {
    /// Configuration loading/validation error, or a required credential is absent.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the CRM or the mail API.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Email delivery failure.
    #[error("notification error: {0}")]
    Notification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed payload, invalid cron, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Another synchronization pass currently holds the gate.
    #[error("a synchronization pass is already running")]
    PassInProgress,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadSyncError>;

impl LeadSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LeadSyncError::config("SENDGRID_API_KEY is not set");
        assert_eq!(err.to_string(), "config error: SENDGRID_API_KEY is not set");

        let err = LeadSyncError::Network("HTTP 401 Unauthorized".into());
        assert!(err.to_string().contains("401"));

        assert_eq!(
            LeadSyncError::PassInProgress.to_string(),
            "a synchronization pass is already running"
        );
    }
}
