//! Error types for Intake.
//!
//! Library crates use [`IntakeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Intake operations.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Object store error (missing object, unreadable metadata, etc.).
    #[error("object store error: {0}")]
    Blob(String),

    /// Search index error.
    #[error("index error: {0}")]
    Index(String),

    /// Outbound notification error.
    #[error("notification error: {0}")]
    Notify(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad form field, rejected upload, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Content decoding or parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IntakeError>;

impl IntakeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    /// Whether this error was caused by bad caller input rather than a
    /// failing collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = IntakeError::config("missing sender address");
        assert_eq!(err.to_string(), "config error: missing sender address");

        let err = IntakeError::validation("Missing required field: email");
        assert!(err.to_string().contains("Missing required field"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(IntakeError::validation("bad").is_client_error());
        assert!(IntakeError::NotFound("contact_1".into()).is_client_error());
        assert!(!IntakeError::Storage("disk full".into()).is_client_error());
    }
}
