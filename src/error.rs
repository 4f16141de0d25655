//! Error types and handling infrastructure for lineserver.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! the library error type. The binary wraps these in `anyhow` for top-level context.
//!
//! ## Classification
//!
//! - **Client errors**: `InvalidLineNumber` is expected user input and is never logged as a fault
//! - **Retryable errors**: `NotReady` means indexing has not finished yet
//! - **Everything else** is an operator or internal fault

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for lineserver operations.
#[derive(Error, Debug)]
pub enum LineServerError {
    /// File missing, unreadable or permission denied
    #[error("File access failed: {message}")]
    FileAccess {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The total line count of the file could not be determined
    #[error("Unable to determine the line count of {path}: {message}")]
    CountResolution { path: PathBuf, message: String },

    /// Requested line is zero or not below the total line count
    #[error("Invalid line number {line} (file has {total} lines)")]
    InvalidLineNumber { line: u64, total: u64 },

    /// A bounded scan finished without reaching a line that passed validation.
    /// Points at an inconsistent index.
    #[error("Line {line} was not found within its indexed byte range")]
    LineNotFound { line: u64 },

    /// A line was requested before indexing completed
    #[error("File index is not ready yet")]
    NotReady,

    /// Operation not allowed in the engine's current lifecycle state
    #[error("Invalid engine state: {message}")]
    InvalidState { message: String },

    /// Listener or connection failures of the HTTP transport
    #[error("Network operation failed: {message}")]
    Network {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Standard Result type for lineserver operations.
pub type Result<T> = std::result::Result<T, LineServerError>;

impl LineServerError {
    /// Create a FileAccess error from an io::Error with additional context
    pub fn file_access(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileAccess {
            message: message.into(),
            source,
        }
    }

    /// Create a CountResolution error for `path`
    pub fn count_resolution(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CountResolution {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Network {
            message: message.into(),
            source,
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors caused by the request itself rather than by the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidLineNumber { .. })
    }

    /// True for errors the caller may retry later without changing the request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}

// Automatic conversion from io::Error to LineServerError
impl From<std::io::Error> for LineServerError {
    fn from(err: std::io::Error) -> Self {
        let message = match err.kind() {
            std::io::ErrorKind::NotFound => "File not found",
            std::io::ErrorKind::PermissionDenied => "Permission denied",
            _ => "IO operation failed",
        };
        Self::FileAccess {
            message: message.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let invalid = LineServerError::InvalidLineNumber { line: 0, total: 12 };
        assert_eq!(invalid.to_string(), "Invalid line number 0 (file has 12 lines)");

        let count = LineServerError::count_resolution("/data/big.txt", "wc exited with 1");
        assert_eq!(
            count.to_string(),
            "Unable to determine the line count of /data/big.txt: wc exited with 1"
        );

        let missing = LineServerError::LineNotFound { line: 7 };
        assert_eq!(
            missing.to_string(),
            "Line 7 was not found within its indexed byte range"
        );
    }

    #[test]
    fn test_classification() {
        assert!(LineServerError::InvalidLineNumber { line: 5, total: 5 }.is_client_error());
        assert!(!LineServerError::InvalidLineNumber { line: 5, total: 5 }.is_retryable());

        assert!(LineServerError::NotReady.is_retryable());
        assert!(!LineServerError::NotReady.is_client_error());

        let internal = LineServerError::LineNotFound { line: 3 };
        assert!(!internal.is_client_error());
        assert!(!internal.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LineServerError = io_err.into();

        match err {
            LineServerError::FileAccess { message, .. } => {
                assert_eq!(message, "Permission denied");
            }
            _ => panic!("Expected FileAccess variant"),
        }
    }
}
