//! Centralized error types for mailsweep.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsweep library.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Token state is missing, unreadable, or could not be refreshed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A provider API call failed or returned a non-success status.
    #[error("provider error calling {endpoint}: {reason}")]
    Provider { endpoint: String, reason: String },

    /// A folder name could not be resolved to a provider label id.
    #[error("folder not found: '{0}'")]
    FolderNotFound(String),

    /// A rule uses an operator/type combination the query grammar cannot express.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// A payload part is malformed or its data cannot be decoded.
    #[error("payload decode error: {0}")]
    Decode(String),

    /// An error from the underlying SQLite store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file exists but could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, SweepError>`.
pub type Result<T> = std::result::Result<T, SweepError>;

impl SweepError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Provider` variant for the given endpoint.
    pub fn provider(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Provider {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `SweepError`
/// when no path context is available (rare — prefer `SweepError::io`).
impl From<std::io::Error> for SweepError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
