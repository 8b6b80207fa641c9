//! Error types for vigil-state.

use std::path::PathBuf;

/// Result type alias for store operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Errors from durable state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The store file exists but does not parse.
    ///
    /// A missing file is *not* this error: first run loads an empty
    /// document. Corruption is surfaced so callers can warn and decide
    /// whether to proceed empty.
    #[error("state file {path} is corrupt: {reason}")]
    Corrupt {
        /// Path of the unreadable store.
        path: PathBuf,
        /// Parse failure description.
        reason: String,
    },

    /// Serialization of the document failed.
    #[error("state serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error.
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Creates a corruption error.
    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
