//! Error types for vigil-lock.

use std::time::Duration;

/// Result type alias for lock operations.
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Errors from file lock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock could not be acquired within the configured deadline.
    #[error("lock not acquired within {0:?}")]
    Timeout(Duration),

    /// Release was attempted by a handle that does not own the on-disk record.
    #[error("lock is owned by pid {holder_pid}, not this handle")]
    NotOwner {
        /// PID recorded in the lock file.
        holder_pid: u32,
    },

    /// Release was attempted while the handle does not hold the lock.
    #[error("lock is not held by this handle")]
    NotHeld,

    /// The on-disk record could not be parsed.
    ///
    /// During acquisition this is treated as staleness, not a failure; it
    /// only surfaces from [`crate::FileLock::info`].
    #[error("lock record is malformed: {0}")]
    InvalidRecord(String),

    /// Filesystem error.
    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LockError {
    /// Creates an invalid-record error.
    #[must_use]
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
