//! Error types for vigil-platform.

/// Result type alias for platform operations.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Errors from OS process introspection.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Signalling or probing a process failed for a reason other than the
    /// process being gone (e.g. an unexpected errno).
    #[error("process probe failed for pid {pid}: {reason}")]
    ProbeFailed {
        /// Target process ID.
        pid: u32,
        /// OS-level failure description.
        reason: String,
    },

    /// A non-forced termination request expired with the process still alive.
    #[error("process {0} still alive after grace period")]
    StillAlive(u32),

    /// The operation is not supported on this platform.
    #[error("operation not supported on this platform: {0}")]
    Unsupported(&'static str),
}

impl PlatformError {
    /// Creates a probe failure error.
    #[must_use]
    pub fn probe_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            pid,
            reason: reason.into(),
        }
    }
}
