//! Error types for vigil-core.

use crate::types::ProcessId;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Comprehensive error type for the supervising core.
///
/// Leaf-crate errors convert losslessly via `#[from]`; the remaining
/// variants cover manager-level failure modes. Health check failures are
/// deliberately *not* fatal anywhere — they downgrade an entry's status —
/// so [`VigilError::HealthCheck`] only appears when a caller asks for an
/// explicit probe and that probe cannot run at all.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Lock acquisition or release failed.
    #[error("lock error: {0}")]
    Lock(#[from] vigil_lock::LockError),

    /// Registry persistence failed.
    #[error("state error: {0}")]
    State(#[from] vigil_state::StateError),

    /// Port discovery failed.
    #[error("port error: {0}")]
    Port(#[from] vigil_ports::PortError),

    /// OS process introspection failed.
    #[error("platform error: {0}")]
    Platform(#[from] vigil_platform::PlatformError),

    /// No registry entry with the given ID.
    #[error("process not found: {0}")]
    NotFound(ProcessId),

    /// Spawning a new OS process failed.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// A process could not be adopted.
    #[error("adoption failed: {0}")]
    Adoption(String),

    /// A health probe could not be executed at all.
    #[error("health check failed: {0}")]
    HealthCheck(String),

    /// Invalid configuration or operation options.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VigilError {
    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Creates an adoption error.
    #[must_use]
    pub fn adoption(msg: impl Into<String>) -> Self {
        Self::Adoption(msg.into())
    }

    /// Creates a health check error.
    #[must_use]
    pub fn health_check(msg: impl Into<String>) -> Self {
        Self::HealthCheck(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VigilError::spawn("no such file");
        assert_eq!(err.to_string(), "spawn failed: no such file");

        let id = ProcessId::new();
        let err = VigilError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_lock_error_converts() {
        let err: VigilError = vigil_lock::LockError::NotHeld.into();
        assert!(matches!(err, VigilError::Lock(_)));
    }
}
