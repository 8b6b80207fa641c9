//! Error types for vigil-ports.

/// Result type alias for scanner operations.
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Errors from port discovery.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// A scan was requested with `start > end`. Checked before any probing.
    #[error("invalid port range: {start} > {end}")]
    InvalidRange {
        /// Requested range start.
        start: u16,
        /// Requested range end.
        end: u16,
    },

    /// No free port exists at or above the requested start.
    #[error("no available port at or above {0}")]
    Exhausted(u16),

    /// OS-level enumeration failed outright (not a permission degradation).
    #[error("port enumeration failed: {0}")]
    Enumeration(String),

    /// Filesystem or subprocess error.
    #[error("port scan I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortError {
    /// Creates an enumeration failure error.
    #[must_use]
    pub fn enumeration(msg: impl Into<String>) -> Self {
        Self::Enumeration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::InvalidRange {
            start: 5010,
            end: 5000,
        };
        assert_eq!(err.to_string(), "invalid port range: 5010 > 5000");

        let err = PortError::Exhausted(65000);
        assert!(err.to_string().contains("65000"));
    }
}
