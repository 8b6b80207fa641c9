//! Scanner result types.

use serde::{Deserialize, Serialize};

/// One in-use TCP port and, when resolvable, its owner.
///
/// `pid`/`process_name` are `None` when the port is demonstrably in use but
/// ownership could not be resolved (insufficient permissions, or a platform
/// without enumeration support).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// The TCP port number.
    pub port: u16,
    /// Owning process ID, when resolvable.
    pub pid: Option<u32>,
    /// Owning process name, when resolvable.
    pub process_name: Option<String>,
}

impl PortInfo {
    /// A port known to be in use with an unknown owner.
    #[must_use]
    pub fn unresolved(port: u16) -> Self {
        Self {
            port,
            pid: None,
            process_name: None,
        }
    }

    /// A port with a fully resolved owner.
    #[must_use]
    pub fn owned(port: u16, pid: u32, process_name: impl Into<String>) -> Self {
        Self {
            port,
            pid: Some(pid),
            process_name: Some(process_name.into()),
        }
    }
}
