// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-ports
//!
//! Listening-port discovery for the Vigil process registry: "is this port in
//! use, and by what", and "which ports are free".
//!
//! The [`PortScanner`] trait is the stable contract; [`SystemScanner`] is the
//! OS-backed implementation. Two mechanisms compose behind it:
//!
//! - **Bind probes** answer in-use/free questions instantly and portably.
//! - **Platform enumeration** resolves the owning PID and process name:
//!   `/proc/net/tcp` plus fd-table inode matching on Linux, `lsof` on macOS,
//!   owner-less elsewhere.
//!
//! Ownership resolution degrades, never fails: a port whose owner the caller
//! lacks permission to see is still reported as in use, with an unknown
//! owner.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod scanner;
mod types;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

pub use error::{PortError, PortResult};
pub use scanner::{PortScanner, SystemScanner};
pub use types::PortInfo;

/// The highest port number conventionally requiring elevated privilege.
pub const PRIVILEGED_PORT_MAX: u16 = 1023;

/// Returns true for ports below 1024.
///
/// Purely informational classification; nothing in Vigil refuses to touch
/// privileged ports.
#[must_use]
pub const fn is_privileged_port(port: u16) -> bool {
    port <= PRIVILEGED_PORT_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_classification() {
        assert!(is_privileged_port(80));
        assert!(is_privileged_port(443));
        assert!(is_privileged_port(1023));
        assert!(!is_privileged_port(1024));
        assert!(!is_privileged_port(8080));
    }
}
