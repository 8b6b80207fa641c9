//! The scanner contract and its OS-backed implementation.

use async_trait::async_trait;

use crate::error::{PortError, PortResult};
use crate::types::PortInfo;

/// Stable contract for port discovery.
///
/// The manager and adopter depend on this trait, not on [`SystemScanner`],
/// so tests can substitute a deterministic scanner.
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Reports whether the port is in use. Bounded, never blocks on a
    /// remote peer.
    async fn is_port_in_use(&self, port: u16) -> bool;

    /// Resolves a port to its owner.
    ///
    /// `None` means free; `Some` with an empty owner means in use by a
    /// process we cannot identify (permission degradation, not an error).
    async fn port_info(&self, port: u16) -> PortResult<Option<PortInfo>>;

    /// All in-use ports in `[start, end]`, inclusive.
    ///
    /// # Errors
    /// [`PortError::InvalidRange`] when `start > end`, checked before any
    /// scanning happens.
    async fn scan_range(&self, start: u16, end: u16) -> PortResult<Vec<PortInfo>>;

    /// First free port at or above `start`.
    ///
    /// # Errors
    /// [`PortError::Exhausted`] when nothing below 65536 is free.
    async fn find_available_port(&self, start: u16) -> PortResult<u16>;

    /// System-wide snapshot of listening ports.
    async fn listening_ports(&self) -> PortResult<Vec<PortInfo>>;
}

/// OS-backed scanner: bind probes plus platform enumeration.
#[derive(Debug, Clone, Default)]
pub struct SystemScanner;

impl SystemScanner {
    /// Creates a new system scanner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// A port is free only if both the loopback and wildcard addresses can
    /// be bound; either failing means something is listening.
    fn probe_free(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
            && std::net::TcpListener::bind(("0.0.0.0", port)).is_ok()
    }

    fn enumerate() -> PortResult<Vec<PortInfo>> {
        #[cfg(target_os = "linux")]
        {
            crate::linux::enumerate()
        }

        #[cfg(target_os = "macos")]
        {
            crate::macos::enumerate()
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            crate::unsupported::enumerate()
        }
    }
}

#[async_trait]
impl PortScanner for SystemScanner {
    async fn is_port_in_use(&self, port: u16) -> bool {
        !Self::probe_free(port)
    }

    async fn port_info(&self, port: u16) -> PortResult<Option<PortInfo>> {
        let snapshot = Self::enumerate()?;
        if let Some(info) = snapshot.into_iter().find(|info| info.port == port) {
            return Ok(Some(info));
        }
        // Enumeration can miss sockets the probe still sees (v6-only
        // binds, permission limits): report in-use with an unknown owner.
        if Self::probe_free(port) {
            Ok(None)
        } else {
            Ok(Some(PortInfo::unresolved(port)))
        }
    }

    async fn scan_range(&self, start: u16, end: u16) -> PortResult<Vec<PortInfo>> {
        if start > end {
            return Err(PortError::InvalidRange { start, end });
        }
        let mut in_range: Vec<PortInfo> = Self::enumerate()?
            .into_iter()
            .filter(|info| info.port >= start && info.port <= end)
            .collect();
        in_range.sort_by_key(|info| info.port);
        tracing::debug!(start = start, end = end, found = in_range.len(), "scanned port range");
        Ok(in_range)
    }

    async fn find_available_port(&self, start: u16) -> PortResult<u16> {
        // Port 0 is the kernel's "pick one for me" wildcard; binding it
        // always succeeds, so probing it would report a phantom free port.
        for port in start.max(1)..=u16::MAX {
            if Self::probe_free(port) {
                return Ok(port);
            }
        }
        Err(PortError::Exhausted(start))
    }

    async fn listening_ports(&self) -> PortResult<Vec<PortInfo>> {
        Self::enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_range_rejects_inverted_range() {
        let scanner = SystemScanner::new();
        let err = scanner.scan_range(5010, 5000).await.unwrap_err();
        assert!(matches!(
            err,
            PortError::InvalidRange {
                start: 5010,
                end: 5000
            }
        ));
    }

    #[tokio::test]
    async fn test_scan_range_single_port_is_valid() {
        let scanner = SystemScanner::new();
        assert!(scanner.scan_range(5000, 5000).await.is_ok());
    }

    #[tokio::test]
    async fn test_bound_port_is_in_use() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = SystemScanner::new();
        assert!(scanner.is_port_in_use(port).await);
    }

    #[tokio::test]
    async fn test_find_available_port_skips_occupied() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = SystemScanner::new();
        let found = scanner.find_available_port(port).await.unwrap();
        assert!(found > port);
        assert!(!scanner.is_port_in_use(found).await);
    }

    #[tokio::test]
    async fn test_find_available_port_never_returns_zero() {
        let scanner = SystemScanner::new();
        let found = scanner.find_available_port(0).await.unwrap();
        assert_ne!(found, 0);
        assert!(!scanner.is_port_in_use(found).await);
    }

    #[tokio::test]
    async fn test_find_available_port_returns_free_start() {
        let scanner = SystemScanner::new();
        let free = scanner.find_available_port(20000).await.unwrap();
        // Whatever it found must actually be free
        assert!(!scanner.is_port_in_use(free).await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_port_info_resolves_own_listener() {
        let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = SystemScanner::new();
        let info = scanner
            .port_info(port)
            .await
            .unwrap()
            .expect("own listener must be reported in use");
        assert_eq!(info.port, port);
        assert_eq!(info.pid, Some(std::process::id()));
    }

    #[tokio::test]
    async fn test_port_info_free_port_is_none() {
        let scanner = SystemScanner::new();
        let free = scanner.find_available_port(30000).await.unwrap();
        assert!(scanner.port_info(free).await.unwrap().is_none());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_listening_ports_contains_own_listener() {
        let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = SystemScanner::new();
        let all = scanner.listening_ports().await.unwrap();
        assert!(all.iter().any(|info| info.port == port));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_scan_range_finds_own_listener() {
        let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = SystemScanner::new();
        let found = scanner.scan_range(port, port).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].port, port);
    }
}
