// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-platform
//!
//! Cross-platform process introspection for the Vigil process registry.
//!
//! This crate is the single place where Vigil touches the OS process table:
//!
//! - [`pid_alive`] for non-destructive liveness probing
//! - [`snapshot`] / [`list_processes`] for process table snapshots
//! - [`terminate`] for graceful-then-forced termination
//!
//! Platform-specific mechanisms (signal 0 on Unix, process-table lookup
//! elsewhere) live behind this one surface; callers never branch on the
//! platform themselves.
//!
//! ## Example
//!
//! ```rust
//! use vigil_platform::pid_alive;
//!
//! // The current process is always alive.
//! assert!(pid_alive(std::process::id()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod process;

#[cfg(unix)]
mod unix;

#[cfg(not(unix))]
mod unsupported;

pub use error::{PlatformError, PlatformResult};
pub use process::{ProcessSnapshot, list_processes, snapshot};

use std::time::Duration;

/// Outcome of a [`terminate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The process exited within the grace period after the polite request.
    Graceful,
    /// The process ignored the polite request and was killed outright.
    Forced,
    /// The process was already gone when termination was requested.
    AlreadyDead,
}

/// Checks whether a process with the given PID is alive.
///
/// This is a non-destructive probe. On Unix it sends signal 0 via `kill`;
/// a permission error still counts as alive (the process exists, we just
/// cannot signal it). On other platforms the process table is consulted.
#[must_use]
pub fn pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unix::pid_alive(pid)
    }

    #[cfg(not(unix))]
    {
        unsupported::pid_alive(pid)
    }
}

/// Requests graceful termination of a process, escalating to a hard kill.
///
/// Sends the polite termination request (SIGTERM on Unix), then polls for
/// up to `grace`. If the process is still alive afterwards and `force` is
/// set, it is killed unconditionally (SIGKILL). With `force` unset a
/// stubborn process is left alive and reported via the error.
///
/// # Errors
///
/// Returns [`PlatformError::ProbeFailed`] if signalling fails for a reason
/// other than the process being gone, or [`PlatformError::StillAlive`] if
/// the process survived a non-forced termination request.
pub async fn terminate(pid: u32, grace: Duration, force: bool) -> PlatformResult<Terminated> {
    if !pid_alive(pid) {
        return Ok(Terminated::AlreadyDead);
    }

    #[cfg(unix)]
    unix::send_term(pid)?;

    #[cfg(not(unix))]
    unsupported::request_stop(pid)?;

    let poll = Duration::from_millis(50);
    let start = std::time::Instant::now();
    while start.elapsed() < grace {
        if !pid_alive(pid) {
            tracing::debug!(pid = pid, "process exited within grace period");
            return Ok(Terminated::Graceful);
        }
        tokio::time::sleep(poll).await;
    }

    if !force {
        return Err(PlatformError::StillAlive(pid));
    }

    #[cfg(unix)]
    unix::send_kill(pid)?;

    #[cfg(not(unix))]
    unsupported::force_stop(pid)?;

    tracing::debug!(pid = pid, "process killed after grace period expired");
    Ok(Terminated::Forced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_pid_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn test_nonexistent_pid_not_alive() {
        // PIDs near the 32-bit max are effectively never allocated
        assert!(!pid_alive(u32::MAX - 1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_already_dead() {
        let result = terminate(u32::MAX - 1, Duration::from_millis(100), false).await;
        assert_eq!(result.unwrap(), Terminated::AlreadyDead);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_graceful() {
        let mut child = tokio::process::Command::new("/bin/sleep")
            .arg("3600")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        // Reap the child in the background so the zombie does not linger
        let waiter = tokio::spawn(async move { child.wait().await });

        let result = terminate(pid, Duration::from_secs(5), false).await.unwrap();
        assert_eq!(result, Terminated::Graceful);
        let _ = waiter.await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_forced() {
        // A shell that traps SIGTERM will not exit gracefully
        let mut child = tokio::process::Command::new("/bin/sh")
            .args(["-c", "trap '' TERM; sleep 3600"])
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let waiter = tokio::spawn(async move { child.wait().await });

        // Give the shell a moment to install the trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let result = terminate(pid, Duration::from_millis(300), true).await.unwrap();
        assert_eq!(result, Terminated::Forced);
        let _ = waiter.await;
    }
}
