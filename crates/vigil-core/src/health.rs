//! Health probing: HTTP, TCP, and command checks.

use std::process::Stdio;
use std::time::Duration;

use crate::types::{HealthCheckKind, HealthCheckSpec};

/// Result of one full health evaluation (all retries spent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    /// At least one attempt succeeded.
    Passed,
    /// Every attempt failed; carries the last failure reason.
    Failed {
        /// Why the final attempt failed.
        reason: String,
    },
    /// The check is disabled; no verdict.
    Skipped,
}

impl HealthOutcome {
    /// Returns true unless the outcome is a failure.
    ///
    /// Skipped counts as passing: a disabled check must never downgrade a
    /// process.
    #[must_use]
    pub const fn is_passing(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Timeout applied when neither the spec nor a policy provides one.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Stateless executor of health check descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthProber;

impl HealthProber {
    /// Creates a new prober.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates a check: up to `retries + 1` attempts, stopping at the
    /// first success.
    ///
    /// Unset `timeout`/`retries` fall back to five seconds and zero
    /// retries; the manager resolves specs against its `HealthPolicy`
    /// before they reach this point, so the fallback only matters for
    /// standalone use.
    pub async fn evaluate(&self, spec: &HealthCheckSpec) -> HealthOutcome {
        if !spec.enabled {
            return HealthOutcome::Skipped;
        }

        let attempts = spec.retries.unwrap_or(0).saturating_add(1);
        let mut last_failure = String::new();
        for attempt in 1..=attempts {
            match self.attempt(spec).await {
                Ok(()) => {
                    tracing::debug!(target_addr = %spec.target, attempt, "health check passed");
                    return HealthOutcome::Passed;
                }
                Err(reason) => {
                    tracing::debug!(
                        target_addr = %spec.target,
                        attempt,
                        reason = %reason,
                        "health check attempt failed"
                    );
                    last_failure = reason;
                }
            }
        }
        HealthOutcome::failed(last_failure)
    }

    async fn attempt(&self, spec: &HealthCheckSpec) -> std::result::Result<(), String> {
        let timeout = spec.timeout.unwrap_or(FALLBACK_TIMEOUT);
        match spec.kind {
            HealthCheckKind::Http => Self::probe_http(&spec.target, timeout).await,
            HealthCheckKind::Tcp => Self::probe_tcp(&spec.target, timeout).await,
            HealthCheckKind::Command => Self::probe_command(&spec.target, timeout).await,
        }
    }

    async fn probe_http(target: &str, timeout: Duration) -> std::result::Result<(), String> {
        let url = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("http://{target}")
        };

        let response = tokio::time::timeout(timeout, reqwest::get(&url))
            .await
            .map_err(|_| format!("HTTP probe of {url} timed out after {timeout:?}"))?
            .map_err(|e| format!("HTTP probe of {url} failed: {e}"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP probe of {url} returned status {status}"))
        }
    }

    async fn probe_tcp(target: &str, timeout: Duration) -> std::result::Result<(), String> {
        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(target))
            .await
            .map_err(|_| format!("TCP connect to {target} timed out after {timeout:?}"))?
            .map_err(|e| format!("TCP connect to {target} failed: {e}"))?;
        Ok(())
    }

    async fn probe_command(target: &str, timeout: Duration) -> std::result::Result<(), String> {
        let words =
            shell_words::split(target).map_err(|e| format!("cannot parse command: {e}"))?;
        let Some((program, args)) = words.split_first() else {
            return Err("empty health check command".to_string());
        };

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("cannot run {program}: {e}"))?;

        let status = tokio::time::timeout(timeout, child.wait())
            .await
            .map_err(|_| format!("command {program} timed out after {timeout:?}"))?
            .map_err(|e| format!("waiting on {program} failed: {e}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("command {program} exited with {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthCheckSpec;

    #[tokio::test]
    async fn test_disabled_check_is_skipped() {
        let prober = HealthProber::new();
        let spec = HealthCheckSpec::tcp("127.0.0.1:1").disabled();
        let outcome = prober.evaluate(&spec).await;
        assert_eq!(outcome, HealthOutcome::Skipped);
        assert!(outcome.is_passing());
    }

    #[tokio::test]
    async fn test_tcp_probe_passes_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let prober = HealthProber::new();
        let spec = HealthCheckSpec::tcp(addr.to_string());
        assert_eq!(prober.evaluate(&spec).await, HealthOutcome::Passed);
    }

    #[tokio::test]
    async fn test_tcp_probe_fails_against_closed_port() {
        // Bind then drop to get a port that was just freed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HealthProber::new();
        let spec =
            HealthCheckSpec::tcp(addr.to_string()).with_timeout(Duration::from_millis(500));
        let outcome = prober.evaluate(&spec).await;
        assert!(!outcome.is_passing());
    }

    #[tokio::test]
    async fn test_command_probe_success() {
        let prober = HealthProber::new();
        let spec = HealthCheckSpec::command("true");
        assert_eq!(prober.evaluate(&spec).await, HealthOutcome::Passed);
    }

    #[tokio::test]
    async fn test_command_probe_nonzero_exit_fails() {
        let prober = HealthProber::new();
        let spec = HealthCheckSpec::command("false");
        match prober.evaluate(&spec).await {
            HealthOutcome::Failed { reason } => assert!(reason.contains("exited")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_probe_missing_binary_fails() {
        let prober = HealthProber::new();
        let spec = HealthCheckSpec::command("/nonexistent/health-probe");
        assert!(!prober.evaluate(&spec).await.is_passing());
    }

    #[tokio::test]
    async fn test_command_probe_timeout() {
        let prober = HealthProber::new();
        let spec =
            HealthCheckSpec::command("sleep 10").with_timeout(Duration::from_millis(100));
        match prober.evaluate(&spec).await {
            HealthOutcome::Failed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_command_fails() {
        let prober = HealthProber::new();
        let spec = HealthCheckSpec::command("");
        assert!(!prober.evaluate(&spec).await.is_passing());
    }

    #[tokio::test]
    async fn test_http_probe_against_local_responder() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok")
                    .await;
            }
        });

        let prober = HealthProber::new();
        let spec = HealthCheckSpec::http(format!("http://{addr}/health"));
        assert_eq!(prober.evaluate(&spec).await, HealthOutcome::Passed);
        server.abort();
    }

    #[tokio::test]
    async fn test_http_probe_error_status_fails() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n")
                    .await;
            }
        });

        let prober = HealthProber::new();
        let spec = HealthCheckSpec::http(format!("{addr}/health"));
        match prober.evaluate(&spec).await {
            HealthOutcome::Failed { reason } => assert!(reason.contains("503")),
            other => panic!("expected failure, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn test_retries_exhaust_then_fail() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HealthProber::new();
        let spec = HealthCheckSpec::tcp(addr.to_string())
            .with_timeout(Duration::from_millis(200))
            .with_retries(2);
        // 3 attempts in total, all against a closed port
        assert!(!prober.evaluate(&spec).await.is_passing());
    }
}
