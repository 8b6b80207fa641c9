//! Core data model: managed processes, health check descriptors, adoption
//! candidates.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique identifier for a managed process.
///
/// UUIDs rather than indices or PIDs: IDs stay stable across restarts of
/// the tool and are never recycled the way PIDs are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(uuid::Uuid);

impl ProcessId {
    /// Creates a new random process ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a process ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProcessId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle state of a managed process.
///
/// ```text
/// Running ↔ Unhealthy
///    ↓          ↓
/// Stopped / Failed → removed via cleanup
/// ```
///
/// `Running` and `Unhealthy` both count as alive for duplicate matching;
/// only `Running` with a passing probe is reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    /// Process is alive and believed healthy.
    Running,
    /// Process was stopped gracefully or forcefully.
    Stopped,
    /// Spawn failed or the process died unexpectedly.
    Failed,
    /// Process is alive but its health probe is failing.
    Unhealthy,
}

impl ProcessStatus {
    /// Returns true if the status describes a live process.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Running | Self::Unhealthy)
    }

    /// Returns true if the status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Unhealthy => "unhealthy",
        };
        write!(f, "{name}")
    }
}

/// The kind of probe a health check performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthCheckKind {
    /// HTTP GET expecting a 2xx response.
    Http,
    /// TCP connect expecting success.
    Tcp,
    /// External command expecting exit code 0.
    Command,
}

/// Health check descriptor attached to a managed process.
///
/// `timeout`, `interval`, and `retries` are optional: when absent, the
/// manager fills them from its [`crate::config::HealthPolicy`] before the
/// probe runs, so a bare `HealthCheckSpec::tcp(..)` inherits the
/// configured defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Probe kind.
    pub kind: HealthCheckKind,
    /// Probe target: URL for HTTP, `host:port` for TCP, command line for
    /// command probes.
    pub target: String,
    /// Per-attempt timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "crate::config::humantime_serde::opt")]
    pub timeout: Option<Duration>,
    /// Override for the interval between periodic evaluations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "crate::config::humantime_serde::opt")]
    pub interval: Option<Duration>,
    /// Override for the extra attempts after a first failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Disabled checks pass trivially.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl HealthCheckSpec {
    fn new(kind: HealthCheckKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            timeout: None,
            interval: None,
            retries: None,
            enabled: true,
        }
    }

    /// HTTP probe against the given URL.
    #[must_use]
    pub fn http(url: impl Into<String>) -> Self {
        Self::new(HealthCheckKind::Http, url)
    }

    /// TCP connect probe against `host:port`.
    #[must_use]
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(HealthCheckKind::Tcp, addr)
    }

    /// Command probe running the given command line.
    #[must_use]
    pub fn command(command_line: impl Into<String>) -> Self {
        Self::new(HealthCheckKind::Command, command_line)
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the evaluation interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Disables the check.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One managed process: the unit of supervision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedProcess {
    /// Immutable unique identifier.
    pub id: ProcessId,
    /// Executable or command name.
    pub command: String,
    /// Argument list.
    #[serde(default)]
    pub args: Vec<String>,
    /// OS process ID; meaningful only while the status is alive.
    pub pid: u32,
    /// Target TCP port, when the process serves one (1–65535).
    #[serde(default)]
    pub port: Option<u16>,
    /// Lifecycle status.
    pub status: ProcessStatus,
    /// Creation time, epoch milliseconds.
    pub created_at: u64,
    /// Last mutation time, epoch milliseconds.
    pub updated_at: u64,
    /// Last time the process was observed alive, epoch milliseconds.
    pub last_seen_at: u64,
    /// Optional health check descriptor.
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,
    /// Working directory the process was started in.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Environment variables supplied at spawn.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Log file the process output is redirected to.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl ManagedProcess {
    /// Creates a new entry with status `Running` and fresh timestamps.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>, pid: u32) -> Self {
        let now = now_epoch_ms();
        Self {
            id: ProcessId::new(),
            command: command.into(),
            args,
            pid,
            port: None,
            status: ProcessStatus::Running,
            created_at: now,
            updated_at: now,
            last_seen_at: now,
            health_check: None,
            working_dir: None,
            env: HashMap::new(),
            log_file: None,
        }
    }

    /// Sets the target port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the health check descriptor.
    #[must_use]
    pub fn with_health_check(mut self, check: HealthCheckSpec) -> Self {
        self.health_check = Some(check);
        self
    }

    /// Sets the environment map.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Sets the log file path.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// The full command line, command and arguments joined.
    #[must_use]
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    /// Whether this entry's command line matches the given one after
    /// normalization.
    #[must_use]
    pub fn matches_command(&self, command_line: &str) -> bool {
        normalize_command(&self.command_line()) == normalize_command(command_line)
    }

    /// Whether the backing OS process is currently alive.
    #[must_use]
    pub fn pid_alive(&self) -> bool {
        vigil_platform::pid_alive(self.pid)
    }

    /// Updates the mutation and observation timestamps.
    pub fn touch(&mut self) {
        let now = now_epoch_ms();
        self.updated_at = now;
        self.last_seen_at = now;
    }

    /// Transitions to a new status, updating `updated_at`.
    pub fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
        self.updated_at = now_epoch_ms();
    }
}

/// Normalizes a command line for duplicate comparison: collapses runs of
/// whitespace so that formatting differences do not defeat matching.
#[must_use]
pub fn normalize_command(command_line: &str) -> String {
    command_line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A discovered, not-yet-adopted process. Ephemeral: produced by discovery
/// and consumed once by an adopt operation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptionInfo {
    /// OS process ID.
    pub pid: u32,
    /// Recovered command line.
    pub command: String,
    /// Listening port, when one was resolved.
    pub port: Option<u16>,
    /// Working directory, when the OS exposes it.
    pub working_dir: Option<PathBuf>,
    /// Short process name.
    pub process_name: String,
    /// Whether the candidate looks like an adoptable development server.
    pub suitable: bool,
    /// Human-readable verdict explanation.
    pub reason: String,
}

/// Decision returned by the conflict-query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "decision")]
pub enum ConflictDecision {
    /// No conflicting entry; the candidate command may start.
    Allow,
    /// A matching healthy entry already satisfies the candidate.
    Block {
        /// Identity of the blocking entry.
        id: ProcessId,
        /// Command line of the blocking entry.
        command: String,
    },
}

impl ConflictDecision {
    /// Returns true when the decision is to block.
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Current time as epoch milliseconds.
#[must_use]
pub(crate) fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
