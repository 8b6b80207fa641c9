//! The supervising process manager.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::task::JoinSet;
use vigil_lock::FileLock;
use vigil_ports::{PortScanner, SystemScanner};

use crate::adopt::ProcessAdopter;
use crate::config::ManagerConfig;
use crate::error::{Result, VigilError};
use crate::health::{HealthOutcome, HealthProber};
use crate::registry::RegistryStore;
use crate::types::{
    ConflictDecision, HealthCheckSpec, ManagedProcess, ProcessId, ProcessStatus, now_epoch_ms,
};

// ═══════════════════════════════════════════════════════════════════════════
// Operation options and reports
// ═══════════════════════════════════════════════════════════════════════════

/// Everything needed to start (or reuse) a process.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Executable or command name.
    pub command: String,
    /// Argument list.
    pub args: Vec<String>,
    /// Target port, used for duplicate matching.
    pub port: Option<u16>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Health check attached to the entry.
    pub health_check: Option<HealthCheckSpec>,
    /// File stdout/stderr are appended to; discarded when absent.
    pub log_file: Option<PathBuf>,
}

impl StartOptions {
    /// Options for a bare command with arguments.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }

    /// Parses a full command line with shell-style quoting.
    ///
    /// # Errors
    /// Returns [`VigilError::Config`] for empty or unparsable input.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let words = shell_words::split(command_line)
            .map_err(|e| VigilError::config(format!("cannot parse command line: {e}")))?;
        let Some((command, args)) = words.split_first() else {
            return Err(VigilError::config("empty command line"));
        };
        Ok(Self::new(command.clone(), args.to_vec()))
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

    /// Adds one environment variable.
    #[must_use]
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Attaches a health check.
    #[must_use]
    pub fn with_health_check(mut self, check: HealthCheckSpec) -> Self {
        self.health_check = Some(check);
        self
    }

    /// Redirects output to a log file.
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

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(VigilError::config("command cannot be empty"));
        }
        if self.port == Some(0) {
            return Err(VigilError::config("port 0 is not a valid target port"));
        }
        Ok(())
    }
}

/// Filters applied by [`ProcessManager::list_processes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Include stopped and failed entries.
    pub include_stopped: bool,
    /// Restrict to entries with this target port.
    pub filter_by_port: Option<u16>,
}

impl ListOptions {
    /// Include every entry regardless of status.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            include_stopped: true,
            filter_by_port: None,
        }
    }

    /// Restrict to one port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.filter_by_port = Some(port);
        self
    }
}

/// Result of a start request.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    /// The managed entry, freshly created or reused.
    pub process: ManagedProcess,
    /// True when an existing healthy duplicate was returned instead of
    /// spawning.
    pub reused: bool,
}

/// What a cleanup pass did.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// IDs removed from the registry.
    pub removed: Vec<ProcessId>,
    /// IDs left in place (alive, and the pass was not forced).
    pub skipped: Vec<ProcessId>,
}

// ═══════════════════════════════════════════════════════════════════════════
// ProcessManager
// ═══════════════════════════════════════════════════════════════════════════

/// The orchestrator: start, stop, list, adopt, clean up.
///
/// Every mutating operation is one critical section over the shared lock
/// file (acquire → load → mutate → save → release), so any number of
/// concurrent invocations — including from separate OS processes — agree
/// on the registry. Read-only operations skip the lock and tolerate a
/// stale snapshot.
pub struct ProcessManager {
    config: ManagerConfig,
    store: RegistryStore,
    scanner: Arc<dyn PortScanner>,
    prober: HealthProber,
}

impl std::fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessManager")
            .field("state_path", &self.config.state_path)
            .field("lock_path", &self.config.lock_path)
            .finish_non_exhaustive()
    }
}

impl ProcessManager {
    /// Creates a manager over the given configuration.
    ///
    /// # Errors
    /// Returns [`VigilError::Config`] when the configuration is invalid.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let store = RegistryStore::new(&config.state_path);
        Ok(Self {
            config,
            store,
            scanner: Arc::new(SystemScanner::new()),
            prober: HealthProber::new(),
        })
    }

    /// Replaces the scanner, for deterministic tests.
    #[must_use]
    pub fn with_scanner(mut self, scanner: Arc<dyn PortScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// An adopter sharing this manager's scanner.
    #[must_use]
    pub fn adopter(&self) -> ProcessAdopter {
        ProcessAdopter::new(Arc::clone(&self.scanner))
    }

    fn lock(&self) -> FileLock {
        FileLock::new(&self.config.lock_path, self.config.lock.clone())
    }

    // ───────────────────────────────────────────────────────────────────
    // Start
    // ───────────────────────────────────────────────────────────────────

    /// Starts a process, or returns the existing healthy duplicate.
    ///
    /// Duplicate matching considers alive entries with the same normalized
    /// command line or the same target port, newest first. A matching entry
    /// whose PID is dead is downgraded instead of reused; one whose health
    /// probe fails is marked unhealthy and passed over.
    ///
    /// # Errors
    /// Lock, persistence, and spawn failures. A spawn failure leaves the
    /// registry unchanged.
    pub async fn start_process(&self, options: StartOptions) -> Result<StartOutcome> {
        options.validate()?;

        let mut lock = self.lock();
        lock.acquire().await?;
        let result = self.start_locked(&options).await;
        Self::release(&mut lock);
        result
    }

    async fn start_locked(&self, options: &StartOptions) -> Result<StartOutcome> {
        let mut registry = self.store.load()?;

        let candidate_ids: Vec<ProcessId> = registry
            .duplicate_candidates(&options.command_line(), options.port)
            .iter()
            .map(|p| p.id)
            .collect();

        let mut dirty = false;
        let mut reusable = None;
        for id in candidate_ids {
            let Some(entry) = registry.get_mut(&id) else {
                continue;
            };
            if !entry.pid_alive() {
                tracing::info!(id = %id, pid = entry.pid, "registered duplicate is dead, downgrading");
                entry.set_status(ProcessStatus::Stopped);
                dirty = true;
                continue;
            }
            match self.probe(entry).await {
                HealthOutcome::Failed { reason } => {
                    tracing::warn!(id = %id, reason = %reason, "duplicate is unhealthy, passing over");
                    entry.set_status(ProcessStatus::Unhealthy);
                    dirty = true;
                }
                HealthOutcome::Passed | HealthOutcome::Skipped => {
                    // A previously unhealthy entry that probes fine again
                    // has recovered; only a Running entry may be handed out
                    if entry.status != ProcessStatus::Running {
                        tracing::info!(id = %id, "entry recovered, upgrading to running");
                        entry.set_status(ProcessStatus::Running);
                    }
                    entry.touch();
                    dirty = true;
                    reusable = Some(id);
                    break;
                }
            }
        }

        if let Some(id) = reusable {
            self.store.save(&registry)?;
            let process = registry
                .get(&id)
                .cloned()
                .ok_or(VigilError::NotFound(id))?;
            tracing::info!(id = %id, pid = process.pid, "reusing existing process");
            return Ok(StartOutcome {
                process,
                reused: true,
            });
        }
        if dirty {
            // Persist the downgrades even though we are about to spawn
            self.store.save(&registry)?;
        }

        let pid = Self::spawn(options)?;
        let mut process =
            ManagedProcess::new(options.command.clone(), options.args.clone(), pid);
        process.port = options.port;
        process.working_dir = options.working_dir.clone();
        process.env = options.env.clone();
        process.health_check = options.health_check.clone();
        process.log_file = options.log_file.clone();

        tracing::info!(id = %process.id, pid, command = %options.command_line(), "started process");
        registry.insert(process.clone());
        self.store.save(&registry)?;
        Ok(StartOutcome {
            process,
            reused: false,
        })
    }

    fn spawn(options: &StartOptions) -> Result<u32> {
        let (stdout, stderr) = match &options.log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                let err = file.try_clone()?;
                (Stdio::from(file), Stdio::from(err))
            }
            None => (Stdio::null(), Stdio::null()),
        };

        let mut command = tokio::process::Command::new(&options.command);
        command
            .args(&options.args)
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(dir) = &options.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| VigilError::spawn(format!("{}: {e}", options.command)))?;
        // Tokio reaps the child in the background once the handle drops
        child
            .id()
            .ok_or_else(|| VigilError::spawn("child exited before a PID was observed"))
    }

    // ───────────────────────────────────────────────────────────────────
    // Stop
    // ───────────────────────────────────────────────────────────────────

    /// Stops a managed process: SIGTERM, grace period, then SIGKILL when
    /// `force` is set.
    ///
    /// # Errors
    /// [`VigilError::NotFound`] for unknown IDs;
    /// [`VigilError::Platform`] when the process outlives the grace period
    /// and `force` is false.
    pub async fn stop_process(&self, id: ProcessId, force: bool) -> Result<ManagedProcess> {
        let mut lock = self.lock();
        lock.acquire().await?;
        let result = self.stop_locked(id, force).await;
        Self::release(&mut lock);
        result
    }

    async fn stop_locked(&self, id: ProcessId, force: bool) -> Result<ManagedProcess> {
        let mut registry = self.store.load()?;
        let entry = registry.get_mut(&id).ok_or(VigilError::NotFound(id))?;

        if entry.status.is_alive() && entry.pid_alive() {
            let how =
                vigil_platform::terminate(entry.pid, self.config.stop_grace, force).await?;
            tracing::info!(id = %id, pid = entry.pid, outcome = ?how, "stopped process");
        }
        entry.set_status(ProcessStatus::Stopped);
        let stopped = entry.clone();
        self.store.save(&registry)?;
        Ok(stopped)
    }

    // ───────────────────────────────────────────────────────────────────
    // Query
    // ───────────────────────────────────────────────────────────────────

    /// Lists registry entries, by default only alive ones.
    ///
    /// Lock-free: reads a fresh snapshot and accepts it may already be
    /// stale.
    ///
    /// # Errors
    /// Propagates load failures.
    pub fn list_processes(&self, options: ListOptions) -> Result<Vec<ManagedProcess>> {
        let registry = self.store.load()?;
        let mut entries: Vec<ManagedProcess> = registry
            .values()
            .filter(|p| options.include_stopped || p.status.is_alive())
            .filter(|p| options.filter_by_port.is_none_or(|port| p.port == Some(port)))
            .cloned()
            .collect();
        entries.sort_by_key(|p| p.created_at);
        Ok(entries)
    }

    /// Looks up a single entry by ID; `Ok(None)` for unknown IDs.
    ///
    /// # Errors
    /// Propagates load failures.
    pub fn get_process(&self, id: ProcessId) -> Result<Option<ManagedProcess>> {
        let registry = self.store.load()?;
        Ok(registry.get(&id).cloned())
    }

    /// Answers whether starting `command_line` (on `port`, if given) would
    /// duplicate an existing healthy process.
    ///
    /// Read-only and lock-free: meant for pre-flight hooks, which must
    /// never block behind a long-running mutation. The authoritative check
    /// happens again inside [`Self::start_process`].
    ///
    /// # Errors
    /// Propagates load failures.
    pub async fn check_conflict(
        &self,
        command_line: &str,
        port: Option<u16>,
    ) -> Result<ConflictDecision> {
        let registry = self.store.load()?;
        for entry in registry.duplicate_candidates(command_line, port) {
            if !entry.pid_alive() {
                continue;
            }
            if self.probe(entry).await.is_passing() {
                return Ok(ConflictDecision::Block {
                    id: entry.id,
                    command: entry.command_line(),
                });
            }
        }
        Ok(ConflictDecision::Allow)
    }

    /// Evaluates a single entry's health probe right now.
    pub async fn is_healthy(&self, process: &ManagedProcess) -> bool {
        process.status.is_alive()
            && process.pid_alive()
            && self.probe(process).await.is_passing()
    }

    async fn probe(&self, process: &ManagedProcess) -> HealthOutcome {
        if !self.config.health.enabled {
            return HealthOutcome::Skipped;
        }
        match &process.health_check {
            Some(spec) => self.prober.evaluate(&self.effective(spec)).await,
            // No descriptor: PID liveness is the only signal we have
            None => HealthOutcome::Skipped,
        }
    }

    /// Resolves a spec against the configured policy: unset fields take
    /// the policy's values.
    fn effective(&self, spec: &HealthCheckSpec) -> HealthCheckSpec {
        let policy = &self.config.health;
        let mut spec = spec.clone();
        spec.timeout = spec.timeout.or(Some(policy.timeout));
        spec.interval = spec.interval.or(Some(policy.interval));
        spec.retries = spec.retries.or(Some(policy.retries));
        spec
    }

    // ───────────────────────────────────────────────────────────────────
    // Adoption
    // ───────────────────────────────────────────────────────────────────

    /// Inserts an adopted entry into the registry.
    ///
    /// Re-validates that the PID is still alive inside the critical
    /// section, since discovery and adoption are separated in time.
    ///
    /// # Errors
    /// [`VigilError::Adoption`] when the process died in the meantime, its
    /// PID is already managed, or its port is already claimed by a live
    /// entry.
    pub async fn adopt_process(&self, process: ManagedProcess) -> Result<ManagedProcess> {
        let mut lock = self.lock();
        lock.acquire().await?;
        let result = self.adopt_locked(process);
        Self::release(&mut lock);
        result
    }

    fn adopt_locked(&self, mut process: ManagedProcess) -> Result<ManagedProcess> {
        if !process.pid_alive() {
            return Err(VigilError::adoption(format!(
                "pid {} exited before adoption completed",
                process.pid
            )));
        }
        let mut registry = self.store.load()?;
        if let Some(existing) = registry.values().find(|p| {
            p.status.is_alive() && p.pid == process.pid
        }) {
            return Err(VigilError::adoption(format!(
                "pid {} is already managed as {}",
                process.pid, existing.id
            )));
        }
        // At most one running entry may claim a port; adoption is not
        // allowed to introduce a second claimant.
        if let Some(port) = process.port {
            if let Some(existing) = registry
                .values()
                .find(|p| p.status.is_alive() && p.port == Some(port) && p.pid_alive())
            {
                return Err(VigilError::adoption(format!(
                    "port {port} is already claimed by {} (pid {})",
                    existing.id, existing.pid
                )));
            }
        }
        process.touch();
        tracing::info!(id = %process.id, pid = process.pid, "adopted process");
        registry.insert(process.clone());
        self.store.save(&registry)?;
        Ok(process)
    }

    // ───────────────────────────────────────────────────────────────────
    // Cleanup
    // ───────────────────────────────────────────────────────────────────

    /// Removes dead and terminal entries; with `force`, terminates and
    /// removes live ones too.
    ///
    /// Health probes for live entries run concurrently before the verdicts
    /// are applied, so a slow endpoint does not serialize the sweep.
    /// Entries verified within their evaluation interval are skipped; a
    /// passing probe upgrades an unhealthy entry back to running.
    ///
    /// # Errors
    /// Lock and persistence failures. Individual termination failures are
    /// logged and the entry is skipped, not fatal to the pass.
    pub async fn cleanup_processes(&self, force: bool) -> Result<CleanupReport> {
        let mut lock = self.lock();
        lock.acquire().await?;
        let result = self.cleanup_locked(force).await;
        Self::release(&mut lock);
        result
    }

    async fn cleanup_locked(&self, force: bool) -> Result<CleanupReport> {
        let mut registry = self.store.load()?;
        let mut report = CleanupReport::default();

        // Concurrent health sweep over live entries with a descriptor.
        // Entries verified within their evaluation interval are not
        // re-probed; the sweep is periodic, not a fresh audit like start.
        let now = now_epoch_ms();
        let mut probes: JoinSet<(ProcessId, HealthOutcome)> = JoinSet::new();
        for entry in registry.values() {
            if entry.status.is_alive() && entry.pid_alive() {
                if let Some(spec) = entry.health_check.as_ref() {
                    if self.config.health.enabled {
                        let spec = self.effective(spec);
                        let interval_ms =
                            spec.interval.map_or(0, |d| d.as_millis() as u64);
                        if now.saturating_sub(entry.last_seen_at) < interval_ms {
                            tracing::debug!(id = %entry.id, "verified recently, skipping probe");
                            continue;
                        }
                        let id = entry.id;
                        let prober = self.prober;
                        probes.spawn(async move { (id, prober.evaluate(&spec).await) });
                    }
                }
            }
        }
        let mut verdicts: HashMap<ProcessId, HealthOutcome> = HashMap::new();
        while let Some(joined) = probes.join_next().await {
            if let Ok((id, outcome)) = joined {
                verdicts.insert(id, outcome);
            }
        }

        let ids: Vec<ProcessId> = registry.values().map(|p| p.id).collect();
        for id in ids {
            let Some(entry) = registry.get_mut(&id) else {
                continue;
            };

            if entry.status.is_terminal() || !entry.pid_alive() {
                registry.remove(&id);
                report.removed.push(id);
                continue;
            }

            match verdicts.get(&id) {
                Some(HealthOutcome::Failed { reason }) => {
                    tracing::warn!(id = %id, reason = %reason, "live entry failed health sweep");
                    entry.set_status(ProcessStatus::Unhealthy);
                }
                Some(HealthOutcome::Passed) => {
                    if entry.status == ProcessStatus::Unhealthy {
                        tracing::info!(id = %id, "entry recovered, upgrading to running");
                        entry.set_status(ProcessStatus::Running);
                    }
                    entry.touch();
                }
                _ => {}
            }

            if force {
                match vigil_platform::terminate(entry.pid, self.config.stop_grace, true).await
                {
                    Ok(_) => {
                        registry.remove(&id);
                        report.removed.push(id);
                    }
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "forced cleanup could not terminate");
                        report.skipped.push(id);
                    }
                }
            } else {
                report.skipped.push(id);
            }
        }

        tracing::info!(
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            force,
            "cleanup pass complete"
        );
        self.store.save(&registry)?;
        Ok(report)
    }

    /// A release failure must not clobber the operation's own result; the
    /// lock's staleness reclaim covers the leftover file.
    fn release(lock: &mut FileLock) {
        if let Err(e) = lock.release() {
            tracing::warn!(path = %lock.path().display(), error = %e, "lock release failed");
        }
    }
}
