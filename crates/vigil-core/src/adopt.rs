//! Adoption of pre-existing, unmanaged server processes.

use std::sync::Arc;

use vigil_platform::ProcessSnapshot;
use vigil_ports::PortScanner;

use crate::error::{Result, VigilError};
use crate::types::{AdoptionInfo, ManagedProcess};

/// Command-line fragments that identify a development server.
///
/// Matched against the normalized command line; first hit wins. The list is
/// deliberately conservative: adoption imports a live process into
/// supervision, so a false positive is worse than a miss.
const DEV_SERVER_PATTERNS: &[&str] = &[
    "npm run dev",
    "npm run start",
    "npm start",
    "yarn dev",
    "yarn start",
    "pnpm dev",
    "pnpm start",
    "vite",
    "next dev",
    "next start",
    "nuxt dev",
    "webpack serve",
    "webpack-dev-server",
    "ng serve",
    "node server",
    "nodemon",
    "http.server",
    "flask run",
    "manage.py runserver",
    "uvicorn",
    "gunicorn",
    "hypercorn",
    "rails server",
    "rails s",
    "php -S",
    "php artisan serve",
    "cargo watch",
    "cargo run",
    "air",
    "hugo server",
    "jekyll serve",
    "mkdocs serve",
    "live-server",
    "serve",
];

/// Interpreters whose script argument marks a plausible server process.
const INTERPRETERS: &[&str] = &["node", "python", "python3", "ruby", "php", "deno", "bun"];

/// Command-line flags that reveal a listening intent even when the command
/// itself is unrecognized.
const LISTEN_FLAGS: &[&str] = &["--port", "-p", "--listen", "--host", "0.0.0.0"];

/// Discovers and imports server processes that are not under management.
pub struct ProcessAdopter {
    scanner: Arc<dyn PortScanner>,
}

impl std::fmt::Debug for ProcessAdopter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessAdopter").finish_non_exhaustive()
    }
}

impl ProcessAdopter {
    /// Creates an adopter over the given scanner.
    #[must_use]
    pub fn new(scanner: Arc<dyn PortScanner>) -> Self {
        Self { scanner }
    }

    /// Sweeps the port range and classifies every listener as an adoption
    /// candidate.
    ///
    /// Listeners whose owner cannot be resolved still appear in the result,
    /// marked unsuitable, so callers can report them.
    ///
    /// # Errors
    /// Propagates range validation and enumeration failures from the
    /// scanner.
    pub async fn discover(&self, start: u16, end: u16) -> Result<Vec<AdoptionInfo>> {
        let listeners = self.scanner.scan_range(start, end).await?;
        let mut candidates = Vec::with_capacity(listeners.len());
        for info in listeners {
            let Some(pid) = info.pid else {
                candidates.push(AdoptionInfo {
                    pid: 0,
                    command: String::new(),
                    port: Some(info.port),
                    working_dir: None,
                    process_name: info.process_name.unwrap_or_default(),
                    suitable: false,
                    reason: format!("owner of port {} could not be resolved", info.port),
                });
                continue;
            };
            // The listener can exit between the scan and the snapshot
            let Some(snap) = vigil_platform::snapshot(pid) else {
                continue;
            };
            candidates.push(classify(&snap, Some(info.port)));
        }
        tracing::debug!(
            start = start,
            end = end,
            candidates = candidates.len(),
            "adoption discovery complete"
        );
        Ok(candidates)
    }

    /// Builds a registry entry for a live process identified by PID.
    ///
    /// The returned entry is not persisted; the manager inserts it inside
    /// its own critical section.
    ///
    /// # Errors
    /// [`VigilError::Adoption`] when the PID does not exist.
    pub async fn adopt_by_pid(&self, pid: u32) -> Result<ManagedProcess> {
        let snap = vigil_platform::snapshot(pid)
            .ok_or_else(|| VigilError::adoption(format!("no process with pid {pid}")))?;
        let port = self.owned_port(pid).await?;
        Ok(entry_from_snapshot(&snap, port))
    }

    /// Builds a registry entry for whatever process owns the given port.
    ///
    /// # Errors
    /// [`VigilError::Adoption`] when the port is free or its owner cannot be
    /// identified.
    pub async fn adopt_by_port(&self, port: u16) -> Result<ManagedProcess> {
        let info = self
            .scanner
            .port_info(port)
            .await?
            .ok_or_else(|| VigilError::adoption(format!("port {port} is not in use")))?;
        let pid = info.pid.ok_or_else(|| {
            VigilError::adoption(format!("owner of port {port} could not be identified"))
        })?;
        let snap = vigil_platform::snapshot(pid).ok_or_else(|| {
            VigilError::adoption(format!("owner of port {port} (pid {pid}) already exited"))
        })?;
        Ok(entry_from_snapshot(&snap, Some(port)))
    }

    /// First listening port owned by `pid`, if any.
    async fn owned_port(&self, pid: u32) -> Result<Option<u16>> {
        let listeners = self.scanner.listening_ports().await?;
        Ok(listeners
            .into_iter()
            .filter(|info| info.pid == Some(pid))
            .map(|info| info.port)
            .min())
    }
}

fn entry_from_snapshot(snap: &ProcessSnapshot, port: Option<u16>) -> ManagedProcess {
    let (command, args) = match snap.command.split_first() {
        Some((head, tail)) => (head.clone(), tail.to_vec()),
        // Kernel threads and zombies expose no command line
        None => (snap.name.clone(), Vec::new()),
    };
    let mut process = ManagedProcess::new(command, args, snap.pid);
    process.port = port;
    process.working_dir = snap.cwd.clone();
    process
}

/// Classifies a process snapshot as an adoption candidate.
fn classify(snap: &ProcessSnapshot, port: Option<u16>) -> AdoptionInfo {
    let command_line = snap.command_line();
    let (suitable, reason) = judge(&command_line, &snap.name);
    AdoptionInfo {
        pid: snap.pid,
        command: command_line,
        port,
        working_dir: snap.cwd.clone(),
        process_name: snap.name.clone(),
        suitable,
        reason,
    }
}

fn judge(command_line: &str, name: &str) -> (bool, String) {
    if command_line.is_empty() {
        return (false, "process exposes no command line".to_string());
    }

    let normalized = crate::types::normalize_command(command_line);
    for pattern in DEV_SERVER_PATTERNS {
        if normalized.contains(pattern) {
            return (true, format!("matches known server pattern '{pattern}'"));
        }
    }

    let words: Vec<&str> = normalized.split(' ').collect();
    let program = words
        .first()
        .map(|p| p.rsplit('/').next().unwrap_or(p))
        .unwrap_or(name);
    if INTERPRETERS.contains(&program)
        && words.iter().skip(1).any(|w| {
            w.ends_with(".js")
                || w.ends_with(".mjs")
                || w.ends_with(".ts")
                || w.ends_with(".py")
                || w.ends_with(".rb")
                || w.ends_with(".php")
        })
    {
        return (true, format!("{program} running a server script"));
    }

    if LISTEN_FLAGS.iter().any(|flag| words.contains(flag)) {
        return (true, "command line carries an explicit listen flag".to_string());
    }

    (
        false,
        "does not look like a development server".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vigil_ports::{PortError, PortInfo};

    /// Deterministic scanner returning a fixed listener table.
    struct FixedScanner {
        listeners: Vec<PortInfo>,
    }

    #[async_trait]
    impl PortScanner for FixedScanner {
        async fn is_port_in_use(&self, port: u16) -> bool {
            self.listeners.iter().any(|info| info.port == port)
        }

        async fn port_info(
            &self,
            port: u16,
        ) -> std::result::Result<Option<PortInfo>, PortError> {
            Ok(self
                .listeners
                .iter()
                .find(|info| info.port == port)
                .cloned())
        }

        async fn scan_range(
            &self,
            start: u16,
            end: u16,
        ) -> std::result::Result<Vec<PortInfo>, PortError> {
            if start > end {
                return Err(PortError::InvalidRange { start, end });
            }
            Ok(self
                .listeners
                .iter()
                .filter(|info| info.port >= start && info.port <= end)
                .cloned()
                .collect())
        }

        async fn find_available_port(&self, start: u16) -> std::result::Result<u16, PortError> {
            (start..=u16::MAX)
                .find(|p| !self.listeners.iter().any(|info| info.port == *p))
                .ok_or(PortError::Exhausted(start))
        }

        async fn listening_ports(&self) -> std::result::Result<Vec<PortInfo>, PortError> {
            Ok(self.listeners.clone())
        }
    }

    fn snap(command: &[&str]) -> ProcessSnapshot {
        ProcessSnapshot {
            pid: 4242,
            name: command
                .first()
                .map(|c| c.rsplit('/').next().unwrap_or(c))
                .unwrap_or("")
                .to_string(),
            command: command.iter().map(|s| (*s).to_string()).collect(),
            cwd: Some("/srv/app".into()),
        }
    }

    #[test]
    fn test_classify_known_patterns() {
        for command in [
            vec!["npm", "run", "dev"],
            vec!["python3", "-m", "http.server", "8000"],
            vec!["/usr/bin/uvicorn", "app:main"],
            vec!["bundle", "exec", "rails", "server"],
        ] {
            let info = classify(&snap(&command), Some(3000));
            assert!(info.suitable, "expected suitable: {command:?}");
        }
    }

    #[test]
    fn test_classify_interpreter_with_script() {
        let info = classify(&snap(&["node", "server.js"]), Some(3000));
        assert!(info.suitable);
        assert!(info.reason.contains("node"));
    }

    #[test]
    fn test_classify_listen_flag() {
        let info = classify(&snap(&["my-custom-server", "--port", "8080"]), Some(8080));
        assert!(info.suitable);
    }

    #[test]
    fn test_classify_unrelated_process() {
        let info = classify(&snap(&["bash"]), None);
        assert!(!info.suitable);
    }

    #[test]
    fn test_classify_empty_command_line() {
        let info = classify(&snap(&[]), Some(5000));
        assert!(!info.suitable);
        assert!(info.reason.contains("command line"));
    }

    #[tokio::test]
    async fn test_discover_reports_unresolved_owner() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner {
            listeners: vec![PortInfo::unresolved(3000)],
        }));
        let candidates = adopter.discover(3000, 4000).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(!candidates[0].suitable);
        assert!(candidates[0].reason.contains("could not be resolved"));
    }

    #[tokio::test]
    async fn test_discover_skips_exited_listener() {
        // The scanner reports a pid that no longer exists
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner {
            listeners: vec![PortInfo::owned(3000, u32::MAX - 1, "gone")],
        }));
        let candidates = adopter.discover(3000, 4000).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_adopt_by_pid_self() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner { listeners: vec![] }));
        let process = adopter.adopt_by_pid(std::process::id()).await.unwrap();
        assert_eq!(process.pid, std::process::id());
        assert!(!process.command.is_empty());
        assert!(process.pid_alive());
    }

    #[tokio::test]
    async fn test_adopt_by_pid_nonexistent() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner { listeners: vec![] }));
        let err = adopter.adopt_by_pid(u32::MAX - 1).await.unwrap_err();
        assert!(matches!(err, VigilError::Adoption(_)));
    }

    #[tokio::test]
    async fn test_adopt_by_port_free_port_fails() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner { listeners: vec![] }));
        let err = adopter.adopt_by_port(3000).await.unwrap_err();
        assert!(err.to_string().contains("not in use"));
    }

    #[tokio::test]
    async fn test_adopt_by_port_unresolved_owner_fails() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner {
            listeners: vec![PortInfo::unresolved(3000)],
        }));
        let err = adopter.adopt_by_port(3000).await.unwrap_err();
        assert!(err.to_string().contains("could not be identified"));
    }

    #[tokio::test]
    async fn test_adopt_by_port_self() {
        let adopter = ProcessAdopter::new(Arc::new(FixedScanner {
            listeners: vec![PortInfo::owned(3000, std::process::id(), "self")],
        }));
        let process = adopter.adopt_by_port(3000).await.unwrap();
        assert_eq!(process.pid, std::process::id());
        assert_eq!(process.port, Some(3000));
    }
}
