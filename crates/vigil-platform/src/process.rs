//! Process table snapshots via sysinfo.

use std::path::PathBuf;

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Point-in-time view of one OS process.
///
/// Everything here is best-effort: the process may exit between the snapshot
/// and any use of it, and fields the OS refuses to reveal are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    /// OS process ID.
    pub pid: u32,
    /// Short process name (executable basename).
    pub name: String,
    /// Full command line, one element per argument.
    pub command: Vec<String>,
    /// Working directory, when the OS exposes it.
    pub cwd: Option<PathBuf>,
}

impl ProcessSnapshot {
    /// Returns the command line joined into a single string.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

fn from_sysinfo(pid: Pid, process: &sysinfo::Process) -> ProcessSnapshot {
    ProcessSnapshot {
        pid: pid.as_u32(),
        name: process.name().to_string_lossy().into_owned(),
        command: process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect(),
        cwd: process.cwd().map(PathBuf::from),
    }
}

/// Takes a snapshot of a single process, or `None` if it does not exist.
#[must_use]
pub fn snapshot(pid: u32) -> Option<ProcessSnapshot> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    system
        .process(Pid::from_u32(pid))
        .map(|process| from_sysinfo(Pid::from_u32(pid), process))
}

/// Takes a snapshot of the whole process table.
#[must_use]
pub fn list_processes() -> Vec<ProcessSnapshot> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes()
        .iter()
        .map(|(pid, process)| from_sysinfo(*pid, process))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_self() {
        let snap = snapshot(std::process::id()).expect("current process must be visible");
        assert_eq!(snap.pid, std::process::id());
        assert!(!snap.name.is_empty());
    }

    #[test]
    fn test_snapshot_nonexistent() {
        assert!(snapshot(u32::MAX - 1).is_none());
    }

    #[test]
    fn test_list_processes_contains_self() {
        let all = list_processes();
        assert!(all.iter().any(|p| p.pid == std::process::id()));
    }

    #[test]
    fn test_command_line_join() {
        let snap = ProcessSnapshot {
            pid: 1,
            name: "python".to_string(),
            command: vec![
                "python".to_string(),
                "-m".to_string(),
                "http.server".to_string(),
            ],
            cwd: None,
        };
        assert_eq!(snap.command_line(), "python -m http.server");
    }
}
