//! Vigil: duplicate-aware supervision for development servers.
//!
//! One registry, shared by every invocation on the machine, answers the
//! question "is this server already running?" before anything is spawned.
//! The workspace splits the problem into focused crates, re-exported here:
//!
//! - [`core`] — the [`ProcessManager`](vigil_core::ProcessManager) and its
//!   registry, duplicate detection, adoption and health evaluation
//! - [`lock`] — the cross-process file lock guarding registry mutations
//! - [`state`] — atomic JSON persistence
//! - [`ports`] — port scanning and owner resolution
//! - [`platform`] — OS process probing and termination
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vigil::prelude::*;
//!
//! # async fn example() -> vigil::core::Result<()> {
//! let manager = ProcessManager::new(ManagerConfig::default())?;
//!
//! let outcome = manager
//!     .start_process(StartOptions::from_command_line("npm run dev")?.with_port(3000))
//!     .await?;
//!
//! match outcome.reused {
//!     true => println!("reusing {} (pid {})", outcome.process.id, outcome.process.pid),
//!     false => println!("started {} (pid {})", outcome.process.id, outcome.process.pid),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use vigil_core as core;
pub use vigil_lock as lock;
pub use vigil_platform as platform;
pub use vigil_ports as ports;
pub use vigil_state as state;

/// Prelude module for common imports.
pub mod prelude {
    pub use vigil_core::{
        AdoptionInfo, CleanupReport, ConflictDecision, HealthCheckKind, HealthCheckSpec,
        HealthOutcome, HealthProber, ListOptions, ManagedProcess, ManagerConfig,
        ProcessAdopter, ProcessId, ProcessManager, ProcessStatus, StartOptions, StartOutcome,
    };
    pub use vigil_lock::{FileLock, LockConfig};
    pub use vigil_ports::{PortInfo, PortScanner, SystemScanner};
}

/// Installs a `tracing` subscriber reading the `VIGIL_LOG` environment
/// variable, falling back to `info`.
///
/// Call once at startup; a second call is a no-op rather than an error.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("VIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
