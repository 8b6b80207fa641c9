// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-core
//!
//! The supervising core of Vigil: a durable registry of managed development
//! server processes with duplicate detection across independent invocations.
//!
//! The pieces compose as described in the crate graph:
//!
//! - [`ProcessManager`] — orchestrator: start/stop/list/adopt/cleanup plus
//!   the conflict-query surface used by automation hooks
//! - [`ProcessAdopter`] — discovery and import of pre-existing, unmanaged
//!   server processes
//! - [`HealthProber`] — HTTP / TCP / command health evaluation
//! - [`Registry`] / [`RegistryStore`] — the persisted data model
//!
//! Every mutating operation runs as one critical section over the shared
//! lock file: acquire → load → mutate → save → release. Read-only
//! operations reload a fresh snapshot and tolerate staleness by design.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil_core::{ManagerConfig, ProcessManager, StartOptions};
//!
//! # async fn example() -> vigil_core::Result<()> {
//! let manager = ProcessManager::new(ManagerConfig::default())?;
//!
//! let outcome = manager
//!     .start_process(StartOptions::from_command_line("python -m http.server 8000")?.with_port(8000))
//!     .await?;
//!
//! if outcome.reused {
//!     println!("already running as {}", outcome.process.id);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adopt;
pub mod config;
pub mod error;
pub mod health;
pub mod manager;
pub mod registry;
pub mod types;

pub use adopt::ProcessAdopter;
pub use config::{HealthPolicy, ManagerConfig, ScanConfig};
pub use error::{Result, VigilError};
pub use health::{HealthOutcome, HealthProber};
pub use manager::{CleanupReport, ListOptions, ProcessManager, StartOptions, StartOutcome};
pub use registry::{Registry, RegistryStore};
pub use types::{
    AdoptionInfo, ConflictDecision, HealthCheckKind, HealthCheckSpec, ManagedProcess, ProcessId,
    ProcessStatus,
};
