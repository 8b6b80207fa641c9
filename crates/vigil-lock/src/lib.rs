// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-lock
//!
//! File-based mutual exclusion for independent OS-level invocations.
//!
//! Vigil invocations share no memory: the only way two `vigil` commands can
//! coordinate is through the filesystem. This crate implements that channel
//! as an exclusively-created lock file holding a [`LockRecord`] (holder PID,
//! acquisition timestamp, instance token). Atomic exclusive creation is the
//! one portable primitive that proves ownership; everything else is built on
//! top of it.
//!
//! Crashed holders are recovered through staleness: a record whose PID is no
//! longer alive, whose age exceeds the configured bound, or which cannot be
//! parsed is reclaimable by the next acquirer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil_lock::{FileLock, LockConfig};
//!
//! # async fn example() -> Result<(), vigil_lock::LockError> {
//! let mut lock = FileLock::new("/tmp/vigil/registry.lock", LockConfig::default());
//! lock.acquire().await?;
//! // ... load, mutate, save the registry ...
//! lock.release()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod lock;
mod record;

pub use config::LockConfig;
pub use error::{LockError, LockResult};
pub use lock::{FileLock, LockInfo};
pub use record::{LockRecord, StaleReason};
