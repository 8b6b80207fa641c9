// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-state
//!
//! Atomic document persistence for the Vigil process registry.
//!
//! [`JsonStore`] persists any serde-able document with no partial-write
//! visibility: saves go to a temporary sibling file which is fsynced and then
//! renamed into place, so a concurrent reader observes either the old or the
//! new complete content, never a torn write.
//!
//! The store enforces no cross-invocation ordering of its own; callers are
//! expected to hold the registry lock (see `vigil-lock`) around any
//! load-mutate-save cycle.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil_state::JsonStore;
//! use std::collections::HashMap;
//!
//! # fn example() -> Result<(), vigil_state::StateError> {
//! let store: JsonStore<HashMap<String, u32>> = JsonStore::new("/tmp/vigil/registry.json");
//! let mut doc = store.load()?; // empty map on first run
//! doc.insert("answer".to_string(), 42);
//! store.save(&doc)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod store;

pub use error::{StateError, StateResult};
pub use store::JsonStore;
