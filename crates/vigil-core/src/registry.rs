//! The persisted registry of managed processes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_state::{JsonStore, StateError};

use crate::error::Result;
use crate::types::{ManagedProcess, ProcessId, normalize_command};

// ═══════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory registry: the unit of persistence.
///
/// Keyed by [`ProcessId`]; serialized as a single JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// All known entries, including stopped ones awaiting cleanup.
    #[serde(default)]
    pub processes: HashMap<ProcessId, ManagedProcess>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, replacing any previous entry with the same ID.
    pub fn insert(&mut self, process: ManagedProcess) {
        self.processes.insert(process.id, process);
    }

    /// Removes an entry.
    pub fn remove(&mut self, id: &ProcessId) -> Option<ManagedProcess> {
        self.processes.remove(id)
    }

    /// Looks up an entry by ID.
    #[must_use]
    pub fn get(&self, id: &ProcessId) -> Option<&ManagedProcess> {
        self.processes.get(id)
    }

    /// Mutable lookup by ID.
    pub fn get_mut(&mut self, id: &ProcessId) -> Option<&mut ManagedProcess> {
        self.processes.get_mut(id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Iterates over all entries.
    pub fn values(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.processes.values()
    }

    /// Mutable iteration over all entries.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut ManagedProcess> {
        self.processes.values_mut()
    }

    /// Alive entries matching the candidate command line or port, newest
    /// first.
    ///
    /// A port match alone counts: two different commands fighting over one
    /// port are duplicates for our purposes. Newest-first ordering decides
    /// which survivor wins when several entries match.
    #[must_use]
    pub fn duplicate_candidates(
        &self,
        command_line: &str,
        port: Option<u16>,
    ) -> Vec<&ManagedProcess> {
        let normalized = normalize_command(command_line);
        let mut candidates: Vec<&ManagedProcess> = self
            .processes
            .values()
            .filter(|p| p.status.is_alive())
            .filter(|p| {
                normalize_command(&p.command_line()) == normalized
                    || (port.is_some() && p.port == port)
            })
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        candidates
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RegistryStore
// ═══════════════════════════════════════════════════════════════════════════

/// Durable registry storage with corruption tolerance.
///
/// A corrupt registry file is logged and treated as empty rather than
/// bricking every operation; the next save rewrites it whole.
#[derive(Debug)]
pub struct RegistryStore {
    store: JsonStore<Registry>,
}

impl RegistryStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    /// Loads the registry; a missing file yields an empty registry.
    ///
    /// # Errors
    /// Propagates I/O failures other than file-not-found. Corruption is
    /// downgraded to an empty registry with a warning.
    pub fn load(&self) -> Result<Registry> {
        match self.store.load() {
            Ok(registry) => Ok(registry),
            Err(StateError::Corrupt { path, reason }) => {
                tracing::warn!(
                    path = %path.display(),
                    reason = %reason,
                    "registry file is corrupt, starting from an empty registry"
                );
                Ok(Registry::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persists the registry atomically.
    ///
    /// # Errors
    /// Propagates serialization and I/O failures from the underlying store.
    pub fn save(&self, registry: &Registry) -> Result<()> {
        self.store.save(registry)?;
        Ok(())
    }

    /// Removes one entry and persists the result.
    ///
    /// # Errors
    /// Propagates load/save failures. Removing an absent ID is a no-op.
    pub fn delete(&self, id: &ProcessId) -> Result<Option<ManagedProcess>> {
        let mut registry = self.load()?;
        let removed = registry.remove(id);
        if removed.is_some() {
            self.save(&registry)?;
        }
        Ok(removed)
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.path()
    }
}
