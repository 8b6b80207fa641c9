//! Manager configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

// ═══════════════════════════════════════════════════════════════════════════
// ManagerConfig
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level configuration for a [`crate::ProcessManager`].
///
/// All durations accept humantime strings in TOML (`"5s"`, `"2m"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Path of the persisted registry file.
    pub state_path: PathBuf,
    /// Path of the advisory lock file guarding mutations.
    pub lock_path: PathBuf,
    /// Lock acquisition parameters.
    pub lock: vigil_lock::LockConfig,
    /// Grace period between SIGTERM and SIGKILL when stopping a process.
    #[serde(with = "humantime_serde")]
    pub stop_grace: Duration,
    /// Port range used by discovery.
    pub scan: ScanConfig,
    /// Health evaluation defaults.
    pub health: HealthPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("vigil"))
    }
}

impl ManagerConfig {
    /// Configuration rooted at `base_dir`: registry and lock files live
    /// inside it.
    #[must_use]
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        Self {
            state_path: base.join("registry.json"),
            lock_path: base.join("registry.lock"),
            lock: vigil_lock::LockConfig::default(),
            stop_grace: Duration::from_secs(5),
            scan: ScanConfig::default(),
            health: HealthPolicy::default(),
        }
    }

    /// Sets the registry file path.
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Sets the lock file path.
    #[must_use]
    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    /// Sets the stop grace period.
    #[must_use]
    pub const fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Sets the discovery port range.
    #[must_use]
    pub const fn with_scan_range(mut self, start: u16, end: u16) -> Self {
        self.scan = ScanConfig { start, end };
        self
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`VigilError::Config`] when the file cannot be read or
    /// parsed, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VigilError::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| VigilError::config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`VigilError::Config`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.scan.start > self.scan.end {
            return Err(VigilError::config(format!(
                "scan range start {} exceeds end {}",
                self.scan.start, self.scan.end
            )));
        }
        if self.scan.start == 0 {
            return Err(VigilError::config("scan range cannot start at port 0"));
        }
        if self.stop_grace.is_zero() {
            return Err(VigilError::config("stop grace period cannot be zero"));
        }
        if self.health.timeout.is_zero() {
            return Err(VigilError::config("health timeout cannot be zero"));
        }
        Ok(())
    }
}

/// Inclusive port range swept by discovery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// First port of the range.
    pub start: u16,
    /// Last port of the range.
    pub end: u16,
}

impl Default for ScanConfig {
    fn default() -> Self {
        // The range common development servers pick by default
        Self {
            start: 3000,
            end: 9000,
        }
    }
}

/// Fallback values for health descriptors that leave fields unset.
///
/// A [`crate::HealthCheckSpec`] may override any of these per process; the
/// manager resolves the spec against this policy before every probe, and
/// `interval` gates how often the cleanup sweep re-probes an entry that was
/// verified recently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Master switch; disabled means all probes report skipped.
    pub enabled: bool,
    /// Default per-attempt timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Default interval between periodic evaluations.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Default retry count.
    pub retries: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            retries: 3,
        }
    }
}

/// Serde adapter for humantime duration strings.
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// The same adapter for `Option<Duration>` fields.
    pub mod opt {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => {
                    serializer.serialize_str(&humantime::format_duration(*d).to_string())
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
