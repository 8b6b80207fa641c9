//! Lock acquisition configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for [`crate::FileLock`] acquisition and staleness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Total deadline for acquisition before giving up.
    #[serde(default = "default_timeout")]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Sleep between acquisition attempts while the lock is validly held.
    #[serde(default = "default_retry_interval")]
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Age past which a record is reclaimable even if its holder PID is alive.
    ///
    /// Covers PID-reuse: a recycled PID can make a crashed holder look alive
    /// forever, so age bounds the damage.
    #[serde(default = "default_stale_age")]
    #[serde(with = "humantime_serde")]
    pub stale_age: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_stale_age() -> Duration {
    Duration::from_secs(300)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry_interval: default_retry_interval(),
            stale_age: default_stale_age(),
        }
    }
}

impl LockConfig {
    /// Sets the acquisition deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry interval.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the staleness age bound.
    #[must_use]
    pub const fn with_stale_age(mut self, age: Duration) -> Self {
        self.stale_age = age;
        self
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
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
}
