//! On-disk lock record format and staleness evaluation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::{LockError, LockResult};

/// The contents of a lock file: one holder, identified by (PID, token).
///
/// The instance token distinguishes handles that might coincidentally share
/// a PID through pathological reuse; an on-disk record represents ownership
/// by exactly one (PID, token) pair until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    /// PID of the holding process.
    pub pid: u32,
    /// Acquisition time, Unix seconds.
    pub acquired_at: u64,
    /// Instance token of the holding handle.
    pub token: Uuid,
}

/// Why an existing lock record is considered reclaimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The recorded PID does not correspond to a live process.
    DeadHolder,
    /// The record's age exceeds the configured staleness bound.
    ExpiredAge,
    /// The record could not be parsed.
    Malformed,
}

impl LockRecord {
    /// Creates a record for the current process with a fresh timestamp.
    #[must_use]
    pub fn for_current_process(token: Uuid) -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: now_epoch_secs(),
            token,
        }
    }

    /// Encodes the record as the wire format: PID, timestamp, and token,
    /// each on its own line.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}\n{}\n{}\n", self.pid, self.acquired_at, self.token)
    }

    /// Parses a record from the wire format.
    ///
    /// # Errors
    /// Returns [`LockError::InvalidRecord`] for missing or malformed fields.
    /// Acquisition treats this as staleness rather than a failure.
    pub fn parse(content: &str) -> LockResult<Self> {
        let mut lines = content.lines();

        let pid = lines
            .next()
            .ok_or_else(|| LockError::invalid_record("missing pid line"))?
            .trim()
            .parse::<u32>()
            .map_err(|e| LockError::invalid_record(format!("bad pid: {e}")))?;

        let acquired_at = lines
            .next()
            .ok_or_else(|| LockError::invalid_record("missing timestamp line"))?
            .trim()
            .parse::<u64>()
            .map_err(|e| LockError::invalid_record(format!("bad timestamp: {e}")))?;

        let token = lines
            .next()
            .ok_or_else(|| LockError::invalid_record("missing token line"))?
            .trim()
            .parse::<Uuid>()
            .map_err(|e| LockError::invalid_record(format!("bad token: {e}")))?;

        Ok(Self {
            pid,
            acquired_at,
            token,
        })
    }

    /// Evaluates staleness against the given age bound.
    ///
    /// A dead holder is always stale, regardless of how fresh the timestamp
    /// looks. Age expiry applies even to live PIDs (PID reuse defense).
    #[must_use]
    pub fn staleness(&self, stale_age: Duration) -> Option<StaleReason> {
        if !vigil_platform::pid_alive(self.pid) {
            return Some(StaleReason::DeadHolder);
        }
        let age = now_epoch_secs().saturating_sub(self.acquired_at);
        if age > stale_age.as_secs() {
            return Some(StaleReason::ExpiredAge);
        }
        None
    }
}

/// Current time as Unix seconds.
#[must_use]
pub(crate) fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
