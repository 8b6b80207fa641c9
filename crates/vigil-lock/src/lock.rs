//! The file lock itself.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::record::{LockRecord, StaleReason};

/// Parsed view of an existing lock file, for inspection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockInfo {
    /// The on-disk record.
    pub record: LockRecord,
    /// Staleness verdict at the time of inspection.
    pub stale: Option<StaleReason>,
}

/// Mutual exclusion over a shared file, across OS-level invocations.
///
/// Exclusive file creation (`O_CREAT | O_EXCL`) is the proof of ownership:
/// exactly one of any number of racing acquirers wins each round. Every
/// handle carries a fresh instance token so that a release by anyone other
/// than the current owner is refused even under PID reuse.
///
/// Acquisition is re-entrant per handle: calling [`FileLock::acquire`] while
/// already holding is a no-op success, not a deadlock.
pub struct FileLock {
    path: PathBuf,
    token: Uuid,
    held: bool,
    config: LockConfig,
}

impl FileLock {
    /// Creates a handle for the given lock file path. Does not acquire.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: LockConfig) -> Self {
        Self {
            path: path.into(),
            token: Uuid::new_v4(),
            held: false,
            config,
        }
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// This handle's instance token.
    #[must_use]
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Reports whether *this handle* holds the lock.
    ///
    /// This is deliberately local state: whether some other process holds
    /// the file can only be answered by inspecting it, see [`Self::info`].
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Acquires the lock, blocking (asynchronously) up to the configured
    /// timeout.
    ///
    /// Existing records are evaluated for staleness on every attempt: a dead
    /// holder PID, an age past the bound, or an unparsable record is
    /// reclaimed by deleting the file and racing on re-creation.
    ///
    /// # Errors
    /// Returns [`LockError::Timeout`] past the deadline, or [`LockError::Io`]
    /// for filesystem failures other than the expected creation race.
    pub async fn acquire(&mut self) -> LockResult<()> {
        if self.held {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + self.config.timeout;

        loop {
            match self.try_create() {
                Ok(()) => {
                    self.held = true;
                    tracing::debug!(path = %self.path.display(), token = %self.token, "lock acquired");
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            // Lost the creation race; decide whether the incumbent is stale.
            match self.read_record() {
                // File vanished between attempts: go straight back to racing.
                None => continue,
                Some(Err(_)) => {
                    tracing::warn!(path = %self.path.display(), "reclaiming malformed lock record");
                    self.remove_quietly();
                    continue;
                }
                Some(Ok(record)) => {
                    if let Some(reason) = record.staleness(self.config.stale_age) {
                        tracing::warn!(
                            path = %self.path.display(),
                            holder_pid = record.pid,
                            reason = ?reason,
                            "reclaiming stale lock"
                        );
                        self.remove_quietly();
                        continue;
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout(self.config.timeout));
            }
            tokio::time::sleep(self.config.retry_interval).await;
        }
    }

    /// Releases the lock.
    ///
    /// # Errors
    /// - [`LockError::NotHeld`] when this handle does not hold the lock or
    ///   the file is already gone.
    /// - [`LockError::NotOwner`] when the on-disk record names a different
    ///   (PID, token) pair; the file is left untouched.
    pub fn release(&mut self) -> LockResult<()> {
        if !self.held {
            return Err(LockError::NotHeld);
        }

        match self.read_record() {
            None => {
                // Someone (force-clear, operator) removed the file from
                // under us; we no longer hold anything.
                self.held = false;
                Err(LockError::NotHeld)
            }
            Some(Err(_)) => {
                // A record we did not write; refuse to touch it.
                tracing::warn!(path = %self.path.display(), "release found a foreign malformed record");
                Err(LockError::NotOwner { holder_pid: 0 })
            }
            Some(Ok(record)) => {
                if record.pid != std::process::id() || record.token != self.token {
                    return Err(LockError::NotOwner {
                        holder_pid: record.pid,
                    });
                }
                std::fs::remove_file(&self.path)?;
                self.held = false;
                tracing::debug!(path = %self.path.display(), token = %self.token, "lock released");
                Ok(())
            }
        }
    }

    /// Parses the on-disk record without affecting ownership.
    ///
    /// Returns `Ok(None)` when no lock file exists.
    ///
    /// # Errors
    /// Returns [`LockError::InvalidRecord`] when the file exists but cannot
    /// be parsed (acquisition treats that same state as reclaimable).
    pub fn info(&self) -> LockResult<Option<LockInfo>> {
        match self.read_record() {
            None => Ok(None),
            Some(Err(e)) => Err(e),
            Some(Ok(record)) => Ok(Some(LockInfo {
                record,
                stale: record.staleness(self.config.stale_age),
            })),
        }
    }

    /// Unconditionally removes the lock file, regardless of ownership.
    ///
    /// Operator escape hatch for manual recovery; normal flows never call
    /// this.
    ///
    /// # Errors
    /// Returns [`LockError::Io`] for filesystem failures other than the file
    /// already being gone.
    pub fn force_clear(&mut self) -> LockResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::warn!(path = %self.path.display(), "lock force-cleared");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.held = false;
        Ok(())
    }

    /// One exclusive-creation attempt; `AlreadyExists` means we lost.
    fn try_create(&self) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        let record = LockRecord::for_current_process(self.token);
        file.write_all(record.encode().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads the record: `None` = no file, `Some(Err)` = unparsable.
    fn read_record(&self) -> Option<LockResult<LockRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Some(LockRecord::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => Some(Err(e.into())),
        }
    }

    fn remove_quietly(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove stale lock");
            }
        }
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("token", &self.token)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::now_epoch_secs;
    use std::sync::Arc;

    fn fast_config() -> LockConfig {
        LockConfig::default()
            .with_timeout(Duration::from_secs(10))
            .with_retry_interval(Duration::from_millis(5))
    }

    fn lock_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("registry.lock")
    }

    #[tokio::test]
    async fn test_acquire_release_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = FileLock::new(lock_path(&dir), fast_config());

        assert!(!lock.is_held());
        lock.acquire().await.unwrap();
        assert!(lock.is_held());
        assert!(lock.path().exists());

        lock.release().unwrap();
        assert!(!lock.is_held());
        assert!(!lock.path().exists());
    }

    #[tokio::test]
    async fn test_reentrant_acquire_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = FileLock::new(lock_path(&dir), fast_config());

        lock.acquire().await.unwrap();
        lock.acquire().await.unwrap();
        assert!(lock.is_held());
        lock.release().unwrap();
    }

    #[tokio::test]
    async fn test_contended_acquire_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let mut holder = FileLock::new(&path, fast_config());
        holder.acquire().await.unwrap();

        let mut waiter = FileLock::new(
            &path,
            fast_config().with_timeout(Duration::from_millis(100)),
        );
        let err = waiter.acquire().await.unwrap_err();
        assert!(matches!(err, LockError::Timeout(_)));
        assert!(!waiter.is_held());

        holder.release().unwrap();
    }

    #[tokio::test]
    async fn test_dead_holder_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        // Forge a record with a fresh timestamp but a dead PID
        let record = LockRecord {
            pid: u32::MAX - 1,
            acquired_at: now_epoch_secs(),
            token: Uuid::new_v4(),
        };
        std::fs::write(&path, record.encode()).unwrap();

        let mut lock = FileLock::new(&path, fast_config());
        lock.acquire().await.unwrap();
        assert!(lock.is_held());
        lock.release().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_record_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, "this is not a lock record").unwrap();

        let mut lock = FileLock::new(&path, fast_config());
        lock.acquire().await.unwrap();
        assert!(lock.is_held());
        lock.release().unwrap();
    }

    #[tokio::test]
    async fn test_expired_live_holder_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        // Live PID (ours) but a timestamp far past the staleness bound
        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: now_epoch_secs() - 3600,
            token: Uuid::new_v4(),
        };
        std::fs::write(&path, record.encode()).unwrap();

        let mut lock = FileLock::new(&path, fast_config().with_stale_age(Duration::from_secs(60)));
        lock.acquire().await.unwrap();
        lock.release().unwrap();
    }

    #[tokio::test]
    async fn test_release_not_held() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = FileLock::new(lock_path(&dir), fast_config());

        let err = lock.release().unwrap_err();
        assert!(matches!(err, LockError::NotHeld));
    }

    #[tokio::test]
    async fn test_release_by_non_owner_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let mut owner = FileLock::new(&path, fast_config());
        owner.acquire().await.unwrap();

        // A second handle that believes it holds the lock (simulates a
        // pathological double-holder) must not be able to release it.
        let mut impostor = FileLock::new(&path, fast_config());
        impostor.held = true;

        let err = impostor.release().unwrap_err();
        assert!(matches!(err, LockError::NotOwner { .. }));
        assert!(path.exists());

        owner.release().unwrap();
    }

    #[tokio::test]
    async fn test_release_after_file_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let mut lock = FileLock::new(&path, fast_config());
        lock.acquire().await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = lock.release().unwrap_err();
        assert!(matches!(err, LockError::NotHeld));
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_info_reports_holder_and_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let observer = FileLock::new(&path, fast_config());
        assert!(observer.info().unwrap().is_none());

        let mut holder = FileLock::new(&path, fast_config());
        holder.acquire().await.unwrap();

        let info = observer.info().unwrap().unwrap();
        assert_eq!(info.record.pid, std::process::id());
        assert_eq!(info.record.token, holder.token());
        assert_eq!(info.stale, None);

        holder.release().unwrap();
    }

    #[tokio::test]
    async fn test_info_malformed_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, "garbage").unwrap();

        let observer = FileLock::new(&path, fast_config());
        let err = observer.info().unwrap_err();
        assert!(matches!(err, LockError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_force_clear_ignores_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let mut holder = FileLock::new(&path, fast_config());
        holder.acquire().await.unwrap();

        let mut other = FileLock::new(&path, fast_config());
        other.force_clear().unwrap();
        assert!(!path.exists());

        // Clearing an already-clear lock is fine too
        other.force_clear().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion_under_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = Arc::new(lock_path(&dir));
        let counter = Arc::new(dir.path().join("counter"));
        std::fs::write(counter.as_ref(), "0").unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let path = Arc::clone(&path);
            let counter = Arc::clone(&counter);
            tasks.spawn(async move {
                let mut lock = FileLock::new(path.as_ref(), fast_config());
                lock.acquire().await.unwrap();

                // Deliberately racy read-modify-write; only mutual exclusion
                // keeps the final count correct.
                let value: u32 = std::fs::read_to_string(counter.as_ref())
                    .unwrap()
                    .trim()
                    .parse()
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
                std::fs::write(counter.as_ref(), (value + 1).to_string()).unwrap();

                lock.release().unwrap();
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        let final_value: u32 = std::fs::read_to_string(counter.as_ref())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(final_value, 8);
    }
}
