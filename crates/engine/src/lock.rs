//! Cross-process writer serialization
//!
//! An advisory exclusive lock on `pulse.db.lock` guards the whole
//! database directory: at most one process holds a database open for
//! writing. Acquisition retries until the configured timeout, then fails
//! the open attempt with `FileLockTimeout` (fatal, not retried
//! internally). The lock releases when the guard drops or the process
//! dies.

use fs2::FileExt;
use pulse_core::{PulseError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to sleep between acquisition attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Held advisory lock on the database directory
pub struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    /// Acquire the lock file exclusively, retrying up to `timeout`
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "acquired database file lock");
                    return Ok(Self { path, file });
                }
                Err(_) if Instant::now() < deadline => std::thread::sleep(RETRY_INTERVAL),
                Err(_) => return Err(PulseError::FileLockTimeout(path)),
            }
        }
    }

    /// The lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
