//! Directory lock that serializes bootstrap attempts.
//!
//! Uses flock so only one bootstrap attempt at a time persists config into
//! a given directory. The OS drops the lock if the process dies.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use airgap_driver_shared::constants::LOCK_FILE;
use airgap_driver_shared::errors::{DriverError, DriverResult};

/// Guard holding an exclusive lock on a config or data directory.
///
/// Released when dropped.
#[derive(Debug)]
pub struct ConfigLock {
    #[allow(dead_code)] // Held for lifetime, not directly accessed
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    /// Try to take the lock without blocking.
    ///
    /// # Returns
    /// * `Ok(ConfigLock)` - Lock acquired
    /// * `Err(DriverError::Config)` - Another attempt holds the lock, or the
    ///   lock file could not be created
    pub fn acquire(dir: &Path) -> DriverResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| DriverError::config(dir, format!("failed to create directory: {e}")))?;

        let lock_path = dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| DriverError::config(&lock_path, format!("failed to open lock file: {e}")))?;

        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                let reason = if err.kind() == std::io::ErrorKind::WouldBlock {
                    "another bootstrap attempt is already using this directory".to_string()
                } else {
                    format!("failed to acquire lock: {err}")
                };
                return Err(DriverError::config(dir, reason));
            }
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired config lock");

        Ok(ConfigLock {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = self.file.as_raw_fd();
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }

        tracing::debug!(lock_path = %self.path.display(), "Released config lock");
    }
}
