//! File-based locking to prevent concurrent execution.
//!
//! Uses flock-style advisory locking so only one update run rewrites the
//! CSV fragments and directive files at a time.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Holds an exclusive lock on the run lock file.
/// The lock is released when the guard is dropped.
pub struct LockGuard {
    _file: File,
}

impl LockGuard {
    /// Attempt to acquire an exclusive lock on `lock_path`.
    /// Returns an error if another run holds it.
    ///
    /// The file is opened with create+read+write (no truncate) so creation
    /// and locking do not race.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).ok();
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        fs::set_permissions(lock_path, fs::Permissions::from_mode(0o600))
            .context("Failed to set lock file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another instance of NoTrack is already running.\n\
                 If you believe this is an error, remove the lock file: {}",
                lock_path.display()
            )
        })?;

        Ok(Self { _file: file })
    }
}
