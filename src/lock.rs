// src/lock.rs

//! Process-level advisory lock
//!
//! Only one pkgctl instance may manage a given system root at a time. The
//! lock is taken with `flock(LOCK_EX | LOCK_NB)` when a session starts and
//! released when the `SystemLock` is dropped. A held lock surfaces as
//! `Error::LibraryBusy`, never as a blocking wait.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock on a system root
#[derive(Debug)]
pub struct SystemLock {
    /// Kept open to hold the lock
    file: File,
    path: PathBuf,
}

impl SystemLock {
    /// Lock file location relative to the managed root
    pub const RELATIVE_PATH: &'static str = "var/run/pkgctl.lock";

    /// Lock file path for a system root
    pub fn path_for_root(root: &Path) -> PathBuf {
        root.join(Self::RELATIVE_PATH)
    }

    /// Take the lock or fail with `LibraryBusy`
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::try_acquire(path)?.ok_or_else(|| Error::LibraryBusy(path.to_path_buf()))
    }

    /// Try to take the lock without blocking
    ///
    /// Returns:
    /// - `Ok(Some(lock))` if the lock was acquired
    /// - `Ok(None)` if another process holds it
    /// - `Err` on I/O errors
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0)?;
                writeln!(file, "{}", std::process::id())?;
                info!("Acquired system lock at {:?}", path);
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("System lock already held at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to acquire system lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// PID recorded by the current holder, if readable
    pub fn holder_pid<P: AsRef<Path>>(path: P) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SystemLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released system lock at {:?}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempdir().unwrap();
        let path = SystemLock::path_for_root(dir.path());

        {
            let lock = SystemLock::acquire(&path).unwrap();
            assert_eq!(lock.path(), path.as_path());
            assert_eq!(SystemLock::holder_pid(&path), Some(std::process::id()));
        }

        // Released on drop, so it can be taken again
        let _again = SystemLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgctl.lock");

        let _held = SystemLock::acquire(&path).unwrap();
        assert!(SystemLock::try_acquire(&path).unwrap().is_none());

        match SystemLock::acquire(&path) {
            Err(Error::LibraryBusy(p)) => assert_eq!(p, path),
            other => panic!("expected LibraryBusy, got {:?}", other),
        }
    }
}
