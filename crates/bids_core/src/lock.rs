//! Per-root run lock.
//!
//! The BIDS output tree is exclusively owned by a single pipeline run,
//! so two runs against the same session root must not overlap. The lock
//! is a file created with `create_new` inside the root; it holds the
//! owning PID and is removed when the guard drops.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the lock file inside the session root.
pub const LOCK_FILE: &str = ".bids-run.lock";

/// Errors from lock acquisition.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another run holds the lock at {0}")]
    Held(PathBuf),

    #[error("Failed to create lock file: {0}")]
    Io(#[from] io::Error),
}

/// RAII guard for exclusive access to a session root.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock for a session root.
    ///
    /// Fails with `LockError::Held` if a lock file already exists. A
    /// stale file left by a crashed run must be removed by the operator;
    /// the lock is deliberately not stolen.
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        let path = root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(LockError::Held(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_and_drop_removes() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join(LOCK_FILE);

        {
            let lock = RunLock::acquire(dir.path()).unwrap();
            assert!(lock.path().exists());
            assert_eq!(lock.path(), lock_path);
        }

        assert!(!lock_path.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let _lock = RunLock::acquire(dir.path()).unwrap();

        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, LockError::Held(_)));
    }

    #[test]
    fn lock_file_records_pid() {
        let dir = tempdir().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();

        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }
}
