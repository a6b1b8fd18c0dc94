//! Repository-wide advisory lock.

use crate::error::{Error, Result};
use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Exclusive lock on a repository, held for as long as the guard lives.
///
/// The lock file is created with `create_new`, so a second holder fails
/// instead of waiting. Dropping the guard removes the file; an explicit
/// [`RepositoryLock::release`] does the same but reports errors.
#[derive(Debug)]
pub struct RepositoryLock {
    path: PathBuf,
    released: bool,
}

impl RepositoryLock {
    pub(crate) fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::repository_locked(&path));
            }
            Err(e) => return Err(e.into()),
        };

        // Fill the guard in first so a failed write still cleans up
        let lock = Self {
            path,
            released: false,
        };
        writeln!(
            file,
            "pid={}\ntime={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        )?;

        info!(path = %lock.path.display(), "acquired repository lock");
        Ok(lock)
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now.
    pub fn release(mut self) -> Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        fs::remove_file(&self.path)?;
        info!(path = %self.path.display(), "released repository lock");
        Ok(())
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!(path = %self.path.display(), error = %e, "failed to release repository lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lock");

        let lock = RepositoryLock::acquire(path.clone()).unwrap();
        assert!(path.exists());

        assert!(matches!(
            RepositoryLock::acquire(path.clone()),
            Err(Error::RepositoryLocked { .. })
        ));

        lock.release().unwrap();
        assert!(!path.exists());

        // Free again after release
        let again = RepositoryLock::acquire(path.clone()).unwrap();
        drop(again);
        assert!(!path.exists());
    }

    #[test]
    fn test_lock_released_on_panic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lock");

        let inner = path.clone();
        let result = std::panic::catch_unwind(move || {
            let _lock = RepositoryLock::acquire(inner).unwrap();
            panic!("boom");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_lock_file_records_pid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lock");

        let _lock = RepositoryLock::acquire(path.clone()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("pid={}", std::process::id())));
    }
}
