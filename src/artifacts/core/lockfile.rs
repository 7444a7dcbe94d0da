//! Exclusive-create lockfiles
//!
//! All exclusive on-disk resources (refs, the index, the config file) are
//! mutated through the same primitive: create `<target>.lock` with
//! create-exclusive semantics, stage the new content there, then rename it
//! over the target. Interruption at any point leaves either the old or the
//! new content, never a partial write; an uncommitted lock is removed when
//! the guard drops.

use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const LOCK_SUFFIX: &str = ".lock";

/// Age past which an orphaned lock or temp file is considered abandoned
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60 * 60);

/// A held lock on a target path
///
/// Dropping the guard without calling [`Lockfile::commit`] rolls the
/// mutation back by deleting the lock file.
#[derive(Debug)]
pub struct Lockfile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<std::fs::File>,
}

impl Lockfile {
    /// Acquire the lock for `target`, creating parent directories as needed
    ///
    /// Fails if another process (or an abandoned run) holds the lock.
    pub fn acquire(target: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("unable to create parent of {}", target.display()))?;
        }

        let mut lock_name = target
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("cannot lock path without a file name"))?
            .to_os_string();
        lock_name.push(LOCK_SUFFIX);
        let lock_path = target.with_file_name(lock_name);

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("unable to lock {}", target.display()))?;

        Ok(Lockfile {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
        })
    }

    /// Stage bytes into the lock file
    pub fn write_all(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("lockfile already committed"))?
            .write_all(bytes)
            .with_context(|| format!("unable to write {}", self.lock_path.display()))?;
        Ok(())
    }

    /// Atomically publish the staged content over the target
    pub fn commit(mut self) -> anyhow::Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| anyhow::anyhow!("lockfile already committed"))?;
        file.sync_all().ok();
        drop(file);

        std::fs::rename(&self.lock_path, &self.target).with_context(|| {
            format!(
                "unable to rename {} over {}",
                self.lock_path.display(),
                self.target.display()
            )
        })
    }

    /// Drop the lock without touching the target
    pub fn rollback(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.file.take().is_some() {
            std::fs::remove_file(&self.lock_path).ok();
        }
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Remove abandoned `*.lock` and `tmp_*` files under `root`
///
/// Only files older than [`STALE_LOCK_AGE`] are touched, so a concurrent
/// process that is actively holding a lock is left alone.
pub fn sweep_stale(root: &Path) {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.path().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(LOCK_SUFFIX) && !name.starts_with("tmp_") {
            continue;
        }

        let abandoned = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > STALE_LOCK_AGE);

        if abandoned {
            std::fs::remove_file(entry.path()).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_commit_publishes_content() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.path().join("refs").join("heads").join("main");

        let mut lock = Lockfile::acquire(&target).unwrap();
        lock.write_all(b"0123456789").unwrap();
        lock.commit().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"0123456789");
        assert!(!target.with_file_name("main.lock").exists());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.path().join("HEAD");

        let _held = Lockfile::acquire(&target).unwrap();
        assert!(Lockfile::acquire(&target).is_err());
    }

    #[test]
    fn test_drop_rolls_back() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.path().join("HEAD");

        {
            let mut lock = Lockfile::acquire(&target).unwrap();
            lock.write_all(b"abandoned").unwrap();
        }

        assert!(!target.exists());
        assert!(Lockfile::acquire(&target).is_ok());
    }
}
