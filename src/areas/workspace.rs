//! Working directory operations
//!
//! The workspace is the user-visible file tree next to the gitdir. It
//! knows how to enumerate files, stat them for the index, and apply
//! checkout migrations.

use crate::areas::database::Database;
use crate::artifacts::checkout::migration::{ActionType, Migration};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::EntryMetadata;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, file_path: &Path) -> bool {
        self.path.join(file_path).exists()
    }

    /// List workspace files under `root` (everything when `None`),
    /// relative to the workspace root
    pub fn list_files(&self, root: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root = match root {
            Some(root) => self.path.join(root),
            None => self.path.to_path_buf(),
        };

        if !root.exists() {
            anyhow::bail!("pathspec does not match any files: {}", root.display());
        }

        if root.is_file() {
            return Ok(vec![self.relativize(&root)?]);
        }

        Ok(WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file() && !Self::is_ignored(entry.path()))
            .filter_map(|entry| self.relativize(entry.path()).ok())
            .collect())
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| {
            if let std::path::Component::Normal(name) = component {
                IGNORED_PATHS.contains(&name.to_string_lossy().as_ref())
            } else {
                false
            }
        })
    }

    fn relativize(&self, path: &Path) -> anyhow::Result<PathBuf> {
        path.strip_prefix(self.path.as_ref())
            .map(Path::to_path_buf)
            .with_context(|| format!("{} is outside the workspace", path.display()))
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.path.join(file_path);
        let content = std::fs::read(&full_path)
            .with_context(|| format!("unable to read {}", full_path.display()))?;
        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let metadata = std::fs::metadata(self.path.join(file_path))
            .with_context(|| format!("unable to stat {}", file_path.display()))?;
        (file_path, metadata).try_into()
    }

    /// Write blob content to a file, creating parent directories
    pub fn write_file(&self, file_path: &Path, entry: &DatabaseEntry, data: &[u8]) -> anyhow::Result<()> {
        let full_path = self.path.join(file_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .with_context(|| format!("unable to open {}", full_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("unable to write {}", full_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(entry.mode.as_u32());
            std::fs::set_permissions(&full_path, permissions)
                .with_context(|| format!("unable to set permissions on {}", full_path.display()))?;
        }

        Ok(())
    }

    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let full_path = self.path.join(file_path);
        if full_path.is_file() {
            std::fs::remove_file(&full_path)
                .with_context(|| format!("unable to remove {}", full_path.display()))?;
        }
        Ok(())
    }

    /// Apply a migration plan
    ///
    /// Deletions run first, then empty-directory pruning deepest-first,
    /// then directory creation shallowest-first, then writes.
    pub fn apply_migration(
        &self,
        migration: &Migration,
        database: &Database,
    ) -> anyhow::Result<()> {
        for (path, _) in migration.actions(ActionType::Delete) {
            self.remove_file(path)?;
        }

        for dir in migration.rmdirs().collect::<Vec<_>>().into_iter().rev() {
            self.remove_directory_if_empty(dir)?;
        }
        for dir in migration.mkdirs() {
            self.make_directory(dir)?;
        }

        for action in [ActionType::Modify, ActionType::Add] {
            for (path, entry) in migration.actions(action) {
                let entry = entry
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("{action:?} action without an entry"))?;
                let blob = database
                    .parse_object_as_blob(&entry.oid)?
                    .ok_or_else(|| anyhow::anyhow!("expected a blob at {}", entry.oid))?;
                self.write_file(path, entry, blob.content())?;
            }
        }

        Ok(())
    }

    fn remove_directory_if_empty(&self, dir_path: &Path) -> anyhow::Result<()> {
        let full_path = self.path.join(dir_path);
        if full_path.is_dir() && full_path.read_dir()?.next().is_none() {
            std::fs::remove_dir(&full_path)
                .with_context(|| format!("unable to remove {}", full_path.display()))?;
        }
        Ok(())
    }

    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let full_path = self.path.join(dir_path);

        // a file squatting on the directory name loses
        if full_path.is_file() {
            std::fs::remove_file(&full_path)?;
        }
        if !full_path.exists() {
            std::fs::create_dir_all(&full_path)?;
        }

        Ok(())
    }
}
