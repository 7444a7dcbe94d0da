//! Migration plans
//!
//! A migration turns a tree-level changeset into an ordered plan of
//! working-tree mutations. The application order matters:
//!
//! 1. delete files, then prune their now-empty directories (deepest first)
//! 2. create directories (shallowest first), then write modified and added
//!    files
//!
//! The plan itself is pure data; the workspace applies it.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionType {
    Delete,
    Modify,
    Add,
}

#[derive(Debug, Default)]
pub struct Migration {
    actions: BTreeMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>,
    /// Directories that may have become empty, candidates for removal
    rmdirs: BTreeSet<PathBuf>,
    /// Directories that must exist before files are written
    mkdirs: BTreeSet<PathBuf>,
}

impl Migration {
    pub fn from_changes(changes: &ChangeSet) -> Self {
        let mut migration = Migration::default();

        for (path, change) in changes {
            match change {
                TreeChangeType::Deleted(_) => {
                    migration.record(ActionType::Delete, path, None);
                    migration.record_dirs(path, true);
                }
                TreeChangeType::Modified { new, .. } => {
                    migration.record(ActionType::Modify, path, Some(new.clone()));
                    migration.record_dirs(path, false);
                }
                TreeChangeType::Added(entry) => {
                    migration.record(ActionType::Add, path, Some(entry.clone()));
                    migration.record_dirs(path, false);
                }
            }
        }

        migration
    }

    fn record(&mut self, action: ActionType, path: &Path, entry: Option<DatabaseEntry>) {
        self.actions
            .entry(action)
            .or_default()
            .push((path.to_path_buf(), entry));
    }

    fn record_dirs(&mut self, path: &Path, removal: bool) {
        let dirs = if removal {
            &mut self.rmdirs
        } else {
            &mut self.mkdirs
        };
        for ancestor in path.ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() {
                dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    pub fn actions(&self, action: ActionType) -> &[(PathBuf, Option<DatabaseEntry>)] {
        self.actions
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Removal candidates, shallowest first; apply in reverse
    pub fn rmdirs(&self) -> impl Iterator<Item = &PathBuf> {
        self.rmdirs.iter()
    }

    /// Required directories, shallowest first
    pub fn mkdirs(&self) -> impl Iterator<Item = &PathBuf> {
        self.mkdirs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::entry_mode::EntryMode;
    use crate::artifacts::objects::object_id::ObjectId;
    use pretty_assertions::assert_eq;

    fn entry() -> DatabaseEntry {
        DatabaseEntry::new(
            ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap(),
            EntryMode::Regular,
        )
    }

    #[test]
    fn test_plan_collects_actions_and_directories() {
        let mut changes = ChangeSet::new();
        changes.insert(
            PathBuf::from("kept/deep/file.txt"),
            TreeChangeType::Added(entry()),
        );
        changes.insert(
            PathBuf::from("gone/old.txt"),
            TreeChangeType::Deleted(entry()),
        );
        changes.insert(
            PathBuf::from("changed.txt"),
            TreeChangeType::Modified {
                old: entry(),
                new: entry(),
            },
        );

        let migration = Migration::from_changes(&changes);

        assert_eq!(migration.actions(ActionType::Add).len(), 1);
        assert_eq!(migration.actions(ActionType::Delete).len(), 1);
        assert_eq!(migration.actions(ActionType::Modify).len(), 1);

        let mkdirs: Vec<_> = migration.mkdirs().cloned().collect();
        assert_eq!(
            mkdirs,
            vec![PathBuf::from("kept"), PathBuf::from("kept/deep")]
        );
        let rmdirs: Vec<_> = migration.rmdirs().cloned().collect();
        assert_eq!(rmdirs, vec![PathBuf::from("gone")]);
    }
}
