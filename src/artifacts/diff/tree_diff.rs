//! Two-tree diffing
//!
//! Produces the changeset between two tree objects (or a tree and nothing)
//! by walking both in sorted order, expanding subtrees only where the two
//! sides disagree. The changeset drives checkout migrations and the
//! staged-changes half of `status`.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Type of change detected for a single path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChangeType {
    Added(DatabaseEntry),
    Deleted(DatabaseEntry),
    Modified {
        old: DatabaseEntry,
        new: DatabaseEntry,
    },
}

impl TreeChangeType {
    pub fn from_entries(old: Option<DatabaseEntry>, new: Option<DatabaseEntry>) -> Option<Self> {
        match (old, new) {
            (None, Some(new)) => Some(TreeChangeType::Added(new)),
            (Some(old), None) => Some(TreeChangeType::Deleted(old)),
            (Some(old), Some(new)) if old != new => Some(TreeChangeType::Modified { old, new }),
            _ => None,
        }
    }

    pub fn old_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } => Some(old),
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } => Some(new),
            TreeChangeType::Deleted(_) => None,
        }
    }

    pub fn status_char(&self) -> char {
        match self {
            TreeChangeType::Added(_) => 'A',
            TreeChangeType::Deleted(_) => 'D',
            TreeChangeType::Modified { .. } => 'M',
        }
    }
}

/// All blob-level changes between two trees, keyed by path
pub type ChangeSet = BTreeMap<PathBuf, TreeChangeType>;

type TreeEntryMap = BTreeMap<String, DatabaseEntry>;

/// Tree diff engine
///
/// ```ignore
/// let mut diff = TreeDiff::new(database);
/// diff.compare_oids(Some(&old_tree), Some(&new_tree))?;
/// for (path, change) in diff.changes() { ... }
/// ```
#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn into_changes(self) -> ChangeSet {
        self.change_set
    }

    /// Compare two tree (or commit) ids; `None` stands for the empty tree
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        self.compare_at(Path::new(""), old, new)
    }

    fn compare_at(
        &mut self,
        prefix: &Path,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_entries = self.inflate_entries(old)?;
        let new_entries = self.inflate_entries(new)?;

        self.detect_deletions(prefix, &old_entries, &new_entries)?;
        self.detect_additions(prefix, &old_entries, &new_entries)?;

        Ok(())
    }

    fn inflate_entries(&self, oid: Option<&ObjectId>) -> anyhow::Result<TreeEntryMap> {
        match oid {
            None => Ok(BTreeMap::new()),
            Some(oid) => Ok(self
                .database
                .parse_tree_or_commit(oid)?
                .into_entries()
                .collect()),
        }
    }

    /// Walk the old side: deletions and modifications
    fn detect_deletions(
        &mut self,
        prefix: &Path,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
    ) -> anyhow::Result<()> {
        for (name, entry) in old {
            let path = prefix.join(name);
            let other = new.get(name);

            if other == Some(entry) {
                continue;
            }

            let old_subtree = entry.is_tree().then_some(&entry.oid);
            let new_subtree = other.filter(|other| other.is_tree()).map(|other| &other.oid);
            self.compare_at(&path, old_subtree, new_subtree)?;

            let old_blob = (!entry.is_tree()).then(|| entry.clone());
            let new_blob = other.filter(|other| !other.is_tree()).cloned();
            if let Some(change) = TreeChangeType::from_entries(old_blob, new_blob) {
                self.change_set.insert(path, change);
            }
        }

        Ok(())
    }

    /// Walk the new side: pure additions not seen by the deletions pass
    fn detect_additions(
        &mut self,
        prefix: &Path,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
    ) -> anyhow::Result<()> {
        for (name, entry) in new {
            if old.contains_key(name) {
                continue;
            }

            let path = prefix.join(name);
            if entry.is_tree() {
                self.compare_at(&path, None, Some(&entry.oid))?;
            } else {
                self.change_set
                    .insert(path, TreeChangeType::Added(entry.clone()));
            }
        }

        Ok(())
    }
}
