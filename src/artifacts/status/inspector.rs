//! Status inspection
//!
//! Classifies every interesting path by comparing three views:
//! the HEAD tree (last committed state), the index (staged state), and the
//! working tree (current files).

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::index::index_entry::Stage;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything `status` reports, sorted by path
#[derive(Debug, Default)]
pub struct StatusReport {
    /// Index differs from HEAD: (path, A/M/D)
    pub staged: Vec<(PathBuf, char)>,
    /// Working tree differs from the index: (path, M/D)
    pub unstaged: Vec<(PathBuf, char)>,
    /// Present on disk, absent from the index
    pub untracked: Vec<PathBuf>,
    /// Paths with stage-1/2/3 entries from an unfinished merge
    pub conflicted: Vec<PathBuf>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }
}

/// Compare HEAD, index, and working tree
pub fn inspect(
    database: &Database,
    index: &Index,
    workspace: &Workspace,
    head_tree: Option<&ObjectId>,
) -> anyhow::Result<StatusReport> {
    let mut report = StatusReport::default();

    let head_entries = database.flatten_tree(head_tree)?;

    let mut conflicted = BTreeSet::new();
    for entry in index.entries() {
        if entry.stage != Stage::Merged {
            conflicted.insert(entry.name.clone());
        }
    }
    report.conflicted = conflicted.iter().cloned().collect();

    // staged: index stage-0 vs the HEAD tree
    for entry in index.entries().filter(|entry| entry.stage == Stage::Merged) {
        match head_entries.get(&entry.name) {
            None => report.staged.push((entry.name.clone(), 'A')),
            Some(head_entry)
                if head_entry.oid != entry.oid || head_entry.mode != entry.metadata.mode =>
            {
                report.staged.push((entry.name.clone(), 'M'))
            }
            Some(_) => {}
        }
    }
    for path in head_entries.keys() {
        if index.entries_at(path).is_empty() {
            report.staged.push((path.clone(), 'D'));
        }
    }
    report.staged.sort();

    // unstaged: working tree vs index stage-0
    for entry in index.entries().filter(|entry| entry.stage == Stage::Merged) {
        if !workspace.exists(&entry.name) {
            report.unstaged.push((entry.name.clone(), 'D'));
        } else if index.is_modified(entry, workspace)? {
            report.unstaged.push((entry.name.clone(), 'M'));
        }
    }
    report.unstaged.sort();

    // untracked: on disk but in no index stage
    for path in workspace.list_files(None)? {
        if index.entries_at(&path).is_empty() {
            report.untracked.push(path);
        }
    }
    report.untracked.sort();

    Ok(report)
}
