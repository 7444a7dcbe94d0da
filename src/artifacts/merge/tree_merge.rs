//! Tree-level three-way merge
//!
//! Walks the base, ours, and theirs trees as flattened path maps and
//! classifies every path:
//!
//! | base | ours | theirs | outcome                         |
//! |------|------|--------|---------------------------------|
//! |  X   |  X   |   X    | unchanged, take base            |
//! |  X   |  Y   |   X    | ours changed, take ours         |
//! |  X   |  X   |   Y    | theirs changed, take theirs     |
//! |  X   |  Y   |   Y    | same change, take either        |
//! |  X   |  Y   |   Z    | content conflict, per-file merge|
//! |  -   |  Y   |   -    | ours added, take ours           |
//! |  -   |  -   |   Z    | theirs added, take theirs       |
//! |  -   |  Y   |   Z    | add/add, conflict if Y != Z     |
//! |  X   |  -   |   X    | ours deleted, take deletion     |
//! |  X   |  X   |   -    | theirs deleted, take deletion   |
//! |  X   |  -   |   Z    | delete/modify, conflict         |
//! |  X   |  Y   |   -    | modify/delete, conflict         |
//!
//! Entries compare as `(oid, mode)` pairs, so a mode flip counts as a
//! change. Content conflicts on text files go through the diff3 merge;
//! when it reconciles cleanly the path is merged after all. Binary blobs
//! (NUL in the first 8 KiB of any version) conflict whenever all three
//! versions differ.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::merge::diff3;
use crate::artifacts::merge::Conflict;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Outcome of the tree walk
///
/// `merged` holds the reconciled stage-0 view; `worktree` is what should
/// materialize on disk, which for conflicted paths is the conflict-marked
/// (or surviving-side) blob; `conflicts` lists what needs stages 1/2/3.
#[derive(Debug, Default)]
pub struct TreeMergeOutcome {
    pub merged: BTreeMap<PathBuf, DatabaseEntry>,
    pub worktree: BTreeMap<PathBuf, DatabaseEntry>,
    pub conflicts: Vec<Conflict>,
}

impl TreeMergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Three-way tree merge over the object database
#[derive(Debug)]
pub struct TreeMerge<'r> {
    database: &'r Database,
}

impl<'r> TreeMerge<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeMerge { database }
    }

    /// Merge the trees of three commits (tree or commit ids accepted)
    pub fn merge(
        &self,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<TreeMergeOutcome> {
        let base_map = self.database.flatten_tree(base)?;
        let our_map = self.database.flatten_tree(Some(ours))?;
        let their_map = self.database.flatten_tree(Some(theirs))?;

        let paths: BTreeSet<&PathBuf> = base_map
            .keys()
            .chain(our_map.keys())
            .chain(their_map.keys())
            .collect();

        let mut outcome = TreeMergeOutcome::default();

        for path in paths {
            let base_entry = base_map.get(path);
            let our_entry = our_map.get(path);
            let their_entry = their_map.get(path);

            let taken = if our_entry == their_entry {
                // unchanged on both, same change on both, or both deleted
                our_entry.cloned()
            } else if base_entry == our_entry {
                // only theirs changed (including a deletion)
                their_entry.cloned()
            } else if base_entry == their_entry {
                // only ours changed
                our_entry.cloned()
            } else {
                self.merge_path(path, base_entry, our_entry, their_entry, &mut outcome)?;
                continue;
            };

            if let Some(entry) = taken {
                outcome.merged.insert(path.clone(), entry.clone());
                outcome.worktree.insert(path.clone(), entry);
            }
        }

        Ok(outcome)
    }

    /// Both sides touched the path in different ways: attempt a content
    /// merge, otherwise record a conflict
    fn merge_path(
        &self,
        path: &PathBuf,
        base: Option<&DatabaseEntry>,
        ours: Option<&DatabaseEntry>,
        theirs: Option<&DatabaseEntry>,
        outcome: &mut TreeMergeOutcome,
    ) -> anyhow::Result<()> {
        let conflict = Conflict {
            path: path.clone(),
            base: base.cloned(),
            ours: ours.cloned(),
            theirs: theirs.cloned(),
        };

        let (Some(our_entry), Some(their_entry)) = (ours, theirs) else {
            // delete/modify or modify/delete: the surviving side stays in
            // the working tree while the index carries the stages
            if let Some(survivor) = ours.or(theirs) {
                outcome.worktree.insert(path.clone(), survivor.clone());
            }
            outcome.conflicts.push(conflict);
            return Ok(());
        };

        if !our_entry.mode.is_file() || !their_entry.mode.is_file() {
            outcome.worktree.insert(path.clone(), our_entry.clone());
            outcome.conflicts.push(conflict);
            return Ok(());
        }

        let base_blob = match base {
            Some(entry) => self.load_blob(&entry.oid)?,
            None => Blob::new(Bytes::new()),
        };
        let our_blob = self.load_blob(&our_entry.oid)?;
        let their_blob = self.load_blob(&their_entry.oid)?;

        if base_blob.is_binary() || our_blob.is_binary() || their_blob.is_binary() {
            outcome.worktree.insert(path.clone(), our_entry.clone());
            outcome.conflicts.push(conflict);
            return Ok(());
        }

        let merged = diff3::merge(
            base_blob.content(),
            our_blob.content(),
            their_blob.content(),
        );
        let merged_oid = self.database.store(&Blob::new(merged.content))?;
        let mode = pick_mode(base, our_entry.mode, their_entry.mode);
        let merged_entry = DatabaseEntry::new(merged_oid, mode);

        if merged.clean {
            outcome.merged.insert(path.clone(), merged_entry.clone());
            outcome.worktree.insert(path.clone(), merged_entry);
        } else {
            // the conflict-marked blob goes to the working tree only
            outcome.worktree.insert(path.clone(), merged_entry);
            outcome.conflicts.push(conflict);
        }

        Ok(())
    }

    fn load_blob(&self, oid: &ObjectId) -> anyhow::Result<Blob> {
        self.database.parse_object_as_blob(oid)?.ok_or_else(|| {
            anyhow::anyhow!("merge expected a blob at {oid}")
        })
    }
}

/// Keep the side that changed the mode; ours wins when both changed it
fn pick_mode(base: Option<&DatabaseEntry>, ours: EntryMode, theirs: EntryMode) -> EntryMode {
    if ours == theirs {
        ours
    } else if base.is_some_and(|entry| entry.mode == ours) {
        theirs
    } else {
        ours
    }
}
