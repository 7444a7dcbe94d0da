//! Newest-first commit walks
//!
//! Walks the commit graph from a set of tips, yielding each commit once in
//! reverse chronological order. A timestamp priority queue keeps merged
//! histories interleaved correctly.

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashSet};

pub struct RevList<'r> {
    database: &'r Database,
    queue: BinaryHeap<(DateTime<FixedOffset>, ObjectId)>,
    seen: HashSet<ObjectId>,
}

impl<'r> RevList<'r> {
    pub fn new(database: &'r Database, tips: &[ObjectId]) -> anyhow::Result<Self> {
        let mut rev_list = RevList {
            database,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
        };

        for tip in tips {
            rev_list.enqueue(tip)?;
        }

        Ok(rev_list)
    }

    fn enqueue(&mut self, oid: &ObjectId) -> anyhow::Result<()> {
        if !self.seen.insert(*oid) {
            return Ok(());
        }

        let commit = self
            .database
            .parse_object_as_commit(oid)?
            .ok_or_else(|| anyhow::anyhow!("{oid} is not a commit"))?;
        self.queue.push((commit.timestamp(), *oid));

        Ok(())
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, oid) = self.queue.pop()?;

        let commit = match self.database.parse_object_as_commit(&oid) {
            Ok(Some(commit)) => commit,
            Ok(None) => return Some(Err(anyhow::anyhow!("{oid} is not a commit"))),
            Err(error) => return Some(Err(error)),
        };

        for parent in commit.parents() {
            if let Err(error) = self.enqueue(parent) {
                return Some(Err(error));
            }
        }

        Some(Ok((oid, commit)))
    }
}
