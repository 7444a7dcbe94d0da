//! Best common ancestor computation
//!
//! Finding the merge base of two commits runs in two phases:
//!
//! 1. A bidirectional traversal over the commit graph, processing commits
//!    newest-first through a timestamp priority queue. Each commit carries
//!    visit flags: reached from the source side, from the target side, or
//!    both. A commit reached from both sides is a common ancestor; its
//!    ancestors are marked stale to prune the walk.
//! 2. A redundancy filter over the common ancestors: any candidate that is
//!    an ancestor of another candidate is discarded. What survives are the
//!    best common ancestors.
//!
//! Ties between several best candidates are broken deterministically by
//! `(timestamp, oid)` descending.

use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use std::collections::{BinaryHeap, HashMap, HashSet};

/// The slice of a commit the graph walk needs: identity, parents, ordering
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: DateTime<FixedOffset>,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b0000;
        const FROM_SOURCE = 0b0001;
        const FROM_TARGET = 0b0010;
        const FROM_BOTH = Self::FROM_SOURCE.bits() | Self::FROM_TARGET.bits();
        /// An ancestor of an already-found common ancestor
        const STALE = 0b0100;
        /// Identified as a common ancestor
        const RESULT = 0b1000;
    }
}

/// Best common ancestor finder over a commit loader
///
/// The loader abstracts the storage backend so the algorithm can run
/// against the object database or an in-memory graph in tests.
pub struct BcaFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    commit_loader: CommitLoaderFn,
}

impl<CommitLoaderFn> BcaFinder<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        BcaFinder { commit_loader }
    }

    /// The best common ancestor of two commits, or `None` for disjoint
    /// histories
    pub fn find_best_common_ancestor(
        &self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> anyhow::Result<Option<ObjectId>> {
        let common = self.find_common_ancestors(source, HashSet::from([target]))?;
        let candidates: HashSet<ObjectId> = common.into_keys().collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        // phase 2: discard candidates reachable from another candidate
        let mut redundant = HashSet::new();
        for candidate in &candidates {
            if redundant.contains(candidate) {
                continue;
            }

            let others: HashSet<&ObjectId> = candidates
                .iter()
                .filter(|other| *other != candidate && !redundant.contains(*other))
                .collect();
            if others.is_empty() {
                break;
            }

            let states = self.find_common_ancestors(candidate, others.clone())?;
            if states
                .get(candidate)
                .is_some_and(|state| state.contains(VisitState::FROM_TARGET))
            {
                // some other candidate reaches this one
                redundant.insert(*candidate);
            }
            for other in others {
                if states
                    .get(other)
                    .is_some_and(|state| state.contains(VisitState::FROM_SOURCE))
                {
                    redundant.insert(*other);
                }
            }
        }

        let mut best: Vec<ObjectId> = candidates
            .into_iter()
            .filter(|candidate| !redundant.contains(candidate))
            .collect();

        // deterministic tie-break: newest timestamp first, then oid
        let mut keyed = Vec::with_capacity(best.len());
        for oid in best.drain(..) {
            let commit = (self.commit_loader)(&oid)?;
            keyed.push((commit.timestamp, oid));
        }
        keyed.sort_by(|a, b| b.cmp(a));

        Ok(keyed.into_iter().next().map(|(_, oid)| oid))
    }

    /// Phase 1: all common ancestors of `source` and the `targets` set
    fn find_common_ancestors(
        &self,
        source: &ObjectId,
        targets: HashSet<&ObjectId>,
    ) -> anyhow::Result<HashMap<ObjectId, VisitState>> {
        if targets.contains(source) {
            return Ok(HashMap::from([(*source, VisitState::RESULT)]));
        }

        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::new();

        let source_commit = (self.commit_loader)(source)?;
        states.insert(*source, VisitState::FROM_SOURCE);
        queue.push((source_commit.timestamp, *source));

        for &target in &targets {
            let target_commit = (self.commit_loader)(target)?;
            states.insert(*target, VisitState::FROM_TARGET);
            queue.push((target_commit.timestamp, *target));
        }

        while let Some((_, oid)) = queue.pop() {
            let current = states.get(&oid).copied().unwrap_or(VisitState::NONE);
            if current.contains(VisitState::STALE) {
                continue;
            }

            let is_common = current.contains(VisitState::FROM_BOTH);
            if is_common {
                states
                    .entry(oid)
                    .and_modify(|state| *state |= VisitState::RESULT);
            }

            let commit = (self.commit_loader)(&oid)?;
            for parent in &commit.parents {
                let parent_state = states.get(parent).copied().unwrap_or(VisitState::NONE);

                let mut new_state = parent_state | (current & VisitState::FROM_BOTH);
                if is_common {
                    new_state |= VisitState::STALE;
                }

                // requeue only when this visit adds new reachability
                if !parent_state.contains(current & VisitState::FROM_BOTH)
                    || (is_common && !parent_state.contains(VisitState::STALE))
                {
                    let parent_commit = (self.commit_loader)(parent)?;
                    states.insert(*parent, new_state);
                    queue.push((parent_commit.timestamp, *parent));
                }
            }
        }

        Ok(states
            .into_iter()
            .filter(|(_, state)| {
                state.contains(VisitState::RESULT) && !state.contains(VisitState::STALE)
            })
            .collect())
    }
}
