//! Error taxonomy for repository operations
//!
//! Every failure a caller may need to branch on is a variant of [`GitError`].
//! Operations still return `anyhow::Result` so that path context can be
//! attached on the way up; callers that care about a specific failure
//! (a stale ref CAS, an unresolved conflict set) recover the variant with
//! `err.downcast_ref::<GitError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// Object, ref, or index entry missing from every storage tier
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Integrity check failure; never silently recovered
    #[error("corrupt {kind}: {detail}")]
    Corrupt { kind: &'static str, detail: String },

    /// Object bytes that do not parse as any known kind
    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    /// Compare-and-set failure on a ref update; the ref was left untouched
    #[error("ref {name} changed concurrently: expected {expected}, found {actual}")]
    RefStale {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("cannot commit with unresolved conflicts: {0:?}")]
    UnresolvedConflicts(Vec<PathBuf>),

    #[error("no common ancestor between the merged commits")]
    NoMergeBase,

    /// A merge stopped with conflicted paths waiting in the index
    #[error("merge produced conflicts in: {0:?}")]
    MergeConflict(Vec<PathBuf>),

    #[error("nothing staged for commit")]
    EmptyCommit,

    #[error("hasher used after finalize")]
    UsageAfterFinalize,

    #[error("symbolic ref chain too deep at {0}")]
    SymrefCycle(String),

    #[error("corrupt packfile: {0}")]
    CorruptPack(String),
}

impl GitError {
    pub fn corrupt(kind: &'static str, detail: impl Into<String>) -> Self {
        GitError::Corrupt {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        GitError::NotFound {
            kind,
            key: key.into(),
        }
    }
}
