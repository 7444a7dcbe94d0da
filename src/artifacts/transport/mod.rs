//! Object-set exchange
//!
//! The only contract between the repository core and any network
//! collaborator: negotiate which object ids are wanted, move them as a
//! pack stream, and report what was written. The core never opens sockets;
//! the one carrier provided here is another repository on the local
//! filesystem (`file://` or plain-path remotes), which is enough to drive
//! clone, fetch, pull, and push end to end.

use crate::areas::database::Database;
use crate::areas::refs::{Expected, Refs};
use crate::artifacts::core::errors::GitError;
use crate::artifacts::gc::reachable_objects;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::person::Person;
use crate::artifacts::pack::writer;
use crate::artifacts::refs::ref_name::{HEADS_PREFIX, RefName};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The opaque exchange interface
pub trait ObjectExchange {
    /// The advertised refs of the other side
    fn refs(&self) -> anyhow::Result<Vec<(RefName, ObjectId)>>;

    /// Which tips are worth transferring, given both ref sets
    fn negotiate(
        &self,
        remote_refs: &[(RefName, ObjectId)],
        local_refs: &[(RefName, ObjectId)],
    ) -> Vec<ObjectId> {
        let have: HashSet<ObjectId> = local_refs.iter().map(|(_, oid)| *oid).collect();
        let mut wanted: Vec<ObjectId> = remote_refs
            .iter()
            .map(|(_, oid)| *oid)
            .filter(|oid| !have.contains(oid))
            .collect();
        wanted.dedup();
        wanted
    }

    /// Serialize the closure of `wanted` into a pack stream
    fn send_pack(&self, wanted: &[ObjectId]) -> anyhow::Result<Bytes>;

    /// Ingest a pack stream, returning the ids written
    fn receive_pack(&self, pack: &Bytes) -> anyhow::Result<Vec<ObjectId>>;
}

/// Exchange with another repository on the local filesystem
pub struct FileExchange {
    database: Database,
    refs: Refs,
}

impl FileExchange {
    /// Open a path-shaped remote URL
    ///
    /// Accepts `file://<path>` or a bare path, pointing at either a
    /// working copy (`<path>/.git`) or a gitdir directly. Any other URL
    /// scheme is outside the core's contract.
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let path = match url.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None if url.contains("://") => {
                return Err(GitError::InvalidArgument(format!(
                    "unsupported remote transport: {url}"
                ))
                .into());
            }
            None => PathBuf::from(url),
        };

        let git_dir = resolve_git_dir(&path)?;
        Ok(FileExchange {
            database: Database::new(git_dir.join("objects").into_boxed_path()),
            refs: Refs::new(git_dir.into_boxed_path()),
        })
    }

    /// The branch HEAD points at on the other side, if symbolic
    pub fn head_branch(&self) -> anyhow::Result<Option<RefName>> {
        self.refs.head_target()
    }

    /// Compare-and-set a ref on the other side (push)
    pub fn update_ref(
        &self,
        name: &RefName,
        new_oid: &ObjectId,
        expected: Expected,
        ident: &Person,
        reason: &str,
    ) -> anyhow::Result<()> {
        self.refs.write(name, new_oid, expected, ident, reason)
    }

    /// Whether `ancestor` is reachable from `tip` on the other side
    pub fn is_ancestor(&self, ancestor: &ObjectId, tip: &ObjectId) -> anyhow::Result<bool> {
        Ok(reachable_objects(&self.database, [*tip])?.contains(ancestor))
    }
}

impl ObjectExchange for FileExchange {
    fn refs(&self) -> anyhow::Result<Vec<(RefName, ObjectId)>> {
        self.refs.list(HEADS_PREFIX)
    }

    fn send_pack(&self, wanted: &[ObjectId]) -> anyhow::Result<Bytes> {
        let closure = reachable_objects(&self.database, wanted.iter().copied())?;

        let mut objects = Vec::with_capacity(closure.len());
        for oid in closure {
            let (object_type, payload) = self.database.raw_parts(&oid)?;
            objects.push((oid, object_type, payload));
        }

        writer::build_stream(&objects)
    }

    fn receive_pack(&self, pack: &Bytes) -> anyhow::Result<Vec<ObjectId>> {
        self.database.ingest_pack(pack)
    }
}

fn resolve_git_dir(path: &Path) -> anyhow::Result<PathBuf> {
    let worktree_git_dir = path.join(".git");
    if worktree_git_dir.is_dir() {
        return Ok(worktree_git_dir);
    }
    if path.join("HEAD").is_file() {
        return Ok(path.to_path_buf());
    }

    Err(GitError::not_found("repository", path.display().to_string()).into())
}
