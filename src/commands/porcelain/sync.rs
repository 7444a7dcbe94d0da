//! Remote synchronization: fetch, pull, push, clone
//!
//! All four ride on the object-set exchange interface; the only carrier
//! the core ships is another repository on the local filesystem.

use crate::areas::refs::Expected;
use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::gc::reachable_objects;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::writer;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::transport::{FileExchange, ObjectExchange};
use std::io::Write;
use std::path::PathBuf;

impl Repository {
    /// Bring remote branches into `refs/remotes/<remote>/*`
    pub fn fetch(&mut self, remote: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let exchange = FileExchange::open(&self.remote_url(remote)?)?;
        let remote_refs = exchange.refs()?;
        let local_refs = self.refs().list("refs/")?;

        let wanted: Vec<ObjectId> = exchange
            .negotiate(&remote_refs, &local_refs)
            .into_iter()
            .filter(|oid| !self.database().exists(oid))
            .collect();

        if !wanted.is_empty() {
            let pack = exchange.send_pack(&wanted)?;
            let written = self.database().ingest_pack(&pack)?;
            writeln!(self.writer(), "Received {} objects", written.len())?;
        }

        let ident = self.reflog_ident();
        for (name, oid) in &remote_refs {
            let tracking = RefName::remote_branch(remote, name.short_name())?;
            self.refs()
                .write(&tracking, oid, Expected::Any, &ident, "fetch")?;
        }

        Ok(())
    }

    /// Fetch, then merge the remote counterpart of the current branch
    pub fn pull(&mut self, remote: &str) -> anyhow::Result<()> {
        self.fetch(remote)?;

        let branch = self
            .refs()
            .head_target()?
            .ok_or_else(|| GitError::InvalidArgument("HEAD is detached".to_string()))?;
        let tracking = format!("refs/remotes/{remote}/{}", branch.short_name());

        if self
            .refs()
            .read(&RefName::try_parse(&tracking)?)?
            .is_none()
        {
            return Err(GitError::not_found("ref", tracking).into());
        }

        let result = self.merge(&tracking, false, false, None)?;
        if result.status == crate::artifacts::merge::MergeStatus::Conflicts {
            let paths = result
                .conflicts
                .into_iter()
                .map(|conflict| conflict.path)
                .collect();
            return Err(GitError::MergeConflict(paths).into());
        }
        Ok(())
    }

    /// Send the current branch to the remote and advance its ref
    pub fn push(&mut self, remote: &str, force: bool) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let branch = self
            .refs()
            .head_target()?
            .ok_or_else(|| GitError::InvalidArgument("HEAD is detached".to_string()))?;
        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| GitError::InvalidArgument("nothing to push".to_string()))?;

        let exchange = FileExchange::open(&self.remote_url(remote)?)?;
        let remote_oid = exchange
            .refs()?
            .into_iter()
            .find(|(name, _)| name == &branch)
            .map(|(_, oid)| oid);

        if remote_oid == Some(head_oid) {
            writeln!(self.writer(), "Everything up-to-date")?;
            return Ok(());
        }

        // ship the closure of the branch tip; rejected pushes leave only
        // unreachable (gc-able) objects behind
        let closure = reachable_objects(self.database(), [head_oid])?;
        let mut objects = Vec::with_capacity(closure.len());
        for oid in closure {
            let (object_type, payload) = self.database().raw_parts(&oid)?;
            objects.push((oid, object_type, payload));
        }
        let written = exchange.receive_pack(&writer::build_stream(&objects)?)?;

        // with both tips present on the other side, ancestry decides
        // whether this is a fast-forward
        if let Some(remote_oid) = remote_oid
            && !force
            && !exchange.is_ancestor(&remote_oid, &head_oid)?
        {
            return Err(GitError::InvalidArgument(format!(
                "non-fast-forward push to {} rejected (use --force to override)",
                branch.short_name()
            ))
            .into());
        }

        let expected = match (remote_oid, force) {
            (_, true) => Expected::Any,
            (Some(oid), false) => Expected::Oid(oid),
            (None, false) => Expected::Unborn,
        };
        exchange.update_ref(&branch, &head_oid, expected, &self.reflog_ident(), "push")?;

        writeln!(
            self.writer(),
            "Pushed {} objects to {remote}/{}",
            written.len(),
            branch.short_name()
        )?;
        Ok(())
    }

    /// Clone a path-shaped remote into `dest`
    pub fn clone_from(
        url: &str,
        dest: &str,
        writer_out: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Repository> {
        let mut repository = Repository::new(PathBuf::from(dest), writer_out)?;
        repository.init()?;
        repository.remote_add("origin", url)?;
        repository.fetch("origin")?;

        let exchange = FileExchange::open(url)?;
        let default_branch = exchange
            .head_branch()?
            .map(|name| name.short_name().to_string());
        let first_fetched = exchange
            .refs()?
            .first()
            .map(|(name, _)| name.short_name().to_string());

        let Some(branch) = default_branch.or(first_fetched) else {
            // cloning an empty repository leaves an unborn main
            return Ok(repository);
        };

        let tracking = RefName::remote_branch("origin", &branch)?;
        let tip = repository
            .refs()
            .read(&tracking)?
            .ok_or_else(|| GitError::not_found("ref", tracking.to_string()))?;

        let local = RefName::branch(&branch)?;
        repository.refs().write(
            &local,
            &tip,
            Expected::Unborn,
            &repository.reflog_ident(),
            "clone: from remote",
        )?;
        repository.refs().set_head_symbolic(&local)?;
        repository.populate_worktree(&tip)?;

        Ok(repository)
    }

    /// Materialize a commit's tree into a freshly cloned working tree
    fn populate_worktree(&mut self, tip: &ObjectId) -> anyhow::Result<()> {
        use crate::artifacts::checkout::migration::Migration;
        use crate::artifacts::diff::tree_diff::TreeDiff;

        let new_tree = *self
            .database()
            .parse_object_as_commit(tip)?
            .ok_or_else(|| anyhow::anyhow!("{tip} is not a commit"))?
            .tree_oid();

        let mut diff = TreeDiff::new(self.database());
        diff.compare_oids(None, Some(&new_tree))?;
        let migration = Migration::from_changes(diff.changes());
        self.workspace().apply_migration(&migration, self.database())?;

        let flattened = self.database().flatten_tree(Some(&new_tree))?;
        let mut index = self.index();
        index.rehydrate()?;
        index.reset_from_entries(&flattened, self.workspace());
        index.write_updates()
    }
}
