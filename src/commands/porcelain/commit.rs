use crate::areas::refs::Expected;
use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// The commit pipeline
    ///
    /// In order: refuse conflicted indexes, refuse empty commits (unless
    /// asked), materialize the tree, resolve the parent list from HEAD,
    /// write the commit object, and advance the branch with a
    /// compare-and-set against the expected parent. Nothing before the
    /// ref advance leaves observable state beyond immutable objects.
    pub fn commit(&mut self, message: &str, allow_empty: bool) -> anyhow::Result<ObjectId> {
        self.ensure_initialized()?;

        let mut index = self.index();
        index.rehydrate()?;

        if index.has_conflicts() {
            return Err(GitError::UnresolvedConflicts(index.conflict_paths()).into());
        }

        let head_oid = self.refs().read_head()?;
        if index.is_empty() && head_oid.is_some() && !allow_empty {
            return Err(GitError::EmptyCommit.into());
        }

        let tree_oid = index.tree_write(self.database())?;
        let parents: Vec<ObjectId> = head_oid.into_iter().collect();

        let author = self.author()?;
        let committer = self.committer()?;

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }

        let commit = Commit::new(
            parents.clone(),
            tree_oid,
            author,
            committer.clone(),
            message.clone(),
        );
        let oid = self.database().store(&commit)?;

        let (expected, reason_prefix) = match parents.first() {
            Some(parent) => (Expected::Oid(*parent), "commit"),
            None => (Expected::Unborn, "commit (initial)"),
        };
        let subject = message.lines().next().unwrap_or("").to_string();
        self.refs().advance_head(
            &oid,
            expected,
            &committer,
            &format!("{reason_prefix}: {subject}"),
        )?;

        // the staged snapshot has been committed
        index.clear_entries();
        index.write_updates()?;
        drop(index);

        let branch = self
            .refs()
            .head_target()?
            .map(|name| name.short_name().to_string())
            .unwrap_or_else(|| "detached HEAD".to_string());
        writeln!(
            self.writer(),
            "[{branch} {}] {subject}",
            oid.to_short_oid()
        )?;

        Ok(oid)
    }
}
