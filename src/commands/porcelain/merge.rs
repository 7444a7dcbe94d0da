use crate::areas::database::CommitCache;
use crate::areas::refs::Expected;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::merge::bases::BcaFinder;
use crate::artifacts::merge::tree_merge::{TreeMerge, TreeMergeOutcome};
use crate::artifacts::merge::{MergeResult, MergeStatus};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

impl Repository {
    /// Merge another branch into the current one
    pub fn merge(
        &mut self,
        target: &str,
        no_commit: bool,
        no_ff: bool,
        message: Option<&str>,
    ) -> anyhow::Result<MergeResult> {
        self.ensure_initialized()?;

        let ours = self
            .refs()
            .read_head()?
            .ok_or_else(|| GitError::InvalidArgument("HEAD has no commits yet".to_string()))?;
        let theirs = self.resolve_merge_target(target)?;

        // merge base, or refuse disjoint histories
        let commit_cache = CommitCache::new();
        let database = self.database();
        let base = BcaFinder::new(|oid: &ObjectId| commit_cache.get_or_load(database, oid))
            .find_best_common_ancestor(&ours, &theirs)?
            .ok_or(GitError::NoMergeBase)?;

        if base == theirs || ours == theirs {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(MergeResult::trivial(MergeStatus::AlreadyUpToDate));
        }

        if base == ours && !no_ff {
            return self.fast_forward(target, &ours, &theirs);
        }

        let outcome = TreeMerge::new(self.database()).merge(Some(&base), &ours, &theirs)?;
        self.apply_merge_outcome(&outcome)?;

        if !outcome.is_clean() {
            let paths: Vec<PathBuf> = outcome
                .conflicts
                .iter()
                .map(|conflict| conflict.path.clone())
                .collect();

            let mut writer = self.writer();
            for path in &paths {
                writeln!(writer, "CONFLICT (content): merge conflict in {}", path.display())?;
            }
            writeln!(
                writer,
                "Automatic merge failed; fix conflicts and then commit the result."
            )?;
            drop(writer);

            return Ok(MergeResult {
                status: MergeStatus::Conflicts,
                tree_oid: None,
                conflicts: outcome.conflicts,
            });
        }

        let tree_oid = self.index().tree_write(self.database())?;
        if no_commit {
            writeln!(
                self.writer(),
                "Automatic merge went well; stopped before committing as requested"
            )?;
            return Ok(MergeResult {
                status: MergeStatus::Success,
                tree_oid: Some(tree_oid),
                conflicts: Vec::new(),
            });
        }

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Merge branch '{target}'"));
        let oid = self.create_merge_commit(vec![ours, theirs], tree_oid, &message)?;
        writeln!(
            self.writer(),
            "Merge made by the three-way strategy ({}).",
            oid.to_short_oid()
        )?;

        Ok(MergeResult {
            status: MergeStatus::Success,
            tree_oid: Some(tree_oid),
            conflicts: Vec::new(),
        })
    }

    fn fast_forward(
        &mut self,
        target: &str,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> anyhow::Result<MergeResult> {
        let old_tree = self.head_tree_oid()?;
        let new_tree = *self
            .database()
            .parse_object_as_commit(theirs)?
            .ok_or_else(|| anyhow::anyhow!("{theirs} is not a commit"))?
            .tree_oid();

        let mut diff = TreeDiff::new(self.database());
        diff.compare_oids(old_tree.as_ref(), Some(&new_tree))?;
        let migration = Migration::from_changes(diff.changes());
        self.workspace().apply_migration(&migration, self.database())?;

        let flattened = self.database().flatten_tree(Some(&new_tree))?;
        let mut index = self.index();
        index.rehydrate()?;
        index.reset_from_entries(&flattened, self.workspace());
        index.write_updates()?;
        drop(index);

        self.refs().advance_head(
            theirs,
            Expected::Oid(*ours),
            &self.reflog_ident(),
            &format!("merge {target}: fast-forward"),
        )?;

        let mut writer = self.writer();
        writeln!(
            writer,
            "Updating {}..{}",
            ours.to_short_oid(),
            theirs.to_short_oid()
        )?;
        writeln!(writer, "Fast-forward")?;

        Ok(MergeResult::trivial(MergeStatus::FastForward))
    }

    /// Rewrite the working tree and the index from a tree-merge outcome
    fn apply_merge_outcome(&mut self, outcome: &TreeMergeOutcome) -> anyhow::Result<()> {
        let mut index = self.index();
        index.rehydrate()?;

        // drop tracked files that the merge removed
        let tracked: BTreeSet<PathBuf> = index
            .merged_entries()
            .map(|entry| entry.name.clone())
            .collect();
        for path in &tracked {
            if !outcome.worktree.contains_key(path) {
                self.workspace().remove_file(path)?;
            }
        }

        for (path, entry) in &outcome.worktree {
            let blob = self
                .database()
                .parse_object_as_blob(&entry.oid)?
                .ok_or_else(|| anyhow::anyhow!("expected a blob at {}", entry.oid))?;
            self.workspace().write_file(path, entry, blob.content())?;
        }

        index.reset_from_entries(&outcome.merged, self.workspace());
        for conflict in &outcome.conflicts {
            index.add_conflict(
                &conflict.path,
                conflict.base.as_ref(),
                conflict.ours.as_ref(),
                conflict.theirs.as_ref(),
            );
        }
        index.write_updates()
    }

    pub(crate) fn create_merge_commit(
        &mut self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        message: &str,
    ) -> anyhow::Result<ObjectId> {
        let author = self.author()?;
        let committer = self.committer()?;

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        let subject = message.lines().next().unwrap_or("").to_string();

        let expected = Expected::Oid(parents[0]);
        let commit = Commit::new(parents, tree_oid, author, committer.clone(), message);
        let oid = self.database().store(&commit)?;

        self.refs()
            .advance_head(&oid, expected, &committer, &format!("merge: {subject}"))?;

        let mut index = self.index();
        index.rehydrate()?;
        index.clear_entries();
        index.write_updates()?;

        Ok(oid)
    }

    /// A branch name, a full ref name, or an (abbreviated) object id
    fn resolve_merge_target(&self, target: &str) -> anyhow::Result<ObjectId> {
        if let Ok(branch) = RefName::branch(target)
            && let Some(oid) = self.refs().read(&branch)?
        {
            return Ok(oid);
        }
        if let Ok(name) = RefName::try_parse(target)
            && let Some(oid) = self.refs().read(&name)?
        {
            return Ok(oid);
        }

        self.resolve_oid(target)
    }
}
