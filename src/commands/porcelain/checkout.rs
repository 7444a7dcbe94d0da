use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::reflog;
use std::io::Write;

impl Repository {
    /// Switch to a branch (or detach at a commit id)
    ///
    /// Rewrites the working tree and the index to match the target tree,
    /// then repoints HEAD.
    pub fn checkout(&mut self, target: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let (branch, target_oid) = self.resolve_checkout_target(target)?;

        let old_tree = self.head_tree_oid()?;
        let new_tree = *self
            .database()
            .parse_object_as_commit(&target_oid)?
            .ok_or_else(|| anyhow::anyhow!("{target_oid} is not a commit"))?
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

        let old_position = self
            .refs()
            .head_target()?
            .map(|name| name.short_name().to_string())
            .or_else(|| old_tree.map(|_| "detached HEAD".to_string()))
            .unwrap_or_else(|| "unborn".to_string());
        let old_head = self.refs().read_head()?;

        match &branch {
            Some(branch) => {
                self.refs().set_head_symbolic(branch)?;
                writeln!(self.writer(), "Switched to branch '{}'", branch.short_name())?;
            }
            None => {
                self.refs().set_head_detached(&target_oid)?;
                writeln!(
                    self.writer(),
                    "HEAD is now at {}",
                    target_oid.to_short_oid()
                )?;
            }
        }

        reflog::append(
            self.git_dir(),
            &RefName::head(),
            &old_head.unwrap_or_else(ObjectId::zero),
            &target_oid,
            &self.reflog_ident(),
            &format!("checkout: moving from {old_position} to {target}"),
        );

        Ok(())
    }

    /// A branch name, a full ref name, or an (abbreviated) object id
    fn resolve_checkout_target(
        &self,
        target: &str,
    ) -> anyhow::Result<(Option<RefName>, ObjectId)> {
        if let Ok(branch) = RefName::branch(target)
            && let Some(oid) = self.refs().read(&branch)?
        {
            return Ok((Some(branch), oid));
        }
        if let Ok(name) = RefName::try_parse(target)
            && let Some(oid) = self.refs().read(&name)?
        {
            let branch = name.is_branch().then_some(name);
            return Ok((branch, oid));
        }

        Ok((None, self.resolve_oid(target)?))
    }
}
