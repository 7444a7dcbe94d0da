use crate::areas::refs::Expected;
use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::refs::ref_name::{HEADS_PREFIX, REMOTES_PREFIX, RefName};
use colored::Colorize;
use std::io::Write;

impl Repository {
    /// Create a branch at the current HEAD commit
    pub fn branch_create(&mut self, name: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| GitError::InvalidArgument("HEAD has no commits yet".to_string()))?;

        let branch = RefName::branch(name)?;
        if self.refs().read(&branch)?.is_some() {
            return Err(
                GitError::InvalidArgument(format!("branch {name} already exists")).into(),
            );
        }

        self.refs().write(
            &branch,
            &head_oid,
            Expected::Unborn,
            &self.reflog_ident(),
            &format!("branch: created from {}", head_oid.to_short_oid()),
        )
    }

    /// Delete a branch that is not checked out
    pub fn branch_delete(&mut self, name: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let branch = RefName::branch(name)?;
        if self.refs().head_target()?.as_ref() == Some(&branch) {
            return Err(GitError::InvalidArgument(format!(
                "cannot delete the checked-out branch {name}"
            ))
            .into());
        }

        let deleted = self.refs().delete(
            &branch,
            Expected::Any,
            &self.reflog_ident(),
            "branch: deleted",
        )?;
        writeln!(
            self.writer(),
            "Deleted branch {name} (was {})",
            deleted.to_short_oid()
        )?;
        Ok(())
    }

    /// List branches, the current one marked
    pub fn branch_list(&mut self, all: bool) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let current = self.refs().head_target()?;
        let mut branches = self.refs().list(HEADS_PREFIX)?;
        if all {
            branches.extend(self.refs().list(REMOTES_PREFIX)?);
        }

        let mut writer = self.writer();
        for (name, _) in branches {
            if current.as_ref() == Some(&name) {
                writeln!(writer, "* {}", name.short_name().green())?;
            } else {
                writeln!(writer, "  {}", name.short_name())?;
            }
        }
        Ok(())
    }
}
