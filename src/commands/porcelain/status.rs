use crate::areas::repository::Repository;
use crate::artifacts::status::inspector;
use colored::Colorize;
use std::io::Write;

impl Repository {
    /// Show the working tree status
    pub fn status(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let mut index = self.index();
        index.rehydrate()?;

        let head_tree = self.head_tree_oid()?;
        let report = inspector::inspect(
            self.database(),
            &index,
            self.workspace(),
            head_tree.as_ref(),
        )?;
        drop(index);

        let branch = self.refs().head_target()?;
        let mut writer = self.writer();
        match branch {
            Some(branch) => writeln!(writer, "On branch {}", branch.short_name())?,
            None => writeln!(writer, "HEAD detached")?,
        }

        if !report.conflicted.is_empty() {
            writeln!(writer, "\nUnmerged paths:")?;
            for path in &report.conflicted {
                writeln!(writer, "\tboth modified:   {}", path.display().to_string().red())?;
            }
        }

        if !report.staged.is_empty() {
            writeln!(writer, "\nChanges to be committed:")?;
            for (path, kind) in &report.staged {
                let label = match kind {
                    'A' => "new file",
                    'D' => "deleted",
                    _ => "modified",
                };
                writeln!(
                    writer,
                    "\t{}",
                    format!("{label}:   {}", path.display()).green()
                )?;
            }
        }

        if !report.unstaged.is_empty() {
            writeln!(writer, "\nChanges not staged for commit:")?;
            for (path, kind) in &report.unstaged {
                let label = if *kind == 'D' { "deleted" } else { "modified" };
                writeln!(
                    writer,
                    "\t{}",
                    format!("{label}:   {}", path.display()).red()
                )?;
            }
        }

        if !report.untracked.is_empty() {
            writeln!(writer, "\nUntracked files:")?;
            for path in &report.untracked {
                writeln!(writer, "\t{}", path.display().to_string().red())?;
            }
        }

        if report.is_clean() {
            writeln!(writer, "nothing to commit, working tree clean")?;
        }

        Ok(())
    }
}
