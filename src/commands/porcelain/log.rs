use crate::areas::repository::Repository;
use crate::artifacts::log::rev_list::RevList;
use colored::Colorize;
use std::io::Write;

impl Repository {
    /// Print history from HEAD, newest first
    pub fn log(&mut self, limit: Option<usize>) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let Some(head_oid) = self.refs().read_head()? else {
            anyhow::bail!("your current branch does not have any commits yet");
        };

        let rev_list = RevList::new(self.database(), &[head_oid])?;
        let limit = limit.unwrap_or(usize::MAX);

        for item in rev_list.take(limit) {
            let (oid, commit) = item?;

            let mut writer = self.writer();
            writeln!(writer, "{}", format!("commit {oid}").yellow())?;
            writeln!(writer, "Author: {}", commit.author().display_name())?;
            writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
            writeln!(writer)?;
            for line in commit.message().lines() {
                writeln!(writer, "    {line}")?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}
