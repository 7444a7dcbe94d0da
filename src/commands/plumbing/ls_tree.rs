use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use std::io::Write;

impl Repository {
    /// List the entries of a tree (or of a commit's tree)
    pub fn ls_tree(&mut self, spec: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let oid = self.resolve_oid(spec)?;
        let tree = self.database().parse_tree_or_commit(&oid)?;
        writeln!(self.writer(), "{}", tree.display())?;
        Ok(())
    }
}
