use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Print the content of an object (`cat-file -p`)
    pub fn cat_file(&mut self, spec: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let oid = self.resolve_oid(spec)?;
        let object = self.database().parse_object(&oid)?;
        writeln!(self.writer(), "{}", object.display())?;
        Ok(())
    }

    /// Resolve a full or abbreviated object id
    pub(crate) fn resolve_oid(&self, spec: &str) -> anyhow::Result<ObjectId> {
        if let Ok(oid) = ObjectId::try_parse(spec) {
            return Ok(oid);
        }

        if spec.len() < 4 || !spec.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GitError::InvalidArgument(format!("invalid object id: {spec}")).into());
        }

        let mut matches = self.database().find_objects_by_prefix(spec)?;
        match matches.len() {
            0 => Err(GitError::not_found("object", spec.to_string()).into()),
            1 => Ok(matches.remove(0)),
            _ => Err(GitError::InvalidArgument(format!("ambiguous object id: {spec}")).into()),
        }
    }
}
