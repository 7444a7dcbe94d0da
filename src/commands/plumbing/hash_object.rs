use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use std::io::Write;
use std::path::Path;

impl Repository {
    /// Hash a file as a blob, optionally writing it to the database
    pub fn hash_object(&mut self, file: &str, write: bool) -> anyhow::Result<()> {
        let content = self.workspace().read_file(Path::new(file))?;
        let blob = Blob::new(content);

        let oid = if write {
            self.ensure_initialized()?;
            self.database().store(&blob)?
        } else {
            blob.object_id()?
        };

        writeln!(self.writer(), "{oid}")?;
        Ok(())
    }
}
