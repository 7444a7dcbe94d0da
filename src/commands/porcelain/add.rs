use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage files or directories into the index
    pub fn add(&mut self, paths: &[String]) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let mut files: Vec<PathBuf> = Vec::new();
        for spec in paths {
            let expanded = if spec == "." {
                self.workspace().list_files(None)?
            } else {
                let path = Path::new(spec);
                if !self.workspace().exists(path) {
                    return Err(GitError::InvalidArgument(format!(
                        "pathspec '{spec}' did not match any files"
                    ))
                    .into());
                }
                self.workspace().list_files(Some(path))?
            };
            files.extend(expanded);
        }

        let mut index = self.index();
        index.rehydrate()?;
        for file in files {
            index.stage(&file, self.workspace(), self.database())?;
        }
        index.write_updates()
    }
}
