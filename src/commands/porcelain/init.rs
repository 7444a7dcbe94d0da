use crate::areas::repository::Repository;
use std::io::Write;

/// The branch a fresh repository starts on
pub const DEFAULT_BRANCH: &str = "main";

impl Repository {
    /// Create the gitdir skeleton; safe to run on an existing repository
    pub fn init(&mut self) -> anyhow::Result<()> {
        let git_dir = self.git_dir().to_path_buf();

        for dir in [
            "objects",
            "objects/pack",
            "objects/info",
            "refs/heads",
            "refs/tags",
            "refs/remotes",
            "logs",
        ] {
            std::fs::create_dir_all(git_dir.join(dir))?;
        }

        let head_path = git_dir.join("HEAD");
        if !head_path.exists() {
            std::fs::write(&head_path, format!("ref: refs/heads/{DEFAULT_BRANCH}\n"))?;
        }

        {
            let mut config = self.config();
            config.set("core", None, "repositoryformatversion", "0");
            config.set("core", None, "bare", "false");
            config.save()?;
        }

        writeln!(
            self.writer(),
            "Initialized empty repository in {}",
            git_dir.display()
        )?;
        Ok(())
    }
}
