use crate::areas::repository::Repository;
use crate::artifacts::core::errors::GitError;
use std::io::Write;

impl Repository {
    pub fn remote_add(&mut self, name: &str, url: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let mut config = self.config();
        if config.get("remote", Some(name), "url").is_some() {
            return Err(GitError::InvalidArgument(format!("remote {name} already exists")).into());
        }
        config.set("remote", Some(name), "url", url);
        config.set(
            "remote",
            Some(name),
            "fetch",
            &format!("+refs/heads/*:refs/remotes/{name}/*"),
        );
        config.save()
    }

    pub fn remote_remove(&mut self, name: &str) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let mut config = self.config();
        if config.get("remote", Some(name), "url").is_none() {
            return Err(GitError::not_found("remote", name.to_string()).into());
        }
        config.remove_section("remote", Some(name));
        config.save()
    }

    pub fn remote_list(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let remotes = self.config().subsections("remote");
        let mut writer = self.writer();
        for remote in remotes {
            writeln!(writer, "{remote}")?;
        }
        Ok(())
    }

    /// The configured URL of a remote
    pub(crate) fn remote_url(&self, name: &str) -> anyhow::Result<String> {
        self.config()
            .get("remote", Some(name), "url")
            .map(str::to_string)
            .ok_or_else(|| GitError::not_found("remote", name.to_string()).into())
    }
}
