//! Repository coordination
//!
//! `Repository` is the context value threaded through every command: the
//! worktree path, the gitdir, and the open stores (database, index, refs,
//! config, workspace). There are no process-wide singletons; everything a
//! command needs hangs off this value.

use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::errors::GitError;
use crate::artifacts::core::lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::person::Person;
use std::cell::{RefCell, RefMut};
use std::path::{Path, PathBuf};

/// Git directory name
const GIT_DIR: &str = ".git";

/// Object database directory name
const DATABASE_DIR: &str = "objects";

/// Index file name
const INDEX_FILE: &str = "index";

/// A repository rooted at a working directory
///
/// The gitdir defaults to `<root>/.git` and can be overridden with the
/// `GIT_DIR` environment variable (resolved relative to the root when not
/// absolute).
pub struct Repository {
    path: Box<Path>,
    git_dir: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: RefCell<Index>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: RefCell<Config>,
}

impl Repository {
    pub fn new(path: PathBuf, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }
        let path = path.canonicalize()?;

        let git_dir = match std::env::var_os("GIT_DIR") {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                if dir.is_absolute() { dir } else { path.join(dir) }
            }
            None => path.join(GIT_DIR),
        };

        if git_dir.exists() {
            // abandoned locks and temp objects from interrupted runs
            lockfile::sweep_stale(&git_dir);
        }

        let index = Index::new(git_dir.join(INDEX_FILE).into_boxed_path());
        let database = Database::new(git_dir.join(DATABASE_DIR).into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(git_dir.clone().into_boxed_path());
        let config = Config::load(&git_dir.join("config"))?;

        Ok(Repository {
            path: path.into_boxed_path(),
            git_dir: git_dir.into_boxed_path(),
            writer: RefCell::new(writer),
            index: RefCell::new(index),
            database,
            workspace,
            refs,
            config: RefCell::new(config),
        })
    }

    /// Open the repository at the current directory
    pub fn open_current(writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let pwd = std::env::current_dir()?;
        Repository::new(pwd, writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn writer(&self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> RefMut<'_, Index> {
        self.index.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> RefMut<'_, Config> {
        self.config.borrow_mut()
    }

    /// Fail unless `init` has run here
    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        if self.git_dir.join("HEAD").exists() {
            Ok(())
        } else {
            Err(GitError::not_found("repository", self.path.display().to_string()).into())
        }
    }

    /// The tree of the commit HEAD resolves to, `None` while unborn
    pub fn head_tree_oid(&self) -> anyhow::Result<Option<ObjectId>> {
        let Some(head_oid) = self.refs.read_head()? else {
            return Ok(None);
        };
        let commit = self
            .database
            .parse_object_as_commit(&head_oid)?
            .ok_or_else(|| anyhow::anyhow!("HEAD points at a non-commit {head_oid}"))?;
        Ok(Some(*commit.tree_oid()))
    }

    /// Author identity: environment first, then `user.*` config
    pub fn author(&self) -> anyhow::Result<Person> {
        Person::author_from_env().or_else(|_| self.config_ident())
    }

    /// Committer identity: environment first, then `user.*` config
    pub fn committer(&self) -> anyhow::Result<Person> {
        Person::committer_from_env().or_else(|_| self.config_ident())
    }

    /// Best-effort identity for reflog lines; never fails
    pub fn reflog_ident(&self) -> Person {
        self.committer()
            .unwrap_or_else(|_| Person::new("grit".to_string(), "grit@local".to_string()))
    }

    fn config_ident(&self) -> anyhow::Result<Person> {
        let config = self.config.borrow();
        let name = config.get("user", None, "name").map(str::to_string);
        let email = config.get("user", None, "email").map(str::to_string);

        match (name, email) {
            (Some(name), Some(email)) => Ok(Person::new(name, email)),
            _ => Err(GitError::InvalidArgument(
                "user identity not configured; set GIT_AUTHOR_NAME/GIT_AUTHOR_EMAIL or user.name/user.email"
                    .to_string(),
            )
            .into()),
        }
    }
}
