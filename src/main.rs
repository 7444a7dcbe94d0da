#![allow(dead_code)]

use crate::areas::repository::Repository;
use anyhow::Result;
use clap::{Parser, Subcommand};

mod areas;
mod artifacts;
mod commands;

#[derive(Parser)]
#[command(
    name = "grit",
    version = "0.1.0",
    about = "A Git-compatible local version-control engine",
    long_about = "grit implements the storage and bookkeeping primitives of a \
    Git-compatible repository: a content-addressed object store, a staging \
    index, a named-reference namespace, and the three-way merge that ties \
    them together.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize a new repository")]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(about = "Add files or directories to the index")]
    Add {
        #[arg(index = 1, required = true, help = "The paths to stage")]
        paths: Vec<String>,
    },
    #[command(about = "Record a new commit from the staged content")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, help = "Allow recording a commit with nothing staged")]
        allow_empty: bool,
    },
    #[command(about = "Show the working tree status")]
    Status,
    #[command(about = "Show the commit history")]
    Log {
        #[arg(short = 'n', help = "Limit the number of commits shown")]
        limit: Option<usize>,
    },
    #[command(about = "List, create, or delete branches")]
    Branch {
        #[arg(index = 1, help = "Create a branch with this name")]
        name: Option<String>,
        #[arg(short, long, help = "List remote-tracking branches as well")]
        all: bool,
        #[arg(short, long, help = "Delete the named branch")]
        delete: Option<String>,
    },
    #[command(about = "Switch to a branch or commit")]
    Checkout {
        #[arg(index = 1, help = "Branch name or commit id")]
        target: String,
    },
    #[command(about = "Manage the set of tracked remotes")]
    Remote {
        #[command(subcommand)]
        action: Option<RemoteAction>,
    },
    #[command(about = "Download objects and refs from a remote")]
    Fetch {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
    },
    #[command(about = "Fetch and merge the tracked branch")]
    Pull {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
    },
    #[command(about = "Upload the current branch to a remote")]
    Push {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
        #[arg(long, help = "Allow a non-fast-forward update")]
        force: bool,
    },
    #[command(about = "Clone a repository into a new directory")]
    Clone {
        #[arg(index = 1, help = "The repository to clone from")]
        url: String,
        #[arg(index = 2, help = "The directory to clone into")]
        dest: String,
    },
    #[command(about = "Merge another branch into the current one")]
    Merge {
        #[arg(index = 1, help = "The branch to merge")]
        branch: String,
        #[arg(long, help = "Merge but stop before creating the commit")]
        no_commit: bool,
        #[arg(long, help = "Create a merge commit even when fast-forward is possible")]
        no_ff: bool,
        #[arg(short, long, help = "The merge commit message")]
        message: Option<String>,
    },
    #[command(about = "Write all reachable objects into a packfile")]
    Pack,
    #[command(about = "Repack reachable objects and retire loose copies")]
    Repack,
    #[command(about = "Remove unreachable objects past the safety window")]
    Gc,
    #[command(name = "cat-file", about = "Print the content of an object")]
    CatFile {
        #[arg(short = 'p', long, help = "The object id to print")]
        sha: String,
    },
    #[command(name = "hash-object", about = "Hash a file, optionally storing it")]
    HashObject {
        #[arg(short, long, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(name = "ls-tree", about = "List the entries of a tree object")]
    LsTree {
        #[arg(index = 1, help = "The tree (or commit) id")]
        sha: String,
    },
}

#[derive(Subcommand)]
enum RemoteAction {
    #[command(about = "Add a remote")]
    Add {
        #[arg(index = 1)]
        name: String,
        #[arg(index = 2)]
        url: String,
    },
    #[command(about = "Remove a remote")]
    Remove {
        #[arg(index = 1)]
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let stdout = || Box::new(std::io::stdout()) as Box<dyn std::io::Write>;

    match &cli.command {
        Commands::Init { path } => {
            let mut repository = match path {
                Some(path) => Repository::new(path.into(), stdout())?,
                None => Repository::open_current(stdout())?,
            };
            repository.init()
        }
        Commands::Add { paths } => Repository::open_current(stdout())?.add(paths),
        Commands::Commit {
            message,
            allow_empty,
        } => {
            Repository::open_current(stdout())?.commit(message, *allow_empty)?;
            Ok(())
        }
        Commands::Status => Repository::open_current(stdout())?.status(),
        Commands::Log { limit } => Repository::open_current(stdout())?.log(*limit),
        Commands::Branch { name, all, delete } => {
            let mut repository = Repository::open_current(stdout())?;
            match (name, delete) {
                (_, Some(victim)) => repository.branch_delete(victim),
                (Some(name), None) => repository.branch_create(name),
                (None, None) => repository.branch_list(*all),
            }
        }
        Commands::Checkout { target } => Repository::open_current(stdout())?.checkout(target),
        Commands::Remote { action } => {
            let mut repository = Repository::open_current(stdout())?;
            match action {
                Some(RemoteAction::Add { name, url }) => repository.remote_add(name, url),
                Some(RemoteAction::Remove { name }) => repository.remote_remove(name),
                None => repository.remote_list(),
            }
        }
        Commands::Fetch { remote } => Repository::open_current(stdout())?.fetch(remote),
        Commands::Pull { remote } => Repository::open_current(stdout())?.pull(remote),
        Commands::Push { remote, force } => {
            Repository::open_current(stdout())?.push(remote, *force)
        }
        Commands::Clone { url, dest } => {
            Repository::clone_from(url, dest, stdout())?;
            Ok(())
        }
        Commands::Merge {
            branch,
            no_commit,
            no_ff,
            message,
        } => {
            use crate::artifacts::merge::MergeStatus;

            let mut repository = Repository::open_current(stdout())?;
            let result = repository.merge(branch, *no_commit, *no_ff, message.as_deref())?;
            if result.status == MergeStatus::Conflicts {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Pack => Repository::open_current(stdout())?.pack(),
        Commands::Repack => Repository::open_current(stdout())?.repack(),
        Commands::Gc => Repository::open_current(stdout())?.gc(),
        Commands::CatFile { sha } => Repository::open_current(stdout())?.cat_file(sha),
        Commands::HashObject { write, file } => {
            Repository::open_current(stdout())?.hash_object(file, *write)
        }
        Commands::LsTree { sha } => Repository::open_current(stdout())?.ls_tree(sha),
    }
}
