use assert_cmd::Command;
use assert_fs::TempDir;
use derive_new::new;
use rstest::fixture;
use std::path::Path;

/// A pinned identity for scenarios that assert deterministic object ids
pub const FIXED_NAME: &str = "A";
pub const FIXED_EMAIL: &str = "a@x";
pub const FIXED_DATE: &str = "1700000000 +0000";

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_grit_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    repository_dir
}

pub fn run_grit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("grit").expect("Failed to find grit binary");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

#[derive(Debug, Clone, new)]
struct RandomAuthor {
    name: String,
    email: String,
}

fn generate_random_author() -> RandomAuthor {
    use fake::Fake;
    use fake::faker::internet::en::FreeEmail;
    use fake::faker::name::en::Name;

    let name = Name().fake::<String>().replace(' ', "_");
    let email = FreeEmail().fake::<String>();
    RandomAuthor::new(name, email)
}

/// Commit with a random author identity
pub fn grit_commit(dir: &Path, message: &str) -> Command {
    let author = generate_random_author();
    let mut cmd = run_grit_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", author.name.as_str()),
        ("GIT_AUTHOR_EMAIL", author.email.as_str()),
    ]);
    cmd
}

/// Commit with the pinned identity and timestamp, for reproducible ids
pub fn grit_commit_fixed(dir: &Path, message: &str) -> Command {
    let mut cmd = run_grit_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", FIXED_NAME),
        ("GIT_AUTHOR_EMAIL", FIXED_EMAIL),
        ("GIT_AUTHOR_DATE", FIXED_DATE),
        ("GIT_COMMITTER_NAME", FIXED_NAME),
        ("GIT_COMMITTER_EMAIL", FIXED_EMAIL),
        ("GIT_COMMITTER_DATE", FIXED_DATE),
    ]);
    cmd
}

/// Read a ref file under `.git`, trimmed
pub fn read_git_file(dir: &Path, relative: &str) -> String {
    let path = dir.join(".git").join(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("unable to read {}", path.display()))
        .trim_end()
        .to_string()
}

/// The current tip of a branch
pub fn branch_tip(dir: &Path, branch: &str) -> String {
    read_git_file(dir, &format!("refs/heads/{branch}"))
}
