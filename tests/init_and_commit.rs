mod common;

use crate::common::command::{
    branch_tip, grit_commit_fixed, init_repository_dir, read_git_file, repository_dir,
    run_grit_command,
};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use predicates::prelude::*;
use rstest::rstest;

#[rstest]
fn init_creates_the_gitdir_skeleton(repository_dir: TempDir) {
    let dir = repository_dir;

    run_grit_command(dir.path(), &["init"]).assert().success();

    assert_eq!(read_git_file(dir.path(), "HEAD"), "ref: refs/heads/main");
    for sub in ["objects", "objects/pack", "refs/heads", "refs/tags", "logs"] {
        assert!(dir.path().join(".git").join(sub).is_dir(), "missing {sub}");
    }

    // re-running init must not clobber anything
    run_grit_command(dir.path(), &["init"]).assert().success();
    assert_eq!(read_git_file(dir.path(), "HEAD"), "ref: refs/heads/main");
}

#[rstest]
fn first_commit_produces_deterministic_objects(init_repository_dir: TempDir) {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hello\n".to_string(),
    ));

    // the blob id of `hello\n` is pinned by the object encoding
    run_grit_command(dir.path(), &["hash-object", "hello.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ce013625030ba8dba906f756967f9e9ca394464a",
        ));

    run_grit_command(dir.path(), &["add", "hello.txt"])
        .assert()
        .success();
    grit_commit_fixed(dir.path(), "first").assert().success();

    // HEAD stays symbolic and the branch now has a tip
    assert_eq!(read_git_file(dir.path(), "HEAD"), "ref: refs/heads/main");
    let tip = branch_tip(dir.path(), "main");
    assert_eq!(tip.len(), 40);

    // one reflog entry, created from the all-zeros id
    let head_log = read_git_file(dir.path(), "logs/HEAD");
    let lines: Vec<&str> = head_log.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&"0".repeat(40)));
    assert!(lines[0].contains(&tip));
    assert!(lines[0].ends_with("commit (initial): first"));

    // same inputs, same commit id
    let replay = TempDir::new().unwrap();
    run_grit_command(replay.path(), &["init"]).assert().success();
    write_file(FileSpec::new(
        replay.path().join("hello.txt"),
        "hello\n".to_string(),
    ));
    run_grit_command(replay.path(), &["add", "hello.txt"])
        .assert()
        .success();
    grit_commit_fixed(replay.path(), "first").assert().success();

    assert_eq!(branch_tip(replay.path(), "main"), tip);
}

#[rstest]
fn two_commit_log_lists_newest_first(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hello\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "hello.txt"])
        .assert()
        .success();
    grit_commit_fixed(dir.path(), "first").assert().success();
    let first = branch_tip(dir.path(), "main");

    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hi\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "hello.txt"])
        .assert()
        .success();
    // a later timestamp keeps the walk ordering honest
    let mut commit = run_grit_command(dir.path(), &["commit", "-m", "second"]);
    commit.envs(vec![
        ("GIT_AUTHOR_NAME", "A"),
        ("GIT_AUTHOR_EMAIL", "a@x"),
        ("GIT_AUTHOR_DATE", "1700000100 +0000"),
    ]);
    commit.assert().success();
    let second = branch_tip(dir.path(), "main");

    let output = run_grit_command(dir.path(), &["log", "-n", "10"])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();

    let first_pos = stdout.find(&first).expect("first commit in log");
    let second_pos = stdout.find(&second).expect("second commit in log");
    assert!(second_pos < first_pos, "newest commit must come first");
    assert!(stdout.contains("second"));
    assert!(stdout.contains("first"));

    // the second commit records the first as its parent
    run_grit_command(dir.path(), &["cat-file", "-p", &second])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("parent {first}")));
}

#[rstest]
fn commit_without_changes_is_rejected(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(dir.path().join("a.txt"), "a\n".to_string()));
    run_grit_command(dir.path(), &["add", "a.txt"])
        .assert()
        .success();
    grit_commit_fixed(dir.path(), "first").assert().success();

    grit_commit_fixed(dir.path(), "empty")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing staged"));

    grit_commit_fixed(dir.path(), "allowed empty")
        .env("GIT_AUTHOR_DATE", "1700000200 +0000")
        .arg("--allow-empty")
        .assert()
        .success();
}

#[rstest]
fn status_reports_staged_and_untracked(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("staged.txt"),
        "s\n".to_string(),
    ));
    write_file(FileSpec::new(
        dir.path().join("loose.txt"),
        "l\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "staged.txt"])
        .assert()
        .success();

    run_grit_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("On branch main"))
        .stdout(predicate::str::contains("staged.txt"))
        .stdout(predicate::str::contains("loose.txt"));
}
