mod common;

use crate::common::command::{
    branch_tip, grit_commit, init_repository_dir, run_grit_command,
};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;

/// Scenario: main gains a commit only on the feature branch, so merging
/// fast-forwards without creating a merge commit.
#[rstest]
fn merge_fast_forwards_when_ours_is_the_base(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hello\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "first").assert().success();

    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hi\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "second").assert().success();

    run_grit_command(dir.path(), &["branch", "feat"])
        .assert()
        .success();
    run_grit_command(dir.path(), &["checkout", "feat"])
        .assert()
        .success();

    write_file(FileSpec::new(dir.path().join("b.txt"), "b".to_string()));
    run_grit_command(dir.path(), &["add", "b.txt"])
        .assert()
        .success();
    grit_commit(dir.path(), "feature work").assert().success();
    let feat_tip = branch_tip(dir.path(), "feat");

    run_grit_command(dir.path(), &["checkout", "main"])
        .assert()
        .success();
    assert!(!dir.path().join("b.txt").exists());

    run_grit_command(dir.path(), &["merge", "feat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fast-forward"));

    assert_eq!(branch_tip(dir.path(), "main"), feat_tip);
    assert_eq!(
        fs::read_to_string(dir.path().join("b.txt")).unwrap(),
        "b"
    );
}

/// Scenario: both branches edit the same line of hello.txt; the merge
/// stops with conflict markers and stage-1/2/3 index entries.
#[rstest]
fn merge_with_competing_edits_conflicts(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hello\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "first").assert().success();

    run_grit_command(dir.path(), &["branch", "feat"])
        .assert()
        .success();

    // main: hello.txt -> main\n
    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "main\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "main change").assert().success();

    // feat: hello.txt -> feat\n
    run_grit_command(dir.path(), &["checkout", "feat"])
        .assert()
        .success();
    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "feat\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "feat change").assert().success();

    run_grit_command(dir.path(), &["checkout", "main"])
        .assert()
        .success();
    run_grit_command(dir.path(), &["merge", "feat"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("CONFLICT"));

    let conflicted = fs::read_to_string(dir.path().join("hello.txt")).unwrap();
    assert_eq!(
        conflicted,
        "<<<<<<< ours\nmain\n=======\nfeat\n>>>>>>> theirs\n"
    );

    // the index holds the three conflict stages
    run_grit_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unmerged paths"))
        .stdout(predicate::str::contains("hello.txt"));

    // committing with unresolved conflicts is refused
    grit_commit(dir.path(), "premature")
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflicts"));

    // resolving and staging collapses the stages; the commit goes through
    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "resolved\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "hello.txt"])
        .assert()
        .success();
    grit_commit(dir.path(), "merged").assert().success();
}

/// Scenario: edits on different files merge cleanly into a merge commit
/// with both tips as parents.
#[rstest]
fn merge_of_disjoint_edits_succeeds(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("left.txt"),
        "initial\n".to_string(),
    ));
    write_file(FileSpec::new(
        dir.path().join("right.txt"),
        "initial\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "base").assert().success();

    run_grit_command(dir.path(), &["branch", "feature"])
        .assert()
        .success();

    write_file(FileSpec::new(
        dir.path().join("left.txt"),
        "initial\nmain change\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "main edit").assert().success();
    let main_tip = branch_tip(dir.path(), "main");

    run_grit_command(dir.path(), &["checkout", "feature"])
        .assert()
        .success();
    write_file(FileSpec::new(
        dir.path().join("right.txt"),
        "initial\nfeature change\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "feature edit").assert().success();
    let feature_tip = branch_tip(dir.path(), "feature");

    run_grit_command(dir.path(), &["checkout", "main"])
        .assert()
        .success();
    run_grit_command(dir.path(), &["merge", "feature"])
        .assert()
        .success();

    // both sides' edits landed in the working tree
    assert_eq!(
        fs::read_to_string(dir.path().join("left.txt")).unwrap(),
        "initial\nmain change\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("right.txt")).unwrap(),
        "initial\nfeature change\n"
    );

    // the merge commit has ours then theirs as parents
    let merge_tip = branch_tip(dir.path(), "main");
    let output = run_grit_command(dir.path(), &["cat-file", "-p", &merge_tip])
        .output()
        .unwrap();
    let body = String::from_utf8(output.stdout).unwrap();
    let parents: Vec<&str> = body
        .lines()
        .filter_map(|line| line.strip_prefix("parent "))
        .collect();
    assert_eq!(parents, vec![main_tip.as_str(), feature_tip.as_str()]);
}

/// Merging the same branch twice reports "already up to date".
#[rstest]
fn merge_is_idempotent(init_repository_dir: TempDir) {
    let dir = init_repository_dir;

    write_file(FileSpec::new(dir.path().join("a.txt"), "a\n".to_string()));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "only").assert().success();

    run_grit_command(dir.path(), &["branch", "twin"])
        .assert()
        .success();
    run_grit_command(dir.path(), &["merge", "twin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date."));
}
