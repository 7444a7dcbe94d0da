mod common;

use crate::common::command::{branch_tip, grit_commit, repository_dir, run_grit_command};
use crate::common::file::{FileSpec, write_file};
use assert_fs::TempDir;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;

fn seeded_repository(dir: &TempDir) {
    run_grit_command(dir.path(), &["init"]).assert().success();
    write_file(FileSpec::new(
        dir.path().join("hello.txt"),
        "hello\n".to_string(),
    ));
    write_file(FileSpec::new(
        dir.path().join("docs").join("readme.md"),
        "# readme\n".to_string(),
    ));
    run_grit_command(dir.path(), &["add", "."]).assert().success();
    grit_commit(dir.path(), "seed").assert().success();
}

#[rstest]
fn clone_copies_history_and_checks_out(repository_dir: TempDir) {
    let upstream = repository_dir;
    seeded_repository(&upstream);
    let upstream_tip = branch_tip(upstream.path(), "main");

    let workdir = TempDir::new().unwrap();
    let dest = workdir.path().join("cloned");
    let url = upstream.path().display().to_string();
    let dest_arg = dest.display().to_string();
    run_grit_command(workdir.path(), &["clone", &url, &dest_arg])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dest.join("hello.txt")).unwrap(),
        "hello\n"
    );
    assert_eq!(
        fs::read_to_string(dest.join("docs").join("readme.md")).unwrap(),
        "# readme\n"
    );
    assert_eq!(branch_tip(&dest, "main"), upstream_tip);

    // the clone's history is intact
    run_grit_command(&dest, &["log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seed"));
}

#[rstest]
fn push_advances_the_remote_branch(repository_dir: TempDir) {
    let upstream = repository_dir;
    seeded_repository(&upstream);

    let workdir = TempDir::new().unwrap();
    let dest = workdir.path().join("cloned");
    let url = upstream.path().display().to_string();
    let dest_arg = dest.display().to_string();
    run_grit_command(workdir.path(), &["clone", &url, &dest_arg])
        .assert()
        .success();

    write_file(FileSpec::new(dest.join("new.txt"), "new\n".to_string()));
    run_grit_command(&dest, &["add", "new.txt"]).assert().success();
    grit_commit(&dest, "downstream work").assert().success();
    let local_tip = branch_tip(&dest, "main");

    run_grit_command(&dest, &["push", "origin"])
        .assert()
        .success();

    assert_eq!(branch_tip(upstream.path(), "main"), local_tip);
    run_grit_command(upstream.path(), &["cat-file", "-p", &local_tip])
        .assert()
        .success()
        .stdout(predicate::str::contains("downstream work"));
}

#[rstest]
fn pull_fast_forwards_from_the_remote(repository_dir: TempDir) {
    let upstream = repository_dir;
    seeded_repository(&upstream);

    let workdir = TempDir::new().unwrap();
    let dest = workdir.path().join("cloned");
    let url = upstream.path().display().to_string();
    let dest_arg = dest.display().to_string();
    run_grit_command(workdir.path(), &["clone", &url, &dest_arg])
        .assert()
        .success();

    // upstream moves forward
    write_file(FileSpec::new(
        upstream.path().join("hello.txt"),
        "hello again\n".to_string(),
    ));
    run_grit_command(upstream.path(), &["add", "."]).assert().success();
    grit_commit(upstream.path(), "upstream work").assert().success();
    let upstream_tip = branch_tip(upstream.path(), "main");

    run_grit_command(&dest, &["pull", "origin"])
        .assert()
        .success();

    assert_eq!(branch_tip(&dest, "main"), upstream_tip);
    assert_eq!(
        fs::read_to_string(dest.join("hello.txt")).unwrap(),
        "hello again\n"
    );
}

#[rstest]
fn push_to_a_diverged_remote_is_rejected(repository_dir: TempDir) {
    let upstream = repository_dir;
    seeded_repository(&upstream);

    let workdir = TempDir::new().unwrap();
    let dest = workdir.path().join("cloned");
    let url = upstream.path().display().to_string();
    let dest_arg = dest.display().to_string();
    run_grit_command(workdir.path(), &["clone", &url, &dest_arg])
        .assert()
        .success();

    // both sides commit independently
    write_file(FileSpec::new(
        upstream.path().join("upstream.txt"),
        "u\n".to_string(),
    ));
    run_grit_command(upstream.path(), &["add", "."]).assert().success();
    grit_commit(upstream.path(), "upstream diverges").assert().success();

    write_file(FileSpec::new(dest.join("local.txt"), "l\n".to_string()));
    run_grit_command(&dest, &["add", "."]).assert().success();
    grit_commit(&dest, "local diverges").assert().success();

    run_grit_command(&dest, &["push", "origin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-fast-forward"));

    // --force overrides
    run_grit_command(&dest, &["push", "origin", "--force"])
        .assert()
        .success();
    assert_eq!(
        branch_tip(upstream.path(), "main"),
        branch_tip(&dest, "main")
    );
}
