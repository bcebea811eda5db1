//! Shared test helpers for git-replay integration tests.
//!
//! All tests use temp directories, with fixtures built through the git CLI.
//! Commit timestamps are pinned so history order is deterministic.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use replay_git::{GitOid, GixRepo, Signature};
use tempfile::TempDir;

/// Run git in `dir`, assert it succeeds, and return trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = git_in(dir, args);
    assert!(
        out.status.success(),
        "git {} failed:\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    String::from_utf8_lossy(&out.stdout).trim().to_owned()
}

/// Run git in `dir`, assert it succeeds, and return raw stdout.
pub fn git_bytes(dir: &Path, args: &[&str]) -> Vec<u8> {
    let out = git_in(dir, args);
    assert!(
        out.status.success(),
        "git {} failed:\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr),
    );
    out.stdout
}

/// Run git in `dir` without checking the exit status.
pub fn git_in(dir: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")))
}

/// A fresh repository on `main` with an identity configured.
pub fn setup_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    git(dir.path(), &["init", "-q", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    dir
}

pub fn open(dir: &Path) -> GixRepo {
    GixRepo::open(dir).expect("failed to open repo")
}

/// Write `content` to `file`, stage it, and commit at `time`.
pub fn commit_file(dir: &Path, file: &str, content: &str, message: &str, time: i64) -> GitOid {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    commit_staged(dir, message, time)
}

/// Commit whatever is staged at `time`.
pub fn commit_staged(dir: &Path, message: &str, time: i64) -> GitOid {
    let date = format!("@{time} +0000");
    let out = Command::new("git")
        .args(["commit", "-q", "-m", message])
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    rev(dir, "HEAD")
}

pub fn rev(dir: &Path, spec: &str) -> GitOid {
    git(dir, &["rev-parse", spec]).parse().unwrap()
}

pub fn sig() -> Signature {
    Signature::now("Replay Tester", "replay@test.com")
}

/// A `topic` branch three commits ahead of the merge base, and `main` one
/// commit ahead of it. `topic` is checked out.
pub struct Diverged {
    pub dir: TempDir,
    pub base: GitOid,
    pub topic: Vec<GitOid>,
    pub main: GitOid,
}

/// Build [`Diverged`]. `main_change` lets a test pick main's extra commit as
/// `(file, content)`.
pub fn diverged_with(main_change: (&str, &str)) -> Diverged {
    let dir = setup_repo();
    let path = dir.path();
    let base = commit_file(path, "a.txt", "base\n", "base", 1_000);

    git(path, &["checkout", "-q", "-b", "topic"]);
    let topic = vec![
        commit_file(path, "t1.txt", "one\n", "topic one", 2_000),
        commit_file(path, "t2.txt", "two\n", "topic two", 3_000),
        commit_file(path, "t3.txt", "three\n", "topic three", 4_000),
    ];

    git(path, &["checkout", "-q", "main"]);
    let main = commit_file(path, main_change.0, main_change.1, "main work", 5_000);
    git(path, &["checkout", "-q", "topic"]);

    Diverged {
        dir,
        base,
        topic,
        main,
    }
}

pub fn diverged() -> Diverged {
    diverged_with(("m.txt", "main\n"))
}

/// Run the git-replay binary in `dir`.
pub fn replay_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_git-replay"))
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env_remove("GIT_REPLAY_NAME")
        .env_remove("GIT_REPLAY_EMAIL")
        .output()
        .expect("failed to execute git-replay")
}

/// Run git-replay and assert it succeeds. Returns stdout.
pub fn replay_ok(dir: &Path, args: &[&str]) -> String {
    let out = replay_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "git-replay {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run git-replay and assert it fails. Returns stderr.
pub fn replay_fails(dir: &Path, args: &[&str]) -> String {
    let out = replay_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected git-replay {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
