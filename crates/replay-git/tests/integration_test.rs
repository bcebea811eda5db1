use std::path::Path;

use tempfile::TempDir;

use replay_git::{
    BString, ChangeType, CheckoutStrategy, FileStatus, GitError, GitOid, GitRepo, GitTime,
    GixRepo, MergeLabels, NewCommit, RefEdit, RefName, Signature,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn git(dir: &Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).unwrap().trim().to_owned()
}

/// Run git and return its raw stdout, for objects that are not UTF-8.
fn git_bytes(dir: &Path, args: &[&str]) -> Vec<u8> {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    out.stdout
}

fn setup_repo() -> (TempDir, GixRepo) {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    let repo = GixRepo::open(dir.path()).unwrap();
    (dir, repo)
}

/// Write `content` to `file`, stage it, and commit with `message` at a fixed
/// timestamp so history order is deterministic.
fn commit_file(dir: &Path, file: &str, content: &str, message: &str, time: i64) -> GitOid {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    let date = format!("@{time} +0000");
    let out = std::process::Command::new("git")
        .args(["commit", "-q", "-m", message])
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    git(dir, &["rev-parse", "HEAD"]).parse().unwrap()
}

fn tree_of(dir: &Path, rev: &str) -> GitOid {
    git(dir, &["rev-parse", &format!("{rev}^{{tree}}")]).parse().unwrap()
}

fn labels() -> MergeLabels {
    MergeLabels {
        ancestor: "ancestor".to_owned(),
        ours: "main".to_owned(),
        theirs: "topic change".to_owned(),
    }
}

fn sig(name: &str) -> Signature {
    Signature {
        name: name.into(),
        email: format!("{name}@example.com").into(),
        when: GitTime {
            seconds: 1_600_000_000,
            offset_seconds: 0,
        },
    }
}

// ===========================================================================
// 1. Repository + objects
// ===========================================================================

#[test]
fn open_repo_reports_dirs() {
    let (dir, repo) = setup_repo();
    assert!(!repo.is_bare());
    assert!(repo.git_dir().ends_with(".git"));
    assert_eq!(
        repo.workdir().unwrap().canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
fn rev_parse_unborn_head_is_not_found() {
    let (_dir, repo) = setup_repo();
    assert!(matches!(repo.rev_parse("HEAD"), Err(GitError::NotFound { .. })));
}

#[test]
fn read_commit_parses_identity_and_message() {
    let (dir, repo) = setup_repo();
    let oid = commit_file(dir.path(), "a.txt", "a\n", "first line\n\nbody", 1_000);
    let info = repo.read_commit(oid).unwrap();
    assert_eq!(info.oid, oid);
    assert_eq!(info.tree_oid, tree_of(dir.path(), "HEAD"));
    assert!(info.parents.is_empty());
    assert_eq!(info.author.name, "Test User");
    assert_eq!(info.author.email, "test@test.com");
    assert_eq!(info.author.when.seconds, 1_000);
    assert_eq!(info.summary(), "first line");
    assert!(info.encoding.is_none());
}

#[test]
fn create_commit_keeps_author_and_encoding() {
    let (dir, repo) = setup_repo();
    let parent = commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let commit = repo
        .create_commit(&NewCommit {
            tree: tree_of(dir.path(), "HEAD"),
            parents: vec![parent],
            author: sig("alice"),
            committer: sig("bob"),
            encoding: Some("ISO-8859-1".into()),
            message: "rewritten\n".into(),
        })
        .unwrap();
    let info = repo.read_commit(commit).unwrap();
    assert_eq!(info.parents, vec![parent]);
    assert_eq!(info.author, sig("alice"));
    assert_eq!(info.committer, sig("bob"));
    assert_eq!(info.encoding, Some("ISO-8859-1".into()));
    assert_eq!(info.message, "rewritten\n");
    // git itself must accept the object.
    git(dir.path(), &["cat-file", "-e", &commit.to_string()]);
}

#[test]
fn legacy_encoded_commit_is_copied_byte_for_byte() {
    let (dir, repo) = setup_repo();
    std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
    git(dir.path(), &["add", "a.txt"]);
    std::fs::write(dir.path().join("msg"), b"caf\xe9 latin1\n").unwrap();
    git(
        dir.path(),
        &[
            "-c",
            "i18n.commitEncoding=ISO-8859-1",
            "-c",
            "user.name=Ren\u{e9}e",
            "commit",
            "-q",
            "-F",
            "msg",
        ],
    );
    let original: GitOid = git(dir.path(), &["rev-parse", "HEAD"]).parse().unwrap();

    let info = repo.read_commit(original).unwrap();
    assert_eq!(info.message, &b"caf\xe9 latin1\n"[..]);
    assert_eq!(info.encoding, Some(BString::from("ISO-8859-1")));

    let copy = repo
        .create_commit(&NewCommit {
            tree: info.tree_oid,
            parents: info.parents.clone(),
            author: info.author.clone(),
            committer: info.committer.clone(),
            encoding: info.encoding.clone(),
            message: info.message.clone(),
        })
        .unwrap();
    // Same content, same identities: git must compute the same object id.
    assert_eq!(copy, original);
    assert_eq!(
        git_bytes(dir.path(), &["cat-file", "commit", &copy.to_string()]),
        git_bytes(dir.path(), &["cat-file", "commit", &original.to_string()])
    );
}

// ===========================================================================
// 2. Refs
// ===========================================================================

#[test]
fn head_name_symbolic_and_detached() {
    let (dir, repo) = setup_repo();
    let oid = commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    assert_eq!(
        repo.head_name().unwrap(),
        Some(RefName::branch("main").unwrap())
    );

    repo.write_ref(&RefName::head(), oid, "detach").unwrap();
    assert_eq!(repo.head_name().unwrap(), None);
    assert_eq!(repo.rev_parse("HEAD").unwrap(), oid);

    repo.write_symbolic_ref(&RefName::head(), &RefName::branch("main").unwrap(), "reattach")
        .unwrap();
    assert_eq!(git(dir.path(), &["symbolic-ref", "HEAD"]), "refs/heads/main");
}

#[test]
fn atomic_ref_update_detects_stale_expectation() {
    let (dir, repo) = setup_repo();
    let first = commit_file(dir.path(), "a.txt", "a\n", "one", 1_000);
    let second = commit_file(dir.path(), "a.txt", "b\n", "two", 2_000);
    let main = RefName::branch("main").unwrap();

    let err = repo
        .atomic_ref_update(&[RefEdit {
            name: main.clone(),
            new_oid: first,
            expected_old_oid: first,
            log_message: "stale".to_owned(),
        }])
        .unwrap_err();
    assert!(matches!(err, GitError::RefConflict { .. }), "{err}");
    assert_eq!(repo.read_ref(&main).unwrap(), Some(second));

    repo.atomic_ref_update(&[RefEdit {
        name: main.clone(),
        new_oid: first,
        expected_old_oid: second,
        log_message: "rewind".to_owned(),
    }])
    .unwrap();
    assert_eq!(repo.read_ref(&main).unwrap(), Some(first));
}

#[test]
fn atomic_ref_update_zero_means_must_not_exist() {
    let (dir, repo) = setup_repo();
    let oid = commit_file(dir.path(), "a.txt", "a\n", "one", 1_000);
    let err = repo
        .atomic_ref_update(&[RefEdit {
            name: RefName::branch("main").unwrap(),
            new_oid: oid,
            expected_old_oid: GitOid::ZERO,
            log_message: "create".to_owned(),
        }])
        .unwrap_err();
    assert!(matches!(err, GitError::RefConflict { .. }));
}

// ===========================================================================
// 3. History
// ===========================================================================

#[test]
fn walk_commits_is_oldest_first_and_hides_upstream() {
    let (dir, repo) = setup_repo();
    let base = commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let c1 = commit_file(dir.path(), "b.txt", "1\n", "c1", 2_000);
    let c2 = commit_file(dir.path(), "b.txt", "2\n", "c2", 3_000);
    let c3 = commit_file(dir.path(), "b.txt", "3\n", "c3", 4_000);

    let all = repo.walk_commits(&[c3], &[]).unwrap();
    assert_eq!(all, vec![base, c1, c2, c3]);

    let ahead = repo.walk_commits(&[c3], &[base]).unwrap();
    assert_eq!(ahead, vec![c1, c2, c3]);

    assert!(repo.walk_commits(&[c3], &[c3]).unwrap().is_empty());
}

// ===========================================================================
// 4. Merge + checkout + index
// ===========================================================================

#[test]
fn merge_trees_clean() {
    let (dir, repo) = setup_repo();
    commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let base_tree = tree_of(dir.path(), "HEAD");
    commit_file(dir.path(), "b.txt", "b\n", "ours", 2_000);
    let ours = tree_of(dir.path(), "HEAD");
    git(dir.path(), &["checkout", "-q", "-b", "topic", "HEAD~1"]);
    commit_file(dir.path(), "c.txt", "c\n", "theirs", 3_000);
    let theirs = tree_of(dir.path(), "HEAD");

    let outcome = repo
        .merge_trees(Some(base_tree), ours, theirs, &labels())
        .unwrap();
    assert!(!outcome.has_conflicts());
    assert_eq!(
        git(dir.path(), &["ls-tree", "--name-only", &outcome.tree.to_string()]),
        "a.txt\nb.txt\nc.txt"
    );
    assert!(outcome.entries.iter().all(|e| e.stage == 0));
}

#[test]
fn merge_conflict_is_materialized_with_stages() {
    let (dir, repo) = setup_repo();
    commit_file(dir.path(), "a.txt", "base\n", "base", 1_000);
    let base_tree = tree_of(dir.path(), "HEAD");
    commit_file(dir.path(), "a.txt", "ours\n", "ours", 2_000);
    let ours = tree_of(dir.path(), "HEAD");
    git(dir.path(), &["checkout", "-q", "-b", "topic", "HEAD~1"]);
    commit_file(dir.path(), "a.txt", "theirs\n", "theirs", 3_000);
    let theirs = tree_of(dir.path(), "HEAD");
    git(dir.path(), &["checkout", "-q", "main"]);

    let outcome = repo
        .merge_trees(Some(base_tree), ours, theirs, &labels())
        .unwrap();
    assert_eq!(outcome.conflicts, vec!["a.txt".to_owned()]);

    repo.checkout_merge(&outcome, CheckoutStrategy::Safe).unwrap();
    assert_eq!(repo.index_conflicts().unwrap(), vec!["a.txt".to_owned()]);

    let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
    assert!(content.contains("<<<<<<< main"), "{content}");
    assert!(content.contains(">>>>>>> topic change"), "{content}");

    let stages: Vec<u8> = outcome.entries.iter().map(|e| e.stage).collect();
    assert_eq!(stages, vec![1, 2, 3]);
    let staged = git(dir.path(), &["ls-files", "--stage"]);
    assert_eq!(staged.lines().count(), 3, "{staged}");
}

#[test]
fn checkout_merge_safe_refuses_dirty_worktree() {
    let (dir, repo) = setup_repo();
    commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let tree = tree_of(dir.path(), "HEAD");
    std::fs::write(dir.path().join("a.txt"), "local edit\n").unwrap();

    let outcome = repo.merge_trees(Some(tree), tree, tree, &labels()).unwrap();
    let err = repo
        .checkout_merge(&outcome, CheckoutStrategy::Safe)
        .unwrap_err();
    assert!(matches!(err, GitError::DirtyWorktree { .. }));

    repo.checkout_merge(&outcome, CheckoutStrategy::Force).unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "a\n"
    );
}

#[test]
fn index_tree_and_staged_diff() {
    let (dir, repo) = setup_repo();
    commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let head_tree = tree_of(dir.path(), "HEAD");
    assert_eq!(repo.write_index_tree().unwrap(), head_tree);
    assert!(repo.diff_tree_to_index(Some(head_tree)).unwrap().is_empty());

    std::fs::write(dir.path().join("a.txt"), "changed\n").unwrap();
    std::fs::write(dir.path().join("new.txt"), "new\n").unwrap();
    // The untracked file is not an unstaged change.
    let unstaged = repo.diff_index_to_workdir().unwrap();
    assert_eq!(unstaged.len(), 1);
    assert_eq!(unstaged[0].path, "a.txt");
    assert_eq!(unstaged[0].status, FileStatus::Modified);

    git(dir.path(), &["add", "a.txt"]);
    let staged = repo.diff_tree_to_index(Some(head_tree)).unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].change_type, ChangeType::Modified);
}

#[test]
fn reset_hard_moves_branch_and_worktree() {
    let (dir, repo) = setup_repo();
    let first = commit_file(dir.path(), "a.txt", "one\n", "one", 1_000);
    commit_file(dir.path(), "b.txt", "two\n", "two", 2_000);

    repo.reset_hard(first, "reset: moving").unwrap();
    assert_eq!(
        repo.read_ref(&RefName::branch("main").unwrap()).unwrap(),
        Some(first)
    );
    assert!(!dir.path().join("b.txt").exists());
    assert_eq!(git(dir.path(), &["status", "--porcelain"]), "");
}

#[test]
fn checkout_head_force_follows_detached_head() {
    let (dir, repo) = setup_repo();
    let first = commit_file(dir.path(), "a.txt", "one\n", "one", 1_000);
    commit_file(dir.path(), "a.txt", "two\n", "two", 2_000);
    std::fs::write(dir.path().join("untracked.txt"), "keep\n").unwrap();

    repo.write_ref(&RefName::head(), first, "detach").unwrap();
    repo.checkout_head_force().unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "one\n"
    );
    assert!(dir.path().join("untracked.txt").exists());
    assert_eq!(
        git(dir.path(), &["status", "--porcelain", "--untracked-files=no"]),
        ""
    );
}

#[cfg(unix)]
#[test]
fn non_utf8_paths_are_kept_in_index_and_merge() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (dir, repo) = setup_repo();
    commit_file(dir.path(), "a.txt", "a\n", "base", 1_000);
    let base_tree = tree_of(dir.path(), "HEAD");
    commit_file(dir.path(), "b.txt", "b\n", "ours", 2_000);
    let ours = tree_of(dir.path(), "HEAD");

    git(dir.path(), &["checkout", "-q", "-b", "topic", "HEAD~1"]);
    let name = OsStr::from_bytes(b"caf\xe9.txt");
    std::fs::write(dir.path().join(name), "latin1\n").unwrap();
    let status = std::process::Command::new("git")
        .arg("add")
        .arg(name)
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
    git(dir.path(), &["commit", "-q", "-m", "theirs"]);
    let head_tree = tree_of(dir.path(), "HEAD");

    // A clean checkout containing the file has no staged or unstaged changes.
    assert_eq!(repo.write_index_tree().unwrap(), head_tree);
    assert!(repo.diff_tree_to_index(Some(head_tree)).unwrap().is_empty());
    assert!(repo.diff_index_to_workdir().unwrap().is_empty());

    git(dir.path(), &["checkout", "-q", "main"]);
    let outcome = repo
        .merge_trees(Some(base_tree), ours, head_tree, &labels())
        .unwrap();
    assert!(!outcome.has_conflicts());
    assert!(
        outcome
            .entries
            .iter()
            .any(|e| e.path == &b"caf\xe9.txt"[..])
    );

    repo.checkout_merge(&outcome, CheckoutStrategy::Safe).unwrap();
    assert_eq!(repo.write_index_tree().unwrap(), outcome.tree);
    assert!(dir.path().join(name).exists());
    assert!(repo.diff_index_to_workdir().unwrap().is_empty());
}

// ===========================================================================
// 5. Notes + config
// ===========================================================================

#[test]
fn notes_roundtrip_and_no_overwrite() {
    let (dir, repo) = setup_repo();
    let a = commit_file(dir.path(), "a.txt", "a\n", "a", 1_000);
    let b = commit_file(dir.path(), "b.txt", "b\n", "b", 2_000);
    let notes = RefName::new("refs/notes/commits").unwrap();

    git(dir.path(), &["notes", "add", "-m", "from git", &a.to_string()]);
    let note = repo.read_note(&notes, a).unwrap().unwrap();
    assert_eq!(note.message, "from git\n");
    assert!(repo.read_note(&notes, b).unwrap().is_none());

    repo.write_note(&notes, b, &note.author, &sig("replayer"), &note.message, false)
        .unwrap();
    assert_eq!(
        git(dir.path(), &["notes", "show", &b.to_string()]),
        "from git"
    );

    let err = repo
        .write_note(&notes, b, &sig("x"), &sig("x"), b"again", false)
        .unwrap_err();
    assert!(matches!(err, GitError::AlreadyExists { .. }));
}

#[test]
fn binary_note_is_copied_unchanged() {
    let (dir, repo) = setup_repo();
    let a = commit_file(dir.path(), "a.txt", "a\n", "a", 1_000);
    let b = commit_file(dir.path(), "b.txt", "b\n", "b", 2_000);
    let notes = RefName::new("refs/notes/commits").unwrap();
    let payload: &[u8] = b"caf\xe9\x00\xff\n";
    std::fs::write(dir.path().join("note.bin"), payload).unwrap();
    // `-C` stores the blob verbatim; `-F` would clean it up first.
    let blob = git(dir.path(), &["hash-object", "-w", "note.bin"]);
    git(dir.path(), &["notes", "add", "-C", &blob, &a.to_string()]);

    let note = repo.read_note(&notes, a).unwrap().unwrap();
    assert_eq!(note.message, payload);

    repo.write_note(&notes, b, &note.author, &sig("replayer"), &note.message, false)
        .unwrap();
    assert_eq!(
        git_bytes(dir.path(), &["cat-file", "blob", &format!("refs/notes/commits:{b}")]),
        payload
    );
}

#[test]
fn config_reads() {
    let (dir, repo) = setup_repo();
    git(dir.path(), &["config", "notes.rewriteRef", "refs/notes/commits"]);
    git(dir.path(), &["config", "notes.rewrite.rebase", "false"]);
    let repo_reopened = GixRepo::open(dir.path()).unwrap();
    drop(repo);

    assert_eq!(
        repo_reopened.read_config("user.name").unwrap().as_deref(),
        Some("Test User")
    );
    assert_eq!(
        repo_reopened.read_config("notes.rewriteRef").unwrap().as_deref(),
        Some("refs/notes/commits")
    );
    assert_eq!(
        repo_reopened.read_config_bool("notes.rewrite.rebase").unwrap(),
        Some(false)
    );
    assert_eq!(repo_reopened.read_config_bool("no.such.key").unwrap(), None);
}
