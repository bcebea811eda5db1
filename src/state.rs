//! Persisted rebase state.
//!
//! An in-progress rebase lives entirely in a directory under the git dir.
//! Only `rebase-merge/` is driven by this crate; `rebase-apply/` (and a
//! `rebase-merge/` carrying an `interactive` marker) is recognized so it can
//! be refused instead of misread.
//!
//! # Layout of `rebase-merge/`
//!
//! | File        | Contents                                        |
//! |-------------|-------------------------------------------------|
//! | `head-name` | original branch ref, or `detached HEAD`         |
//! | `orig-head` | original branch tip (legacy name: `head`)       |
//! | `onto`      | commit being rebased onto                       |
//! | `onto_name` | display name of `onto`                          |
//! | `quiet`     | `t` when quiet, empty otherwise                 |
//! | `msgnum`    | current step, absent before the first step      |
//! | `end`       | number of queued steps                          |
//! | `cmt.N`     | Nth commit to replay                            |
//! | `current`   | commit being replayed, absent before first step |
//! | `rewritten` | append-only `<old> <new>` ledger                |
//!
//! Each file is a single line with a trailing newline. Whole-file writes go
//! through a temp file and a rename so readers never observe a torn value.

#![allow(clippy::missing_errors_doc)]

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use replay_git::{CommitInfo, GitOid, GitRepo, RefName};
use serde::Serialize;

use crate::error::RebaseError;
use crate::planner::{Endpoint, Plan, plan};

pub const REBASE_APPLY_DIR: &str = "rebase-apply";
pub const REBASE_MERGE_DIR: &str = "rebase-merge";

pub const HEAD_NAME_FILE: &str = "head-name";
pub const ORIG_HEAD_FILE: &str = "orig-head";
pub const LEGACY_HEAD_FILE: &str = "head";
pub const ONTO_FILE: &str = "onto";
pub const ONTO_NAME_FILE: &str = "onto_name";
pub const QUIET_FILE: &str = "quiet";
pub const MSGNUM_FILE: &str = "msgnum";
pub const END_FILE: &str = "end";
pub const CURRENT_FILE: &str = "current";
pub const REWRITTEN_FILE: &str = "rewritten";
pub const INTERACTIVE_FILE: &str = "interactive";

/// `head-name` value recorded when the rebased branch had no ref.
pub const DETACHED_HEAD: &str = "detached HEAD";

/// Name of the file holding the `step`th queued commit.
#[must_use]
pub fn cmt_file(step: usize) -> String {
    format!("cmt.{step}")
}

// ---------------------------------------------------------------------------
// RebaseKind
// ---------------------------------------------------------------------------

/// Which flavor of rebase owns the state directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseKind {
    /// Patch-based (`rebase-apply/`). Recognized, not supported.
    Apply,
    /// Merge-based (`rebase-merge/`). The one this crate drives.
    Merge,
    /// Interactive (`rebase-merge/` with an `interactive` marker).
    /// Recognized, not supported.
    Interactive,
}

impl fmt::Display for RebaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => f.write_str("patch application"),
            Self::Merge => f.write_str("merge"),
            Self::Interactive => f.write_str("interactive"),
        }
    }
}

/// Look for rebase state under `git_dir`.
///
/// `rebase-apply/` is checked first; the two directories are never both
/// produced by one tool.
#[must_use]
pub fn detect(git_dir: &Path) -> Option<(RebaseKind, PathBuf)> {
    let apply = git_dir.join(REBASE_APPLY_DIR);
    if apply.is_dir() {
        return Some((RebaseKind::Apply, apply));
    }
    let merge = git_dir.join(REBASE_MERGE_DIR);
    if merge.is_dir() {
        let kind = if merge.join(INTERACTIVE_FILE).is_file() {
            RebaseKind::Interactive
        } else {
            RebaseKind::Merge
        };
        return Some((kind, merge));
    }
    None
}

// ---------------------------------------------------------------------------
// StateDir
// ---------------------------------------------------------------------------

/// Handle on a state directory with typed file access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDir {
    path: PathBuf,
}

impl StateDir {
    /// Wrap an existing directory path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The merge state directory for a repository.
    #[must_use]
    pub fn merge_dir(git_dir: &Path) -> Self {
        Self::new(git_dir.join(REBASE_MERGE_DIR))
    }

    /// The directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to a file inside the directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Create the directory. Fails with [`RebaseError::AlreadyInProgress`]
    /// if it exists: its presence is the rebase lock.
    pub fn create(&self) -> Result<(), RebaseError> {
        match fs::create_dir(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(RebaseError::AlreadyInProgress),
            Err(e) => Err(RebaseError::io(&self.path, e)),
        }
    }

    /// Delete the directory and everything in it. Missing is fine.
    pub fn remove(&self) -> Result<(), RebaseError> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RebaseError::io(&self.path, e)),
        }
    }

    /// Write `contents` followed by a newline to `name`, atomically.
    pub fn write_line(&self, name: &str, contents: &str) -> Result<(), RebaseError> {
        let path = self.file(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.path)
            .map_err(|e| RebaseError::io(&self.path, e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| RebaseError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| RebaseError::io(&path, e.error))?;
        Ok(())
    }

    /// Append raw bytes to `name`, creating it if needed.
    pub fn append(&self, name: &str, contents: &str) -> Result<(), RebaseError> {
        let path = self.file(name);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RebaseError::io(&path, e))?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| RebaseError::io(&path, e))
    }

    /// Read a file with trailing whitespace trimmed. Missing is an error.
    pub fn read_trimmed(&self, name: &str) -> Result<String, RebaseError> {
        self.read_optional(name)?
            .ok_or_else(|| RebaseError::corrupt(self.file(name), "file is missing"))
    }

    /// Read a file with trailing whitespace trimmed, or `None` if missing.
    pub fn read_optional(&self, name: &str) -> Result<Option<String>, RebaseError> {
        let path = self.file(name);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim_end().to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RebaseError::io(&path, e)),
        }
    }

    /// Read and strictly parse an object id.
    pub fn read_oid(&self, name: &str) -> Result<GitOid, RebaseError> {
        let raw = self.read_trimmed(name)?;
        self.parse_oid(name, &raw)
    }

    fn parse_oid(&self, name: &str, raw: &str) -> Result<GitOid, RebaseError> {
        raw.parse()
            .map_err(|e| RebaseError::corrupt(self.file(name), format!("{e}")))
    }

    fn parse_count(&self, name: &str, raw: &str) -> Result<usize, RebaseError> {
        raw.parse()
            .map_err(|_| RebaseError::corrupt(self.file(name), format!("invalid number {raw:?}")))
    }

    /// Persist the step counter and the commit it replays.
    ///
    /// Called before the step's merge runs, so a crash mid-merge reloads as
    /// "step `step` in progress".
    pub fn write_step_files(&self, step: usize, commit: GitOid) -> Result<(), RebaseError> {
        self.write_line(MSGNUM_FILE, &step.to_string())?;
        self.write_line(CURRENT_FILE, &commit.to_string())
    }

    /// The queued commit for `step`.
    pub fn read_queued(&self, step: usize) -> Result<GitOid, RebaseError> {
        self.read_oid(&cmt_file(step))
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Create the merge state directory and persist everything a fresh rebase
/// needs: the fixed files, `ORIG_HEAD`, and the planned sequence.
///
/// If anything fails after the directory exists, the directory is removed
/// before the error is returned.
///
/// # Errors
/// [`RebaseError::AlreadyInProgress`] if the directory already exists, plus
/// any I/O or git error from writing the state.
pub fn save_fixed(
    repo: &dyn GitRepo,
    branch: &Endpoint,
    upstream: Option<&Endpoint>,
    onto: &Endpoint,
    quiet: bool,
) -> Result<(StateDir, Plan), RebaseError> {
    let dir = StateDir::merge_dir(repo.git_dir());
    dir.create()?;

    match write_fixed(repo, &dir, branch, upstream, onto, quiet) {
        Ok(plan) => Ok((dir, plan)),
        Err(e) => {
            if let Err(cleanup) = dir.remove() {
                tracing::warn!(error = %cleanup, "failed to remove partial rebase state");
            }
            Err(e)
        }
    }
}

fn write_fixed(
    repo: &dyn GitRepo,
    dir: &StateDir,
    branch: &Endpoint,
    upstream: Option<&Endpoint>,
    onto: &Endpoint,
    quiet: bool,
) -> Result<Plan, RebaseError> {
    repo.write_ref(&RefName::orig_head(), branch.id, "rebase: updating ORIG_HEAD")?;

    let head_name = branch
        .ref_name
        .as_ref()
        .map_or(DETACHED_HEAD, RefName::as_str);
    dir.write_line(HEAD_NAME_FILE, head_name)?;
    dir.write_line(ONTO_FILE, &onto.id.to_string())?;
    dir.write_line(ORIG_HEAD_FILE, &branch.id.to_string())?;
    dir.write_line(QUIET_FILE, if quiet { "t" } else { "" })?;

    plan(repo, dir, branch, upstream, onto)
}

// ---------------------------------------------------------------------------
// RebaseState
// ---------------------------------------------------------------------------

/// Progress of a merge-based rebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeState {
    /// Last step started, 1-based. `0` before the first step.
    pub msgnum: usize,
    /// Number of queued steps.
    pub end: usize,
    /// Display name of the onto commit.
    pub onto_name: String,
    /// The commit being replayed by step `msgnum`, once a step has started.
    pub current: Option<CommitInfo>,
}

impl MergeState {
    /// `true` once every queued step has been started.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.msgnum == self.end
    }
}

/// An in-progress rebase, as reconstructed from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseState {
    /// Where the state lives.
    pub dir: StateDir,
    /// The branch being rebased, or `None` when it was given as a bare
    /// commit (`detached HEAD`).
    pub orig_head_name: Option<RefName>,
    /// Tip of the branch before the rebase.
    pub orig_head_id: GitOid,
    /// The commit being rebased onto.
    pub onto_id: GitOid,
    /// Whether the rebase was started quietly.
    pub quiet: bool,
    /// Merge-specific progress.
    pub merge: MergeState,
}

impl RebaseState {
    /// `true` if the rebased branch had no ref.
    #[must_use]
    pub const fn head_detached(&self) -> bool {
        self.orig_head_name.is_none()
    }

    /// Load the rebase in progress for `repo`.
    ///
    /// # Errors
    /// [`RebaseError::NotInProgress`] without state, [`RebaseError::Unsupported`]
    /// for apply or interactive state, [`RebaseError::CorruptState`] for any
    /// missing or malformed file.
    pub fn load(repo: &dyn GitRepo) -> Result<Self, RebaseError> {
        let Some((kind, path)) = detect(repo.git_dir()) else {
            return Err(RebaseError::NotInProgress);
        };
        if kind != RebaseKind::Merge {
            return Err(RebaseError::Unsupported { kind });
        }
        let dir = StateDir::new(path);

        let head_name = dir.read_trimmed(HEAD_NAME_FILE)?;
        let orig_head_name = if head_name == DETACHED_HEAD {
            None
        } else {
            Some(RefName::new(&head_name).map_err(|e| {
                RebaseError::corrupt(dir.file(HEAD_NAME_FILE), e.to_string())
            })?)
        };

        let orig_head_file = if dir.file(ORIG_HEAD_FILE).is_file() {
            ORIG_HEAD_FILE
        } else {
            LEGACY_HEAD_FILE
        };
        let orig_head_id = dir.read_oid(orig_head_file)?;
        let onto_id = dir.read_oid(ONTO_FILE)?;
        let quiet = dir.read_optional(QUIET_FILE)?.is_some_and(|q| !q.is_empty());

        let merge = Self::load_merge(repo, &dir)?;

        Ok(Self {
            dir,
            orig_head_name,
            orig_head_id,
            onto_id,
            quiet,
            merge,
        })
    }

    fn load_merge(repo: &dyn GitRepo, dir: &StateDir) -> Result<MergeState, RebaseError> {
        let end = dir.parse_count(END_FILE, &dir.read_trimmed(END_FILE)?)?;
        let onto_name = dir.read_trimmed(ONTO_NAME_FILE)?;
        let msgnum = match dir.read_optional(MSGNUM_FILE)? {
            Some(raw) => dir.parse_count(MSGNUM_FILE, &raw)?,
            None => 0,
        };
        if msgnum > end {
            return Err(RebaseError::corrupt(
                dir.file(MSGNUM_FILE),
                format!("step {msgnum} is past the end ({end})"),
            ));
        }
        let current = match dir.read_optional(CURRENT_FILE)? {
            Some(raw) => Some(repo.read_commit(dir.parse_oid(CURRENT_FILE, &raw)?)?),
            None => None,
        };
        Ok(MergeState {
            msgnum,
            end,
            onto_name,
            current,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
