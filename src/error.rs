//! Error types for the rebase engine.
//!
//! [`RebaseError`] is returned by every driver operation. Conditions that end
//! a loop normally (an exhausted sequence, an already-applied step) are not
//! errors; they are reported through [`Advance`](crate::Advance) and
//! [`CommitOutcome`](crate::CommitOutcome).

use std::path::PathBuf;

use replay_git::{GitError, GitOid};
use thiserror::Error;

use crate::state::RebaseKind;

/// Errors returned by rebase operations.
#[derive(Debug, Error)]
pub enum RebaseError {
    /// An operation needs a rebase in progress and there is none.
    #[error("there is no rebase in progress")]
    NotInProgress,

    /// `begin` found state from an earlier rebase.
    #[error("there is an existing rebase in progress")]
    AlreadyInProgress,

    /// `begin` was given neither an upstream nor an onto commit.
    #[error("an upstream or onto commit is required")]
    MissingTarget,

    /// Rebasing needs a working tree.
    #[error("cannot rebase in a bare repository at {}", path.display())]
    BareRepository {
        /// The git directory.
        path: PathBuf,
    },

    /// `HEAD`'s tree and the index differ.
    #[error("uncommitted changes exist in index")]
    DirtyIndex,

    /// The index and the working tree differ for tracked files.
    #[error("unstaged changes exist in workdir")]
    DirtyWorkdir,

    /// The state on disk belongs to a rebase flavor this engine cannot drive.
    #[error("{kind} rebase is not supported")]
    Unsupported {
        /// The detected flavor.
        kind: RebaseKind,
    },

    /// The queued commit has more than one parent.
    #[error("cannot rebase a merge commit ({commit})")]
    MergeCommit {
        /// The offending commit.
        commit: GitOid,
    },

    /// The index still carries conflict stages.
    #[error("conflicts have not been resolved: {}", paths.join(", "))]
    MergeConflict {
        /// Paths with unresolved conflicts.
        paths: Vec<String>,
    },

    /// `commit` was called before any step was started.
    #[error("no rebase-merge state files exist")]
    NoStepInProgress,

    /// The three-way merge could not produce a result.
    #[error("merge failed: {message}")]
    MergeFailed {
        /// Backend description of the failure.
        message: String,
    },

    /// A state file is missing or malformed.
    #[error("corrupt rebase state in {}: {detail}", path.display())]
    CorruptState {
        /// The offending file.
        path: PathBuf,
        /// What was wrong with it.
        detail: String,
    },

    /// A line of the rewritten-commits ledger is malformed.
    #[error("invalid rewritten file at line {line}")]
    CorruptLedger {
        /// 1-based line number.
        line: usize,
    },

    /// A compare-and-swap ref update lost a race with another writer.
    #[error("ref `{ref_name}` was updated concurrently: {message}")]
    RefRace {
        /// The contested ref.
        ref_name: String,
        /// Backend details.
        message: String,
    },

    /// A state file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Any other failure from the git layer.
    #[error(transparent)]
    Git(GitError),
}

impl From<GitError> for RebaseError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::RefConflict { ref_name, message } => Self::RefRace { ref_name, message },
            GitError::MergeFailed { message } => Self::MergeFailed { message },
            GitError::BareRepository { path } => Self::BareRepository { path },
            other => Self::Git(other),
        }
    }
}

impl RebaseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    #[test]
    fn ref_conflict_maps_to_ref_race() {
        let err: RebaseError = GitError::RefConflict {
            ref_name: "HEAD".to_owned(),
            message: "moved".to_owned(),
        }
        .into();
        assert!(matches!(err, RebaseError::RefRace { ref ref_name, .. } if ref_name == "HEAD"));
    }

    #[test]
    fn other_git_errors_pass_through() {
        let err: RebaseError = GitError::NotFound {
            message: "x".to_owned(),
        }
        .into();
        assert!(matches!(err, RebaseError::Git(GitError::NotFound { .. })));
    }

    #[test]
    fn ledger_message_names_line() {
        let err = RebaseError::CorruptLedger { line: 3 };
        assert_eq!(err.to_string(), "invalid rewritten file at line 3");
    }
}
