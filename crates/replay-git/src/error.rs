//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo) trait
//! methods. It uses rich enum variants so callers can match on specific failure
//! modes (e.g., missing ref, CAS mismatch, dirty worktree) without parsing
//! error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object, ref, or path was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A ref update failed because the ref's current value did not match the
    /// expected old value (compare-and-swap / optimistic concurrency failure).
    #[error("ref conflict on `{ref_name}`: {message}")]
    RefConflict {
        /// The ref that could not be updated.
        ref_name: String,
        /// Details about the mismatch.
        message: String,
    },

    /// An operation was refused because the working tree has uncommitted changes.
    #[error("dirty worktree at {}: {message}", path.display())]
    DirtyWorktree {
        /// Path to the worktree root.
        path: PathBuf,
        /// What was dirty (staged changes, modified files, etc.).
        message: String,
    },

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// An object already exists where the caller asked not to overwrite it
    /// (e.g. a note on a commit that already carries one).
    #[error("already exists: {message}")]
    AlreadyExists {
        /// Description of the existing object.
        message: String,
    },

    /// A merge could not be computed at all (as opposed to producing conflicts,
    /// which are reported through the merge outcome).
    #[error("merge failed: {message}")]
    MergeFailed {
        /// Description of the failure.
        message: String,
    },

    /// The operation requires a working tree but the repository is bare.
    #[error("repository at {} is bare", path.display())]
    BareRepository {
        /// The git directory of the bare repository.
        path: PathBuf,
    },

    /// The underlying git backend (gix, CLI, etc.) returned an unclassified error.
    ///
    /// This is the catch-all for errors that don't fit other variants. The
    /// `message` should include enough context to diagnose the failure.
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl GitError {
    /// Shorthand for a [`GitError::BackendError`] from any displayable error.
    pub(crate) fn backend(e: impl std::fmt::Display) -> Self {
        Self::BackendError {
            message: e.to_string(),
        }
    }
}
