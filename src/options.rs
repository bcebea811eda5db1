//! Options for rebase operations, normalized against git configuration.

#![allow(clippy::missing_errors_doc)]

use replay_git::{CheckoutStrategy, GitRepo, RefName};

use crate::error::RebaseError;

/// Label used for the merge base side of conflict markers.
pub const DEFAULT_ANCESTOR_LABEL: &str = "ancestor";

/// Caller-facing options for `begin` and `finish`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebaseOptions {
    /// Record the rebase as quiet (persisted to the `quiet` file).
    pub quiet: bool,
    /// Notes ref whose notes are copied to rewritten commits at finish.
    /// When unset, git configuration decides.
    pub rewrite_notes_ref: Option<RefName>,
}

impl RebaseOptions {
    /// Fill in anything the caller left unset from git configuration.
    ///
    /// An explicit notes ref always wins. Otherwise, when
    /// `notes.rewrite.rebase` is true (the default), `notes.rewriteRef`
    /// names the ref; with neither set, notes are not copied.
    pub fn normalize(&self, repo: &dyn GitRepo) -> Result<Self, RebaseError> {
        if self.rewrite_notes_ref.is_some() {
            return Ok(self.clone());
        }

        let mut normalized = self.clone();
        if repo.read_config_bool("notes.rewrite.rebase")?.unwrap_or(true)
            && let Some(name) = repo.read_config("notes.rewriteRef")?
        {
            let name = RefName::new(&name).map_err(|e| {
                RebaseError::Git(replay_git::GitError::BackendError {
                    message: format!("notes.rewriteRef: {e}"),
                })
            })?;
            normalized.rewrite_notes_ref = Some(name);
        }
        Ok(normalized)
    }
}

/// Options for materializing a step.
///
/// Unset labels fall back to `"ancestor"`, the onto display name, and the
/// summary of the commit being replayed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// How to treat local modifications.
    pub strategy: CheckoutStrategy,
    /// Label for the merge base.
    pub ancestor_label: Option<String>,
    /// Label for the side being built upon.
    pub our_label: Option<String>,
    /// Label for the commit being replayed.
    pub their_label: Option<String>,
}

impl CheckoutOptions {
    /// Forced checkout with default labels.
    #[must_use]
    pub fn force() -> Self {
        Self {
            strategy: CheckoutStrategy::Force,
            ..Self::default()
        }
    }
}
