//! The gix-backed implementation of [`GitRepo`].

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{
    CheckoutStrategy, CommitInfo, DiffEntry, GitOid, MergeLabels, MergeOutcome, NewCommit, Note,
    RefEdit, RefName, Signature, StatusEntry,
};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Construct via [`GixRepo::open`].
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    pub(crate) git_dir: PathBuf,
    pub(crate) workdir: Option<PathBuf>,
}

impl GixRepo {
    /// Open the git repository at or above `path`.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if no repository is found and
    /// [`GitError::BackendError`] for non-SHA-1 repositories.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::discover(path).map_err(|e| GitError::NotFound {
            message: format!("no git repository at {}: {e}", path.display()),
        })?;
        Self::from_repo(repo)
    }

    fn from_repo(repo: gix::Repository) -> Result<Self, GitError> {
        if repo.object_hash() != gix::hash::Kind::Sha1 {
            return Err(GitError::BackendError {
                message: format!("unsupported object format {:?}", repo.object_hash()),
            });
        }
        let git_dir = repo.git_dir().to_path_buf();
        let workdir = repo.workdir().map(Path::to_path_buf);
        Ok(Self {
            repo,
            git_dir,
            workdir,
        })
    }

    /// The working tree root, or [`GitError::BareRepository`].
    pub(crate) fn require_workdir(&self) -> Result<&Path, GitError> {
        self.workdir
            .as_deref()
            .ok_or_else(|| GitError::BareRepository {
                path: self.git_dir.clone(),
            })
    }
}

/// Convert a `GitOid` to a `gix::ObjectId`.
pub(crate) fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from(*oid.as_bytes())
}

/// Convert a `gix::oid` to a `GitOid`. Repositories are SHA-1 only (checked
/// at open), so the width always matches.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> GitOid {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&oid.as_bytes()[..20]);
    GitOid::from_bytes(bytes)
}

impl GitRepo for GixRepo {
    // === Repository ===
    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    // === Refs ===
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::read_ref(self, name)
    }

    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError> {
        crate::refs_impl::write_ref(self, name, oid, log_message)
    }

    fn write_symbolic_ref(
        &self,
        name: &RefName,
        target: &RefName,
        log_message: &str,
    ) -> Result<(), GitError> {
        crate::refs_impl::write_symbolic_ref(self, name, target, log_message)
    }

    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError> {
        crate::refs_impl::atomic_ref_update(self, edits)
    }

    fn head_name(&self) -> Result<Option<RefName>, GitError> {
        crate::refs_impl::head_name(self)
    }

    // === Rev-parse ===
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        crate::refs_impl::rev_parse(self, spec)
    }

    // === Objects ===
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }

    fn create_commit(&self, commit: &NewCommit) -> Result<GitOid, GitError> {
        crate::objects_impl::create_commit(self, commit)
    }

    // === History ===
    fn walk_commits(&self, tips: &[GitOid], hidden: &[GitOid]) -> Result<Vec<GitOid>, GitError> {
        crate::walk_impl::walk_commits(self, tips, hidden)
    }

    // === Index ===
    fn write_index_tree(&self) -> Result<GitOid, GitError> {
        crate::index_impl::write_index_tree(self)
    }

    fn index_conflicts(&self) -> Result<Vec<String>, GitError> {
        crate::index_impl::index_conflicts(self)
    }

    // === Merge ===
    fn merge_trees(
        &self,
        ancestor: Option<GitOid>,
        ours: GitOid,
        theirs: GitOid,
        labels: &MergeLabels,
    ) -> Result<MergeOutcome, GitError> {
        crate::merge_impl::merge_trees(self, ancestor, ours, theirs, labels)
    }

    // === Checkout ===
    fn checkout_merge(
        &self,
        outcome: &MergeOutcome,
        strategy: CheckoutStrategy,
    ) -> Result<(), GitError> {
        crate::checkout_impl::checkout_merge(self, outcome, strategy)
    }

    fn checkout_head_force(&self) -> Result<(), GitError> {
        crate::checkout_impl::checkout_head_force(self)
    }

    fn reset_hard(&self, commit: GitOid, log_message: &str) -> Result<(), GitError> {
        crate::checkout_impl::reset_hard(self, commit, log_message)
    }

    // === Diff ===
    fn diff_trees(&self, old: Option<GitOid>, new: GitOid) -> Result<Vec<DiffEntry>, GitError> {
        crate::diff_impl::diff_trees(self, old, new)
    }

    fn diff_index_to_workdir(&self) -> Result<Vec<StatusEntry>, GitError> {
        crate::status_impl::diff_index_to_workdir(self)
    }

    // === Notes ===
    fn read_note(&self, notes_ref: &RefName, target: GitOid) -> Result<Option<Note>, GitError> {
        crate::notes_impl::read_note(self, notes_ref, target)
    }

    fn write_note(
        &self,
        notes_ref: &RefName,
        target: GitOid,
        author: &Signature,
        committer: &Signature,
        message: &[u8],
        force: bool,
    ) -> Result<GitOid, GitError> {
        crate::notes_impl::write_note(self, notes_ref, target, author, committer, message, force)
    }

    // === Config ===
    fn read_config(&self, key: &str) -> Result<Option<String>, GitError> {
        crate::config_impl::read_config(self, key)
    }

    fn read_config_bool(&self, key: &str) -> Result<Option<bool>, GitError> {
        crate::config_impl::read_config_bool(self, key)
    }
}
