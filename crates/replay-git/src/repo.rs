//! The [`GitRepo`] trait: the single abstraction boundary between the rebase
//! engine and git.
//!
//! The engine reaches git exclusively through this trait. The trait is
//! object-safe so callers can use `dyn GitRepo` or `Box<dyn GitRepo>`.
//!
//! | Group        | Methods                                                     |
//! |--------------|-------------------------------------------------------------|
//! | Repository   | `git_dir`, `workdir`, `is_bare`                             |
//! | Refs         | `read_ref`, `write_ref`, `write_symbolic_ref`, `head_name`, ... |
//! | Rev-parse    | `rev_parse`                                                 |
//! | Objects      | `read_commit`, `create_commit`                              |
//! | History      | `walk_commits`                                              |
//! | Index        | `write_index_tree`, `index_conflicts`                       |
//! | Merge        | `merge_trees`                                               |
//! | Checkout     | `checkout_merge`, `checkout_head_force`, `reset_hard`       |
//! | Diff         | `diff_trees`, `diff_tree_to_index`, `diff_index_to_workdir` |
//! | Notes        | `read_note`, `write_note`                                   |
//! | Config       | `read_config`, `read_config_bool`                           |

use std::path::Path;

use crate::error::GitError;
use crate::types::{
    CheckoutStrategy, CommitInfo, DiffEntry, GitOid, MergeLabels, MergeOutcome, NewCommit, Note,
    RefEdit, RefName, Signature, StatusEntry,
};

/// The git abstraction trait used by the rebase engine.
///
/// Implementations may be backed by gix (the shipped backend) or a test
/// double.
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return position
/// outside of `Result`. Callers may use `&dyn GitRepo` or `Box<dyn GitRepo>`.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Repository
    // -----------------------------------------------------------------------

    /// The repository metadata directory (`.git`).
    fn git_dir(&self) -> &Path;

    /// The working tree root, or `None` for a bare repository.
    fn workdir(&self) -> Option<&Path>;

    /// `true` when the repository has no working tree.
    fn is_bare(&self) -> bool {
        self.workdir().is_none()
    }

    // -----------------------------------------------------------------------
    // Refs
    //
    // Replaces: git rev-parse, git update-ref, git symbolic-ref
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    ///
    /// Symbolic refs are followed to the object they ultimately name.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Create or overwrite a ref unconditionally so it points at `oid`.
    ///
    /// `HEAD` is written as-is: if it was symbolic it becomes detached.
    /// `log_message` is written to the reflog entry.
    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError>;

    /// Point `name` symbolically at `target` (e.g. `HEAD` at a branch).
    fn write_symbolic_ref(
        &self,
        name: &RefName,
        target: &RefName,
        log_message: &str,
    ) -> Result<(), GitError>;

    /// Atomically apply a batch of ref updates with compare-and-swap semantics.
    ///
    /// All updates succeed or all fail. Each [`RefEdit`] carries an expected
    /// old OID; if any ref's current value differs, the entire transaction is
    /// aborted and [`GitError::RefConflict`] is returned. An expected value of
    /// [`GitOid::ZERO`] asserts the ref does not exist yet.
    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError>;

    /// The ref `HEAD` points at symbolically, or `None` when `HEAD` is
    /// detached.
    ///
    /// An unborn branch still has a name, so this returns `Some` for a fresh
    /// repository without commits.
    fn head_name(&self) -> Result<Option<RefName>, GitError>;

    // -----------------------------------------------------------------------
    // Rev-parse
    // -----------------------------------------------------------------------

    /// Resolve a revision specification to an OID.
    ///
    /// Returns [`GitError::NotFound`] if the revision cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Read and decode a commit object. Message, identities and the
    /// `encoding` header are returned as stored.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    /// Write a commit object exactly as described. No ref is moved.
    fn create_commit(&self, commit: &NewCommit) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// List the commits reachable from `tips` but not from `hidden`,
    /// oldest first by committer time.
    ///
    /// Commits sharing a timestamp keep the walker's relative order, then the
    /// whole list is reversed, so the output is stable for a given history.
    fn walk_commits(&self, tips: &[GitOid], hidden: &[GitOid]) -> Result<Vec<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Index
    // -----------------------------------------------------------------------

    /// Write the resolved (stage 0) index entries as a tree.
    fn write_index_tree(&self) -> Result<GitOid, GitError>;

    /// Paths with an unresolved conflict in the index, sorted, in display
    /// form.
    fn index_conflicts(&self) -> Result<Vec<String>, GitError>;

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Three-way merge of trees.
    ///
    /// `ancestor` of `None` merges against the empty tree. Conflicts do not
    /// fail the call; they are reported in [`MergeOutcome::conflicts`] and as
    /// stage 1/2/3 entries. [`GitError::MergeFailed`] means no result could
    /// be computed at all.
    fn merge_trees(
        &self,
        ancestor: Option<GitOid>,
        ours: GitOid,
        theirs: GitOid,
        labels: &MergeLabels,
    ) -> Result<MergeOutcome, GitError>;

    // -----------------------------------------------------------------------
    // Checkout
    // -----------------------------------------------------------------------

    /// Materialize a merge result into the index (with conflict stages) and
    /// the working tree.
    ///
    /// With [`CheckoutStrategy::Safe`] a dirty worktree is refused with
    /// [`GitError::DirtyWorktree`].
    fn checkout_merge(
        &self,
        outcome: &MergeOutcome,
        strategy: CheckoutStrategy,
    ) -> Result<(), GitError>;

    /// Overwrite the index and working tree with the tree of `HEAD`.
    ///
    /// Tracked files absent from that tree are removed; untracked files are
    /// left alone.
    fn checkout_head_force(&self) -> Result<(), GitError>;

    /// Move the ref behind `HEAD` (or `HEAD` itself when detached) to
    /// `commit`, then force the index and working tree to match it.
    fn reset_hard(&self, commit: GitOid, log_message: &str) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    /// File-level differences between two trees. `old` of `None` diffs
    /// against the empty tree.
    fn diff_trees(&self, old: Option<GitOid>, new: GitOid) -> Result<Vec<DiffEntry>, GitError>;

    /// Staged changes: `HEAD`'s tree against the resolved index.
    fn diff_tree_to_index(&self, tree: Option<GitOid>) -> Result<Vec<DiffEntry>, GitError> {
        let index_tree = self.write_index_tree()?;
        self.diff_trees(tree, index_tree)
    }

    /// Unstaged changes of tracked files. Untracked files are not deltas.
    fn diff_index_to_workdir(&self) -> Result<Vec<StatusEntry>, GitError>;

    // -----------------------------------------------------------------------
    // Notes
    // -----------------------------------------------------------------------

    /// Read the note attached to `target` under `notes_ref`.
    fn read_note(&self, notes_ref: &RefName, target: GitOid) -> Result<Option<Note>, GitError>;

    /// Attach `message` (stored verbatim as the note blob) to `target` under
    /// `notes_ref`, recording a notes commit by `author`/`committer`.
    ///
    /// Without `force`, an existing note on `target` is
    /// [`GitError::AlreadyExists`]. Returns the new notes commit.
    fn write_note(
        &self,
        notes_ref: &RefName,
        target: GitOid,
        author: &Signature,
        committer: &Signature,
        message: &[u8],
        force: bool,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    /// Read a config value (e.g. `"user.name"`), or `None` if unset.
    fn read_config(&self, key: &str) -> Result<Option<String>, GitError>;

    /// Read a boolean config value using git's truthiness rules.
    fn read_config_bool(&self, key: &str) -> Result<Option<bool>, GitError>;
}
