//! gix-backed three-way tree merge.
//!
//! The merged tree keeps conflict markers inside blobs; the staged index is
//! derived from that tree and then has stage 1/2/3 entries applied for every
//! path gix reports as unresolved.

use bstr::ByteSlice;
use gix::merge::blob::builtin_driver::text::Labels;
use gix::merge::tree::TreatAsUnresolved;
use gix::merge::tree::apply_index_entries::RemovalMode;

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::index_impl::entries_of;
use crate::types::{GitOid, MergeLabels, MergeOutcome};

pub fn merge_trees(
    repo: &GixRepo,
    ancestor: Option<GitOid>,
    ours: GitOid,
    theirs: GitOid,
    labels: &MergeLabels,
) -> Result<MergeOutcome, GitError> {
    let ancestor_id = ancestor.map_or_else(
        || gix::ObjectId::empty_tree(repo.repo.object_hash()),
        to_gix_oid,
    );

    let options = repo
        .repo
        .tree_merge_options()
        .map_err(|e| GitError::MergeFailed {
            message: format!("failed to load merge options: {e}"),
        })?;

    let gix_labels = Labels {
        ancestor: Some(labels.ancestor.as_str().into()),
        current: Some(labels.ours.as_str().into()),
        other: Some(labels.theirs.as_str().into()),
    };

    let mut outcome = repo
        .repo
        .merge_trees(ancestor_id, to_gix_oid(ours), to_gix_oid(theirs), gix_labels, options)
        .map_err(|e| GitError::MergeFailed {
            message: format!("merge of {ours} and {theirs} failed: {e}"),
        })?;

    let tree_id = outcome.tree.write().map_err(|e| GitError::MergeFailed {
        message: format!("failed to write merged tree: {e}"),
    })?;
    let tree = from_gix_oid(tree_id.as_ref());

    let mut index = repo
        .repo
        .index_from_tree(&tree_id)
        .map_err(|e| GitError::MergeFailed {
            message: format!("failed to stage merged tree {tree}: {e}"),
        })?;
    outcome.index_changed_after_applying_conflicts(
        &mut index,
        TreatAsUnresolved::default(),
        RemovalMode::Prune,
    );

    let entries = entries_of(&index);
    let mut conflicts: Vec<String> = entries
        .iter()
        .filter(|e| e.is_conflicted())
        .map(|e| e.path.to_str_lossy().into_owned())
        .collect();
    conflicts.sort();
    conflicts.dedup();

    tracing::debug!(
        %tree,
        conflicts = conflicts.len(),
        ancestor = %labels.ancestor,
        ours = %labels.ours,
        theirs = %labels.theirs,
        "merged trees"
    );

    Ok(MergeOutcome {
        tree,
        entries,
        conflicts,
    })
}
