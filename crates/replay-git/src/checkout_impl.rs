//! gix-backed checkout, merge materialization, and hard reset.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use bstr::{BString, ByteSlice};

use crate::error::GitError;
use crate::gix_repo::{GixRepo, to_gix_oid};
use crate::index_impl::{entries_of, write_index};
use crate::types::{CheckoutStrategy, GitOid, IndexEntry, MergeOutcome, RefName};

type StatMap = HashMap<BString, gix::index::entry::Stat>;

/// Resolve a commit or tree OID to a tree id.
fn peel_to_tree(repo: &GixRepo, oid: GitOid) -> Result<gix::ObjectId, GitError> {
    let gix_oid = to_gix_oid(oid);
    let obj = repo
        .repo
        .find_object(gix_oid)
        .map_err(|e| GitError::NotFound {
            message: format!("object {oid}: {e}"),
        })?;
    match obj.kind {
        gix::object::Kind::Commit => Ok(obj
            .into_commit()
            .tree_id()
            .map_err(|e| GitError::BackendError {
                message: format!("failed to get tree from commit {oid}: {e}"),
            })?
            .detach()),
        gix::object::Kind::Tree => Ok(gix_oid),
        other => Err(GitError::BackendError {
            message: format!("expected commit or tree, got {other}"),
        }),
    }
}

/// Write every entry of `tree_oid` into `workdir`, overwriting what is there.
///
/// Returns the staged entries of the tree together with the stat data the
/// checkout recorded for them.
fn materialize_tree(
    repo: &GixRepo,
    tree_oid: gix::ObjectId,
    workdir: &Path,
) -> Result<(Vec<IndexEntry>, StatMap), GitError> {
    let mut index_file = repo
        .repo
        .index_from_tree(&tree_oid)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to create index from tree {tree_oid}: {e}"),
        })?;

    let mut opts = repo
        .repo
        .checkout_options(gix::worktree::stack::state::attributes::Source::IdMapping)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to get checkout options: {e}"),
        })?;
    opts.overwrite_existing = true;
    opts.destination_is_initially_empty = false;

    let objects = repo
        .repo
        .objects
        .clone()
        .into_arc()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to convert object store to Arc: {e}"),
        })?;

    let outcome = gix::worktree::state::checkout(
        &mut index_file,
        workdir,
        objects,
        &gix::progress::Discard,
        &gix::progress::Discard,
        &AtomicBool::new(false),
        opts,
    )
    .map_err(|e| GitError::BackendError {
        message: format!("checkout failed: {e}"),
    })?;

    if let Some(first) = outcome.errors.first() {
        return Err(GitError::BackendError {
            message: format!(
                "checkout had {} error(s), first: {}: {}",
                outcome.errors.len(),
                first.path,
                first.error,
            ),
        });
    }

    let stats = index_file
        .entries()
        .iter()
        .map(|entry| (entry.path(&index_file).to_owned(), entry.stat))
        .collect();
    Ok((entries_of(&index_file), stats))
}

/// Delete files that were tracked before a checkout but are not part of the
/// new index. Untracked files are never touched. Directories left empty are
/// pruned up to (not including) `workdir`.
fn remove_dropped_paths(
    workdir: &Path,
    before: &HashSet<BString>,
    after: &HashSet<BString>,
) -> Result<(), GitError> {
    for rel in before.difference(after) {
        let path = workdir.join(gix::path::from_bstr(rel.as_bstr()));
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(GitError::BackendError {
                    message: format!("failed to remove '{rel}': {e}"),
                });
            }
        }
        tracing::trace!(path = %rel, "removed dropped path");
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == workdir || std::fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
    Ok(())
}

fn tracked_paths(repo: &GixRepo) -> Result<HashSet<BString>, GitError> {
    Ok(crate::index_impl::read_index(repo)?
        .into_iter()
        .map(|e| e.path)
        .collect())
}

fn refuse_if_dirty(repo: &GixRepo, workdir: &Path) -> Result<(), GitError> {
    if crate::status_impl::is_dirty(repo)? {
        return Err(GitError::DirtyWorktree {
            path: workdir.to_path_buf(),
            message: "local changes would be overwritten by checkout".to_owned(),
        });
    }
    Ok(())
}

/// Force index and worktree to match `tree_oid`.
fn force_checkout(repo: &GixRepo, tree_oid: gix::ObjectId) -> Result<(), GitError> {
    let workdir = repo.require_workdir()?;
    let before = tracked_paths(repo)?;
    let (entries, stats) = materialize_tree(repo, tree_oid, workdir)?;
    let after: HashSet<BString> = entries.iter().map(|e| e.path.clone()).collect();
    remove_dropped_paths(workdir, &before, &after)?;
    write_index(repo, &entries, &stats)
}

pub fn checkout_merge(
    repo: &GixRepo,
    outcome: &MergeOutcome,
    strategy: CheckoutStrategy,
) -> Result<(), GitError> {
    let workdir = repo.require_workdir()?;
    if strategy == CheckoutStrategy::Safe {
        refuse_if_dirty(repo, workdir)?;
    }

    let before = tracked_paths(repo)?;
    // The merged tree carries conflict markers in blobs, which is exactly
    // what the worktree should show for a conflicted path.
    let (_, stats) = materialize_tree(repo, to_gix_oid(outcome.tree), workdir)?;
    let after: HashSet<BString> = outcome.entries.iter().map(|e| e.path.clone()).collect();
    remove_dropped_paths(workdir, &before, &after)?;
    write_index(repo, &outcome.entries, &stats)?;

    tracing::debug!(
        tree = %outcome.tree,
        conflicts = outcome.conflicts.len(),
        ?strategy,
        "materialized merge result"
    );
    Ok(())
}

pub fn checkout_head_force(repo: &GixRepo) -> Result<(), GitError> {
    let head = crate::refs_impl::rev_parse(repo, "HEAD")?;
    let tree = peel_to_tree(repo, head)?;
    force_checkout(repo, tree)?;
    tracing::debug!(%head, "checked out HEAD");
    Ok(())
}

pub fn reset_hard(repo: &GixRepo, commit: GitOid, log_message: &str) -> Result<(), GitError> {
    let tree = peel_to_tree(repo, commit)?;
    match crate::refs_impl::head_name(repo)? {
        Some(branch) => crate::refs_impl::write_ref(repo, &branch, commit, log_message)?,
        None => crate::refs_impl::write_ref(repo, &RefName::head(), commit, log_message)?,
    }
    force_checkout(repo, tree)?;
    tracing::debug!(%commit, "hard reset");
    Ok(())
}
