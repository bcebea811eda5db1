//! gix-backed object read/write and tree editing operations.
//!
//! Commits are decoded and encoded through gix's own object types, so
//! messages, identities and the `encoding` header survive byte for byte.

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{
    CommitInfo, EntryMode, GitOid, GitTime, NewCommit, Signature, TreeEdit, TreeEntry,
};

/// Convert a gix `EntryMode` to our `EntryMode`.
pub(crate) fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

/// Convert our `EntryMode` to a gix `EntryKind`.
pub(crate) const fn to_gix_entry_kind(mode: EntryMode) -> gix::objs::tree::EntryKind {
    match mode {
        EntryMode::Blob => gix::objs::tree::EntryKind::Blob,
        EntryMode::BlobExecutable => gix::objs::tree::EntryKind::BlobExecutable,
        EntryMode::Tree => gix::objs::tree::EntryKind::Tree,
        EntryMode::Link => gix::objs::tree::EntryKind::Link,
        EntryMode::Commit => gix::objs::tree::EntryKind::Commit,
    }
}

pub fn read_blob(repo: &GixRepo, oid: GitOid) -> Result<Vec<u8>, GitError> {
    let mut blob = repo
        .repo
        .find_blob(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("blob {oid}: {e}"),
        })?;
    Ok(blob.take_data())
}

pub fn read_tree(repo: &GixRepo, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("tree {oid}: {e}"),
        })?;

    let mut entries = Vec::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| GitError::BackendError {
            message: format!("failed to decode tree entry: {e}"),
        })?;
        entries.push(TreeEntry {
            name: entry.inner.filename.to_owned(),
            mode: from_gix_entry_mode(entry.inner.mode),
            oid: from_gix_oid(entry.inner.oid),
        });
    }
    Ok(entries)
}

/// Convert the raw (untrimmed) header form of a signature.
fn from_gix_signature(
    sig: gix::actor::SignatureRef<'_>,
    oid: GitOid,
) -> Result<Signature, GitError> {
    let time = sig.time().map_err(|e| GitError::BackendError {
        message: format!("commit {oid} has a malformed signature time {:?}: {e}", sig.time),
    })?;
    Ok(Signature {
        name: sig.name.to_owned(),
        email: sig.email.to_owned(),
        when: GitTime {
            seconds: time.seconds,
            offset_seconds: time.offset,
        },
    })
}

fn to_gix_signature(sig: &Signature) -> gix::actor::Signature {
    gix::actor::Signature {
        name: sig.name.clone(),
        email: sig.email.clone(),
        time: gix::date::Time::new(sig.when.seconds, sig.when.offset_seconds),
    }
}

pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("commit {oid}: {e}"),
        })?;

    let decoded = commit.decode().map_err(|e| GitError::BackendError {
        message: format!("failed to decode commit {oid}: {e}"),
    })?;

    Ok(CommitInfo {
        oid,
        tree_oid: from_gix_oid(&decoded.tree()),
        parents: decoded.parents().map(|p| from_gix_oid(&p)).collect(),
        message: decoded.message.to_owned(),
        encoding: decoded.encoding.map(ToOwned::to_owned),
        author: from_gix_signature(decoded.author, oid)?,
        committer: from_gix_signature(decoded.committer, oid)?,
    })
}

pub fn write_blob(repo: &GixRepo, data: &[u8]) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .write_blob(data)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write blob: {e}"),
        })?;
    Ok(from_gix_oid(id.as_ref()))
}

/// Git orders tree entries by name, comparing directories as if their name
/// ended in `/`.
fn tree_sort_key(entry: &TreeEntry) -> Vec<u8> {
    let mut key = entry.name.to_vec();
    if entry.mode == EntryMode::Tree {
        key.push(b'/');
    }
    key
}

pub fn write_tree(repo: &GixRepo, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| tree_sort_key(e));
    let tree = gix::objs::Tree {
        entries: sorted
            .into_iter()
            .map(|e| gix::objs::tree::Entry {
                mode: to_gix_entry_kind(e.mode).into(),
                filename: e.name.clone(),
                oid: to_gix_oid(e.oid),
            })
            .collect(),
    };
    let id = repo
        .repo
        .write_object(&tree)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write tree: {e}"),
        })?;
    Ok(from_gix_oid(id.as_ref()))
}

pub fn create_commit(repo: &GixRepo, commit: &NewCommit) -> Result<GitOid, GitError> {
    let object = gix::objs::Commit {
        tree: to_gix_oid(commit.tree),
        parents: commit.parents.iter().map(|p| to_gix_oid(*p)).collect(),
        author: to_gix_signature(&commit.author),
        committer: to_gix_signature(&commit.committer),
        encoding: commit.encoding.clone(),
        message: commit.message.clone(),
        extra_headers: Vec::new(),
    };
    let id = repo
        .repo
        .write_object(&object)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write commit object: {e}"),
        })?;
    let oid = from_gix_oid(id.as_ref());
    tracing::debug!(%oid, tree = %commit.tree, parents = commit.parents.len(), "wrote commit");
    Ok(oid)
}

pub fn edit_tree(repo: &GixRepo, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(base))
        .map_err(|e| GitError::NotFound {
            message: format!("base tree {base}: {e}"),
        })?;

    let mut editor = tree.edit().map_err(|e| GitError::BackendError {
        message: format!("failed to create tree editor: {e}"),
    })?;

    for edit in edits {
        match edit {
            TreeEdit::Upsert { path, mode, oid } => {
                editor
                    .upsert(path, to_gix_entry_kind(*mode), to_gix_oid(*oid))
                    .map_err(|e| GitError::BackendError {
                        message: format!("tree edit upsert '{path}': {e}"),
                    })?;
            }
            TreeEdit::Remove { path } => {
                editor
                    .remove(path)
                    .map_err(|e| GitError::BackendError {
                        message: format!("tree edit remove '{path}': {e}"),
                    })?;
            }
        }
    }

    let new_id = editor.write().map_err(|e| GitError::BackendError {
        message: format!("failed to write edited tree: {e}"),
    })?;
    Ok(from_gix_oid(new_id.as_ref()))
}
