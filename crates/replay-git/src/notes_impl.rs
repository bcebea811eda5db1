//! Notes storage on top of refs, trees, and commits.
//!
//! A notes ref points at a commit whose tree maps annotated object ids to
//! note blobs. Entries are named by the full hex id, or split into 2-char
//! fanout directories (`ab/cdef...`) by tools that manage large note sets.
//! Both layouts are read; new notes are always written flat. Note blobs are
//! carried as raw bytes, so binary notes copy unchanged.

use bstr::BString;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::objects_impl::{create_commit, edit_tree, read_blob, read_commit, read_tree, write_blob, write_tree};
use crate::refs_impl::{atomic_ref_update, read_ref};
use crate::types::{EntryMode, GitOid, NewCommit, Note, RefEdit, RefName, Signature, TreeEdit};

const NOTES_COMMIT_MESSAGE: &str = "Notes added by 'git-replay'\n";

/// Find the note blob for `hex` below `tree`, returning its path and OID.
fn locate(
    repo: &GixRepo,
    tree: GitOid,
    prefix: &str,
    hex: &str,
) -> Result<Option<(BString, GitOid)>, GitError> {
    let entries = read_tree(repo, tree)?;
    if let Some(entry) = entries.iter().find(|e| e.name == hex && e.mode != EntryMode::Tree) {
        return Ok(Some((format!("{prefix}{hex}").into(), entry.oid)));
    }
    if hex.len() > 2 {
        let (fan, rest) = hex.split_at(2);
        if let Some(dir) = entries.iter().find(|e| e.name == fan && e.mode == EntryMode::Tree) {
            return locate(repo, dir.oid, &format!("{prefix}{fan}/"), rest);
        }
    }
    Ok(None)
}

pub fn read_note(
    repo: &GixRepo,
    notes_ref: &RefName,
    target: GitOid,
) -> Result<Option<Note>, GitError> {
    let Some(notes_commit) = read_ref(repo, notes_ref)? else {
        return Ok(None);
    };
    let commit = read_commit(repo, notes_commit)?;
    let Some((_, blob)) = locate(repo, commit.tree_oid, "", &target.to_string())? else {
        return Ok(None);
    };
    Ok(Some(Note {
        author: commit.author,
        committer: commit.committer,
        message: read_blob(repo, blob)?.into(),
    }))
}

pub fn write_note(
    repo: &GixRepo,
    notes_ref: &RefName,
    target: GitOid,
    author: &Signature,
    committer: &Signature,
    message: &[u8],
    force: bool,
) -> Result<GitOid, GitError> {
    let hex = target.to_string();
    let previous = read_ref(repo, notes_ref)?;

    let (base_tree, existing) = match previous {
        Some(commit) => {
            let tree = read_commit(repo, commit)?.tree_oid;
            (tree, locate(repo, tree, "", &hex)?)
        }
        None => (write_tree(repo, &[])?, None),
    };

    let mut edits = Vec::new();
    if let Some((path, _)) = existing {
        if !force {
            return Err(GitError::AlreadyExists {
                message: format!("note for {target} already exists under {notes_ref}"),
            });
        }
        edits.push(TreeEdit::Remove { path });
    }
    edits.push(TreeEdit::Upsert {
        path: hex.into(),
        mode: EntryMode::Blob,
        oid: write_blob(repo, message)?,
    });
    let tree = edit_tree(repo, base_tree, &edits)?;

    let commit = create_commit(
        repo,
        &NewCommit {
            tree,
            parents: previous.into_iter().collect(),
            author: author.clone(),
            committer: committer.clone(),
            encoding: None,
            message: NOTES_COMMIT_MESSAGE.into(),
        },
    )?;

    atomic_ref_update(
        repo,
        &[RefEdit {
            name: notes_ref.clone(),
            new_oid: commit,
            expected_old_oid: previous.unwrap_or(GitOid::ZERO),
            log_message: format!("notes: {}", NOTES_COMMIT_MESSAGE.trim_end()),
        }],
    )?;
    tracing::debug!(%notes_ref, %target, %commit, "wrote note");
    Ok(commit)
}
