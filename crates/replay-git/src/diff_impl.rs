//! Tree-to-tree diff built on recursive tree reads.
//!
//! Both trees are flattened to `path -> (mode, oid)` maps and compared.
//! Renames are not detected: a rename shows up as a deletion plus an
//! addition.

use std::collections::BTreeMap;

use bstr::BString;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::objects_impl::read_tree;
use crate::types::{ChangeType, DiffEntry, EntryMode, GitOid};

type Flat = BTreeMap<BString, (EntryMode, GitOid)>;

fn flatten(repo: &GixRepo, tree: GitOid, prefix: &[u8], out: &mut Flat) -> Result<(), GitError> {
    for entry in read_tree(repo, tree)? {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            let mut joined = BString::from(prefix);
            joined.push(b'/');
            joined.extend_from_slice(&entry.name);
            joined
        };
        if entry.mode == EntryMode::Tree {
            flatten(repo, entry.oid, &path, out)?;
        } else {
            out.insert(path, (entry.mode, entry.oid));
        }
    }
    Ok(())
}

pub fn diff_trees(
    repo: &GixRepo,
    old: Option<GitOid>,
    new: GitOid,
) -> Result<Vec<DiffEntry>, GitError> {
    if old == Some(new) {
        return Ok(Vec::new());
    }

    let mut old_flat = Flat::new();
    if let Some(old) = old {
        flatten(repo, old, b"", &mut old_flat)?;
    }
    let mut new_flat = Flat::new();
    flatten(repo, new, b"", &mut new_flat)?;

    let mut changes = Vec::new();
    for (path, &(old_mode, old_oid)) in &old_flat {
        match new_flat.get(path) {
            None => changes.push(DiffEntry {
                path: path.clone(),
                change_type: ChangeType::Deleted,
                old_oid,
                new_oid: GitOid::ZERO,
                old_mode: Some(old_mode),
                new_mode: None,
            }),
            Some(&(new_mode, new_oid)) if new_mode != old_mode || new_oid != old_oid => {
                changes.push(DiffEntry {
                    path: path.clone(),
                    change_type: ChangeType::Modified,
                    old_oid,
                    new_oid,
                    old_mode: Some(old_mode),
                    new_mode: Some(new_mode),
                });
            }
            Some(_) => {}
        }
    }
    for (path, &(new_mode, new_oid)) in &new_flat {
        if !old_flat.contains_key(path) {
            changes.push(DiffEntry {
                path: path.clone(),
                change_type: ChangeType::Added,
                old_oid: GitOid::ZERO,
                new_oid,
                old_mode: None,
                new_mode: Some(new_mode),
            });
        }
    }
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(changes)
}
