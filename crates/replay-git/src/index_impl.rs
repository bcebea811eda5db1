//! Index (staging area) operations for [`GixRepo`].

use std::collections::HashMap;

use bstr::{BString, ByteSlice};

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{EntryMode, GitOid, IndexEntry};

/// Bits 12-13 of the entry flags hold the merge stage.
const STAGE_SHIFT: u32 = 12;
const STAGE_MASK: u32 = 0b11 << STAGE_SHIFT;

pub(crate) fn gix_mode_to_entry_mode(mode: gix::index::entry::Mode) -> Option<EntryMode> {
    Some(match mode {
        gix::index::entry::Mode::FILE => EntryMode::Blob,
        gix::index::entry::Mode::FILE_EXECUTABLE => EntryMode::BlobExecutable,
        gix::index::entry::Mode::SYMLINK => EntryMode::Link,
        gix::index::entry::Mode::DIR => EntryMode::Tree,
        gix::index::entry::Mode::COMMIT => EntryMode::Commit,
        _ => return None,
    })
}

pub(crate) fn entry_mode_to_gix_mode(mode: EntryMode) -> gix::index::entry::Mode {
    match mode {
        EntryMode::Blob => gix::index::entry::Mode::FILE,
        EntryMode::BlobExecutable => gix::index::entry::Mode::FILE_EXECUTABLE,
        EntryMode::Link => gix::index::entry::Mode::SYMLINK,
        EntryMode::Tree => gix::index::entry::Mode::DIR,
        EntryMode::Commit => gix::index::entry::Mode::COMMIT,
    }
}

pub(crate) fn entry_stage(entry: &gix::index::Entry) -> u8 {
    // Masked to two bits, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let stage = ((entry.flags.bits() & STAGE_MASK) >> STAGE_SHIFT) as u8;
    stage
}

pub(crate) fn stage_flags(stage: u8) -> gix::index::entry::Flags {
    gix::index::entry::Flags::from_bits_retain((u32::from(stage) << STAGE_SHIFT) & STAGE_MASK)
}

/// Convert every representable entry of an in-memory index.
///
/// Paths are copied as raw bytes; only entries with a mode outside git's
/// file kinds (sparse directory placeholders) are left out.
pub(crate) fn entries_of(state: &gix::index::State) -> Vec<IndexEntry> {
    state
        .entries()
        .iter()
        .filter_map(|entry| {
            let mode = gix_mode_to_entry_mode(entry.mode)?;
            Some(IndexEntry {
                path: entry.path(state).to_owned(),
                mode,
                oid: from_gix_oid(&entry.id),
                stage: entry_stage(entry),
            })
        })
        .collect()
}

pub fn read_index(repo: &GixRepo) -> Result<Vec<IndexEntry>, GitError> {
    let index = repo
        .repo
        .open_index()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to open index: {e}"),
        })?;
    Ok(entries_of(&index))
}

/// Paths with an unresolved conflict stage, sorted, in display form.
pub fn index_conflicts(repo: &GixRepo) -> Result<Vec<String>, GitError> {
    let mut paths: Vec<String> = read_index(repo)?
        .iter()
        .filter(|e| e.is_conflicted())
        .map(|e| e.path.to_str_lossy().into_owned())
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Replace the on-disk index with `entries`.
///
/// `stats` supplies filesystem stat data for entries that were just checked
/// out, keyed by path; everything else gets zeroed stat data and is
/// re-hashed by the next status call.
pub(crate) fn write_index(
    repo: &GixRepo,
    entries: &[IndexEntry],
    stats: &HashMap<BString, gix::index::entry::Stat>,
) -> Result<(), GitError> {
    let mut state = gix::index::State::new(repo.repo.object_hash());

    for ie in entries {
        let stat = if ie.stage == 0 {
            stats.get(&ie.path).copied().unwrap_or_default()
        } else {
            gix::index::entry::Stat::default()
        };
        state.dangerously_push_entry(
            stat,
            to_gix_oid(ie.oid),
            stage_flags(ie.stage),
            entry_mode_to_gix_mode(ie.mode),
            ie.path.as_bstr(),
        );
    }

    state.sort_entries();

    let mut index_file = gix::index::File::from_state(state, repo.repo.index_path());
    index_file
        .write(gix::index::write::Options::default())
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write index: {e}"),
        })?;
    tracing::debug!(entries = entries.len(), "wrote index");
    Ok(())
}

/// Write the current index state as a tree object, returning its OID.
///
/// Conflict stages are skipped: only resolved entries become part of the
/// tree.
pub fn write_index_tree(repo: &GixRepo) -> Result<GitOid, GitError> {
    let index = repo.repo.open_index().map_err(|e| GitError::BackendError {
        message: format!("failed to open index: {e}"),
    })?;

    // Build the tree with an editor seeded from the empty tree.
    let empty_tree_id = repo
        .repo
        .write_object(&gix::objs::Tree::empty())
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write empty tree: {e}"),
        })?;

    let tree = repo
        .repo
        .find_tree(empty_tree_id)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to find empty tree: {e}"),
        })?;

    let mut editor = tree.edit().map_err(|e| GitError::BackendError {
        message: format!("failed to create tree editor: {e}"),
    })?;

    for entry in index.entries() {
        if entry_stage(entry) != 0 {
            continue;
        }
        let path = entry.path(&index);
        let kind = match entry.mode {
            gix::index::entry::Mode::FILE => gix::objs::tree::EntryKind::Blob,
            gix::index::entry::Mode::FILE_EXECUTABLE => {
                gix::objs::tree::EntryKind::BlobExecutable
            }
            gix::index::entry::Mode::SYMLINK => gix::objs::tree::EntryKind::Link,
            gix::index::entry::Mode::COMMIT => gix::objs::tree::EntryKind::Commit,
            _ => continue,
        };

        editor
            .upsert(path, kind, entry.id)
            .map_err(|e| GitError::BackendError {
                message: format!("tree editor upsert '{path}': {e}"),
            })?;
    }

    let tree_id = editor.write().map_err(|e| GitError::BackendError {
        message: format!("failed to write index tree: {e}"),
    })?;

    Ok(from_gix_oid(tree_id.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_flags_roundtrip_through_mask() {
        for stage in 0..=3u8 {
            let flags = stage_flags(stage);
            let back = (flags.bits() & STAGE_MASK) >> STAGE_SHIFT;
            assert_eq!(back, u32::from(stage));
        }
    }

    #[test]
    fn entry_modes_map_both_ways() {
        for mode in [
            EntryMode::Blob,
            EntryMode::BlobExecutable,
            EntryMode::Link,
            EntryMode::Commit,
        ] {
            assert_eq!(gix_mode_to_entry_mode(entry_mode_to_gix_mode(mode)), Some(mode));
        }
    }
}
