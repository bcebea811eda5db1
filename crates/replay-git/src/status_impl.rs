//! gix-backed dirty detection and index-to-worktree changes.

use gix::status::index_worktree::iter::Summary;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{FileStatus, StatusEntry};

pub fn is_dirty(repo: &GixRepo) -> Result<bool, GitError> {
    repo.repo.is_dirty().map_err(GitError::backend)
}

/// Tracked files whose worktree content differs from the index.
///
/// Untracked files are not walked at all.
pub fn diff_index_to_workdir(repo: &GixRepo) -> Result<Vec<StatusEntry>, GitError> {
    let iter = repo
        .repo
        .status(gix::progress::Discard)
        .map_err(GitError::backend)?
        .untracked_files(gix::status::UntrackedFiles::None)
        .into_index_worktree_iter(Vec::new())
        .map_err(GitError::backend)?;

    let mut entries = Vec::new();
    for item in iter {
        let item = item.map_err(GitError::backend)?;
        if let Some(entry) = convert_status_item(&item) {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn convert_status_item(item: &gix::status::index_worktree::Item) -> Option<StatusEntry> {
    let status = match item.summary()? {
        // What the dirwalk reports for files the index does not know.
        Summary::Added => return None,
        Summary::IntentToAdd | Summary::Copied => FileStatus::Added,
        Summary::Modified | Summary::TypeChange | Summary::Conflict => FileStatus::Modified,
        Summary::Removed => FileStatus::Deleted,
        Summary::Renamed => FileStatus::Renamed,
    };
    Some(StatusEntry {
        path: item.rela_path().to_owned(),
        status,
    })
}
