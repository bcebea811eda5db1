//! gix-backed history traversal.

use std::collections::HashSet;

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::GitOid;

/// Every commit reachable from `tips`, in walker order.
fn reachable(repo: &GixRepo, tips: &[GitOid]) -> Result<Vec<gix::ObjectId>, GitError> {
    if tips.is_empty() {
        return Ok(Vec::new());
    }
    let walk = repo
        .repo
        .rev_walk(tips.iter().copied().map(to_gix_oid))
        .all()
        .map_err(GitError::backend)?;

    let mut ids = Vec::new();
    for info in walk {
        let info = info.map_err(GitError::backend)?;
        ids.push(info.id);
    }
    Ok(ids)
}

fn commit_time(repo: &GixRepo, id: gix::ObjectId) -> Result<i64, GitError> {
    let commit = repo.repo.find_commit(id).map_err(|e| GitError::NotFound {
        message: format!("commit {id}: {e}"),
    })?;
    let time = commit.time().map_err(|e| GitError::BackendError {
        message: format!("failed to read commit time of {id}: {e}"),
    })?;
    Ok(time.seconds)
}

pub fn walk_commits(
    repo: &GixRepo,
    tips: &[GitOid],
    hidden: &[GitOid],
) -> Result<Vec<GitOid>, GitError> {
    let hidden: HashSet<gix::ObjectId> = reachable(repo, hidden)?.into_iter().collect();

    let mut timed = Vec::new();
    for id in reachable(repo, tips)? {
        if hidden.contains(&id) {
            continue;
        }
        timed.push((commit_time(repo, id)?, id));
    }

    // Newest first; the sort is stable so equal timestamps keep walk order.
    timed.sort_by(|a, b| b.0.cmp(&a.0));

    let commits: Vec<GitOid> = timed
        .into_iter()
        .rev()
        .map(|(_, id)| from_gix_oid(&id))
        .collect();
    tracing::debug!(
        count = commits.len(),
        hidden = hidden.len(),
        "walked commits"
    );
    Ok(commits)
}
