//! Commit sequence planning.
//!
//! Computes which commits a rebase replays and queues them as `cmt.N` files.

#![allow(clippy::missing_errors_doc)]

use replay_git::{GitOid, GitRepo, RefName};

use crate::error::RebaseError;
use crate::state::{END_FILE, ONTO_NAME_FILE, StateDir, cmt_file};

/// A commit taking part in a rebase, with the ref it was named by, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// The commit.
    pub id: GitOid,
    /// The ref the caller used to name it.
    pub ref_name: Option<RefName>,
}

impl Endpoint {
    /// An endpoint without a ref.
    #[must_use]
    pub const fn from_id(id: GitOid) -> Self {
        Self { id, ref_name: None }
    }

    /// Resolve a user-supplied revision.
    ///
    /// A short branch name or a full ref name keeps the ref, so it can be
    /// moved at finish and shown in messages. Anything else (an object id,
    /// `HEAD~2`) is resolved to a bare commit.
    pub fn resolve(repo: &dyn GitRepo, spec: &str) -> Result<Self, RebaseError> {
        let candidates = [
            RefName::branch(spec).ok(),
            RefName::new(spec)
                .ok()
                .filter(|r| r.as_str().starts_with("refs/")),
        ];
        for name in candidates.into_iter().flatten() {
            if let Some(id) = repo.read_ref(&name)? {
                return Ok(Self {
                    id,
                    ref_name: Some(name),
                });
            }
        }
        let id = repo.rev_parse(spec)?;
        let commit = repo.read_commit(id)?;
        Ok(Self::from_id(commit.oid))
    }

    /// The current `HEAD`: its branch when attached, the bare commit when
    /// detached.
    ///
    /// # Errors
    /// [`RebaseError::Git`] with `NotFound` when `HEAD` is unborn.
    pub fn head(repo: &dyn GitRepo) -> Result<Self, RebaseError> {
        let id = repo.rev_parse("HEAD")?;
        let ref_name = repo.head_name()?;
        Ok(Self { id, ref_name })
    }

    /// The name shown in messages and conflict markers: the short branch
    /// name for `refs/heads/*`, the full ref name for other refs, or the
    /// hex id.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.ref_name {
            Some(name) => name
                .short_branch_name()
                .unwrap_or_else(|| name.as_str())
                .to_owned(),
            None => self.id.to_string(),
        }
    }
}

/// What the planner queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    /// The queued commits, oldest first.
    pub commits: Vec<GitOid>,
    /// Display name written to `onto_name`.
    pub onto_name: String,
}

/// Queue every non-merge commit reachable from `branch` but not from
/// `upstream` (or `onto`, when no upstream is given), oldest first.
///
/// Writes `cmt.1..=cmt.N`, then `end`, then `onto_name`.
pub fn plan(
    repo: &dyn GitRepo,
    dir: &StateDir,
    branch: &Endpoint,
    upstream: Option<&Endpoint>,
    onto: &Endpoint,
) -> Result<Plan, RebaseError> {
    let upstream = upstream.unwrap_or(onto);
    let walked = repo.walk_commits(&[branch.id], &[upstream.id])?;

    let mut commits = Vec::with_capacity(walked.len());
    for id in walked {
        let commit = repo.read_commit(id)?;
        if commit.is_merge() {
            tracing::debug!(commit = %id, "skipping merge commit");
            continue;
        }
        commits.push(id);
        dir.write_line(&cmt_file(commits.len()), &id.to_string())?;
    }

    let onto_name = onto.display_name();
    dir.write_line(END_FILE, &commits.len().to_string())?;
    dir.write_line(ONTO_NAME_FILE, &onto_name)?;

    tracing::info!(
        steps = commits.len(),
        branch = %branch.id,
        upstream = %upstream.id,
        onto = %onto_name,
        "planned rebase"
    );
    Ok(Plan { commits, onto_name })
}

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    fn oid() -> GitOid {
        "0123456789abcdef0123456789abcdef01234567".parse().unwrap()
    }

    #[test]
    fn display_name_strips_branch_prefix() {
        let e = Endpoint {
            id: oid(),
            ref_name: Some(RefName::branch("master").unwrap()),
        };
        assert_eq!(e.display_name(), "master");
    }

    #[test]
    fn display_name_keeps_other_refs() {
        let e = Endpoint {
            id: oid(),
            ref_name: Some(RefName::new("refs/remotes/origin/main").unwrap()),
        };
        assert_eq!(e.display_name(), "refs/remotes/origin/main");
    }

    #[test]
    fn display_name_falls_back_to_hex() {
        assert_eq!(
            Endpoint::from_id(oid()).display_name(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }
}
