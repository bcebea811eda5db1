//! The rebase state machine.
//!
//! A rebase moves `NotStarted -> InProgress(0..=end) -> Finished | Aborted`.
//! Every call reloads state from disk, so a rebase survives process restarts
//! and the pause between [`advance`] and [`commit`] can last indefinitely.
//!
//! ```text
//! begin ─► advance ─► (resolve) ─► commit ─► advance ... ─► Exhausted ─► finish
//!              └──────────────────── abort ◄─────────────────────┘
//! ```

use replay_git::{
    BString, CommitInfo, GitOid, GitRepo, MergeLabels, NewCommit, RefEdit, RefName, Signature,
};
use serde::Serialize;
use tracing::field::Empty;
use tracing::instrument;

use crate::error::RebaseError;
use crate::ledger::{self, RewrittenPair};
use crate::options::{CheckoutOptions, DEFAULT_ANCESTOR_LABEL, RebaseOptions};
use crate::planner::Endpoint;
use crate::state::{self, RebaseKind, RebaseState};

const COMMIT_REFLOG: &str = "rebase";
const ABORT_REFLOG: &str = "rebase: aborting";

/// Result of [`advance`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// A step was started and its merge materialized.
    Step(Step),
    /// Every queued commit has been replayed. Nothing was changed.
    Exhausted,
}

/// A started step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// 1-based step number.
    pub number: usize,
    /// Total number of steps.
    pub total: usize,
    /// The commit being replayed.
    pub commit: CommitInfo,
    /// Paths the merge left conflicted. Empty for a clean step.
    pub conflicts: Vec<String>,
}

/// Result of [`commit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created and `HEAD` moved to it.
    Committed(GitOid),
    /// The index already matches `HEAD`; the step's changes are present
    /// upstream. No commit was made and nothing was recorded.
    AlreadyApplied,
}

/// Read-only view of a rebase in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RebaseProgress {
    /// The rebase flavor.
    pub kind: RebaseKind,
    /// Last step started, `0` before the first.
    pub step: usize,
    /// Number of queued steps.
    pub total: usize,
    /// Display name of the onto commit.
    pub onto_name: String,
    /// The branch being rebased, if it had one.
    pub head_name: Option<String>,
    /// Commit replayed by the current step.
    pub current: Option<String>,
    /// Summary of that commit.
    pub current_summary: Option<String>,
    /// Steps committed so far.
    pub rewritten: usize,
}

// ---------------------------------------------------------------------------
// begin
// ---------------------------------------------------------------------------

/// Start rebasing `branch` onto `onto` (or `upstream` when `onto` is
/// absent).
///
/// Refuses a bare repository, a rebase already in progress, an unborn
/// `HEAD`, and any staged or unstaged change to tracked files. On success
/// `HEAD` is detached at `onto` and the working tree matches it.
///
/// # Errors
/// See [`RebaseError`]. If anything fails after the state directory was
/// created, the directory is removed first.
#[instrument(skip_all, fields(branch = %branch.display_name(), by = %signature))]
pub fn begin(
    repo: &dyn GitRepo,
    branch: &Endpoint,
    upstream: Option<&Endpoint>,
    onto: Option<&Endpoint>,
    signature: &Signature,
    opts: &RebaseOptions,
) -> Result<RebaseState, RebaseError> {
    let onto = onto.or(upstream).ok_or(RebaseError::MissingTarget)?;
    let opts = opts.normalize(repo)?;

    if repo.is_bare() {
        return Err(RebaseError::BareRepository {
            path: repo.git_dir().to_path_buf(),
        });
    }
    if let Some((kind, _)) = state::detect(repo.git_dir()) {
        tracing::debug!(%kind, "found existing rebase state");
        return Err(RebaseError::AlreadyInProgress);
    }
    ensure_clean(repo)?;

    let (dir, plan) = state::save_fixed(repo, branch, upstream, onto, opts.quiet)?;

    let detach = || -> Result<(), RebaseError> {
        let message = format!("rebase: checkout {}", plan.onto_name);
        repo.write_ref(&RefName::head(), onto.id, &message)?;
        repo.checkout_head_force()?;
        Ok(())
    };
    if let Err(e) = detach() {
        if let Err(cleanup) = dir.remove() {
            tracing::warn!(error = %cleanup, "failed to remove rebase state after checkout error");
        }
        return Err(e);
    }

    tracing::info!(steps = plan.commits.len(), onto = %plan.onto_name, "rebase started");
    RebaseState::load(repo)
}

fn ensure_clean(repo: &dyn GitRepo) -> Result<(), RebaseError> {
    let head = repo.rev_parse("HEAD")?;
    let head_tree = repo.read_commit(head)?.tree_oid;
    if !repo.diff_tree_to_index(Some(head_tree))?.is_empty() {
        return Err(RebaseError::DirtyIndex);
    }
    if !repo.diff_index_to_workdir()?.is_empty() {
        return Err(RebaseError::DirtyWorkdir);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// advance
// ---------------------------------------------------------------------------

/// Start the next step: replay the next queued commit onto `HEAD`.
///
/// The step counter and current commit are persisted before the merge runs.
/// Conflicts are not an error; they are left in the index and working tree
/// and listed in [`Step::conflicts`].
///
/// # Errors
/// [`RebaseError::MergeCommit`] if the queued commit has several parents,
/// [`RebaseError::MergeFailed`] if no merge could be computed, and
/// `Git(DirtyWorktree)` when a safe checkout would overwrite local changes.
#[instrument(skip_all, fields(step = Empty, total = Empty, commit = Empty))]
pub fn advance(repo: &dyn GitRepo, opts: &CheckoutOptions) -> Result<Advance, RebaseError> {
    let state = RebaseState::load(repo)?;
    let span = tracing::Span::current();
    span.record("total", state.merge.end);

    if state.merge.is_exhausted() {
        tracing::info!("no steps left");
        return Ok(Advance::Exhausted);
    }

    let number = state.merge.msgnum + 1;
    let id = state.dir.read_queued(number)?;
    span.record("step", number);
    span.record("commit", tracing::field::display(id));

    let commit = repo.read_commit(id)?;
    let head = repo.rev_parse("HEAD")?;
    let head_tree = repo.read_commit(head)?.tree_oid;

    if commit.is_merge() {
        return Err(RebaseError::MergeCommit { commit: id });
    }
    let parent_tree = match commit.parents.first() {
        Some(parent) => Some(repo.read_commit(*parent)?.tree_oid),
        None => None,
    };

    let labels = MergeLabels {
        ancestor: opts
            .ancestor_label
            .clone()
            .unwrap_or_else(|| DEFAULT_ANCESTOR_LABEL.to_owned()),
        ours: opts
            .our_label
            .clone()
            .unwrap_or_else(|| state.merge.onto_name.clone()),
        theirs: opts.their_label.clone().unwrap_or_else(|| commit.summary()),
    };

    state.dir.write_step_files(number, id)?;

    let outcome = repo.merge_trees(parent_tree, head_tree, commit.tree_oid, &labels)?;
    repo.checkout_merge(&outcome, opts.strategy)?;

    if outcome.has_conflicts() {
        tracing::info!(conflicts = outcome.conflicts.len(), "step stopped with conflicts");
    } else {
        tracing::info!("step applied cleanly");
    }
    Ok(Advance::Step(Step {
        number,
        total: state.merge.end,
        commit,
        conflicts: outcome.conflicts,
    }))
}

// ---------------------------------------------------------------------------
// commit
// ---------------------------------------------------------------------------

/// Commit the current step's resolved index on top of `HEAD`.
///
/// Author, message and encoding default to the replayed commit's, copied
/// byte for byte. The ref behind `HEAD` moves by compare-and-swap against
/// the `HEAD` read here, and the pair is appended to the ledger.
///
/// # Errors
/// [`RebaseError::NoStepInProgress`] before the first [`advance`],
/// [`RebaseError::MergeConflict`] while conflicts remain, and
/// [`RebaseError::RefRace`] if `HEAD` moved underneath us.
#[instrument(skip_all, fields(step = Empty, commit = Empty))]
pub fn commit(
    repo: &dyn GitRepo,
    author: Option<&Signature>,
    committer: &Signature,
    message_encoding: Option<&str>,
    message: Option<&str>,
) -> Result<CommitOutcome, RebaseError> {
    let state = RebaseState::load(repo)?;
    let current = match &state.merge.current {
        Some(current) if state.merge.msgnum > 0 => current,
        _ => return Err(RebaseError::NoStepInProgress),
    };
    let span = tracing::Span::current();
    span.record("step", state.merge.msgnum);
    span.record("commit", tracing::field::display(current.oid));

    let conflicts = repo.index_conflicts()?;
    if !conflicts.is_empty() {
        return Err(RebaseError::MergeConflict { paths: conflicts });
    }

    let head = repo.rev_parse("HEAD")?;
    let head_tree = repo.read_commit(head)?.tree_oid;
    let tree = repo.write_index_tree()?;
    if repo.diff_trees(Some(head_tree), tree)?.is_empty() {
        tracing::info!("changes already applied");
        return Ok(CommitOutcome::AlreadyApplied);
    }

    let (message, encoding) = match message {
        Some(message) => (BString::from(message), message_encoding.map(BString::from)),
        None => (current.message.clone(), current.encoding.clone()),
    };
    let id = repo.create_commit(&NewCommit {
        tree,
        parents: vec![head],
        author: author.unwrap_or(&current.author).clone(),
        committer: committer.clone(),
        encoding,
        message,
    })?;

    let target = repo.head_name()?.unwrap_or_else(RefName::head);
    repo.atomic_ref_update(&[RefEdit {
        name: target,
        new_oid: id,
        expected_old_oid: head,
        log_message: COMMIT_REFLOG.to_owned(),
    }])?;

    ledger::append(
        &state.dir,
        RewrittenPair {
            old: current.oid,
            new: id,
        },
    )?;
    tracing::info!(new = %id, "step committed");
    Ok(CommitOutcome::Committed(id))
}

// ---------------------------------------------------------------------------
// abort / finish
// ---------------------------------------------------------------------------

/// Abandon the rebase: put `HEAD`, the index and the working tree back where
/// they were before [`begin`], then drop the state. Notes are not copied.
///
/// # Errors
/// [`RebaseError::NotInProgress`] without a rebase, plus any ref or checkout
/// failure.
#[instrument(skip_all, fields(by = %signature))]
pub fn abort(repo: &dyn GitRepo, signature: &Signature) -> Result<(), RebaseError> {
    let state = RebaseState::load(repo)?;

    match &state.orig_head_name {
        Some(branch) => repo.write_symbolic_ref(&RefName::head(), branch, ABORT_REFLOG)?,
        None => repo.write_ref(&RefName::head(), state.orig_head_id, ABORT_REFLOG)?,
    }
    repo.reset_hard(state.orig_head_id, ABORT_REFLOG)?;
    state.dir.remove()?;

    tracing::info!(head = %state.orig_head_id, "rebase aborted");
    Ok(())
}

/// Complete the rebase: move the original branch to the current `HEAD`,
/// reattach `HEAD` to it, copy notes, and drop the state.
///
/// The branch moves by compare-and-swap against its pre-rebase tip. If the
/// branch moves but reattaching `HEAD` then fails, the branch is not rolled
/// back. A rebase of a detached `HEAD` leaves `HEAD` detached.
///
/// # Errors
/// [`RebaseError::RefRace`] if the branch moved during the rebase.
#[instrument(skip_all, fields(branch = Empty, by = %signature))]
pub fn finish(
    repo: &dyn GitRepo,
    signature: &Signature,
    opts: &RebaseOptions,
) -> Result<(), RebaseError> {
    let opts = opts.normalize(repo)?;
    let state = RebaseState::load(repo)?;
    let terminal = repo.rev_parse("HEAD")?;

    if let Some(branch) = &state.orig_head_name {
        tracing::Span::current().record("branch", branch.as_str());
        repo.atomic_ref_update(&[RefEdit {
            name: branch.clone(),
            new_oid: terminal,
            expected_old_oid: state.orig_head_id,
            log_message: format!("rebase finished: {branch} onto {}", state.onto_id),
        }])?;
        repo.write_symbolic_ref(
            &RefName::head(),
            branch,
            &format!("rebase finished: returning to {branch}"),
        )?;
    }

    ledger::copy_notes(repo, &state, signature, &opts)?;
    state.dir.remove()?;

    tracing::info!(tip = %terminal, "rebase finished");
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// Describe the rebase in progress, or `None` when there is none.
///
/// # Errors
/// [`RebaseError::Unsupported`] for state this crate cannot drive, plus any
/// load error.
pub fn status(repo: &dyn GitRepo) -> Result<Option<RebaseProgress>, RebaseError> {
    if state::detect(repo.git_dir()).is_none() {
        return Ok(None);
    }
    let state = RebaseState::load(repo)?;
    let rewritten = ledger::read(&state.dir)?.len();
    let current = state.merge.current.as_ref();
    Ok(Some(RebaseProgress {
        kind: RebaseKind::Merge,
        step: state.merge.msgnum,
        total: state.merge.end,
        onto_name: state.merge.onto_name.clone(),
        head_name: state.orig_head_name.as_ref().map(ToString::to_string),
        current: current.map(|c| c.oid.to_string()),
        current_summary: current.map(CommitInfo::summary),
        rewritten,
    }))
}
