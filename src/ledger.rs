//! The rewritten-commits ledger and note migration.
//!
//! Every committed step appends `<old> <new>\n` to `rewritten`. The file is
//! only ever appended to, so a crash leaves a complete prefix. `finish`
//! replays it to carry notes from old commits to their rewritten versions.

#![allow(clippy::missing_errors_doc)]

use replay_git::{GitOid, GitRepo, Signature};

use crate::error::RebaseError;
use crate::options::RebaseOptions;
use crate::state::{REWRITTEN_FILE, RebaseState, StateDir};

/// One completed step: `old` was replayed as `new`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RewrittenPair {
    /// The commit that was replayed.
    pub old: GitOid,
    /// The commit it became.
    pub new: GitOid,
}

/// Append a pair to the ledger, creating the file on first use.
pub fn append(dir: &StateDir, pair: RewrittenPair) -> Result<(), RebaseError> {
    dir.append(REWRITTEN_FILE, &format!("{} {}\n", pair.old, pair.new))
}

/// Parse ledger text.
///
/// Every line must be two 40-character hex ids separated by one space and
/// terminated by a newline. The first bad line fails the whole parse.
///
/// # Errors
/// [`RebaseError::CorruptLedger`] with the 1-based number of the bad line.
pub fn parse(text: &str) -> Result<Vec<RewrittenPair>, RebaseError> {
    let mut pairs = Vec::new();
    let mut rest = text;
    let mut line = 1;
    while !rest.is_empty() {
        let corrupt = || RebaseError::CorruptLedger { line };
        let (entry, tail) = rest.split_once('\n').ok_or_else(corrupt)?;
        let (old, new) = entry.split_once(' ').ok_or_else(corrupt)?;
        if old.len() != GitOid::HEX_LEN || new.len() != GitOid::HEX_LEN {
            return Err(corrupt());
        }
        pairs.push(RewrittenPair {
            old: old.parse().map_err(|_| corrupt())?,
            new: new.parse().map_err(|_| corrupt())?,
        });
        rest = tail;
        line += 1;
    }
    Ok(pairs)
}

/// Read and parse the ledger. A missing file means nothing was committed yet.
pub fn read(dir: &StateDir) -> Result<Vec<RewrittenPair>, RebaseError> {
    let path = dir.file(REWRITTEN_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => parse(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(RebaseError::io(path, e)),
    }
}

/// Copy notes from each replayed commit to its rewritten version.
///
/// Does nothing unless `opts` names a notes ref. Commits without a note are
/// skipped. Copied notes keep their author and message; `committer` records
/// the copy. Returns how many notes were copied.
///
/// # Errors
/// [`RebaseError::CorruptLedger`] for a malformed ledger, and
/// `Git(AlreadyExists)` when a rewritten commit already carries a note.
#[tracing::instrument(skip_all, fields(notes_ref = tracing::field::Empty))]
pub fn copy_notes(
    repo: &dyn GitRepo,
    state: &RebaseState,
    committer: &Signature,
    opts: &RebaseOptions,
) -> Result<usize, RebaseError> {
    let Some(notes_ref) = &opts.rewrite_notes_ref else {
        return Ok(0);
    };
    tracing::Span::current().record("notes_ref", notes_ref.as_str());

    let mut copied = 0;
    for pair in read(&state.dir)? {
        let Some(note) = repo.read_note(notes_ref, pair.old)? else {
            continue;
        };
        repo.write_note(
            notes_ref,
            pair.new,
            &note.author,
            committer,
            &note.message,
            false,
        )?;
        copied += 1;
        tracing::debug!(old = %pair.old, new = %pair.new, "copied note");
    }
    tracing::info!(copied, "notes rewritten");
    Ok(copied)
}
