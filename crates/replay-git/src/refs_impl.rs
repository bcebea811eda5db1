//! gix-backed ref and rev-parse operations.

use gix::refs::transaction::{Change, LogChange, PreviousValue, RefLog};
use gix::refs::{FullName, Target};

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{GitOid, RefEdit, RefName};

fn full_name(name: &RefName) -> Result<FullName, GitError> {
    name.as_str()
        .try_into()
        .map_err(|e: gix::validate::reference::name::Error| GitError::BackendError {
            message: format!("invalid ref name '{name}': {e}"),
        })
}

fn log_change(message: &str) -> LogChange {
    LogChange {
        mode: RefLog::AndReference,
        force_create_reflog: false,
        message: message.into(),
    }
}

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut r)) => match r.peel_to_id_in_place() {
            Ok(id) => Ok(Some(from_gix_oid(id.as_ref()))),
            // A symbolic ref to an unborn branch resolves to nothing.
            Err(_) if r.target().try_id().is_none() => Ok(None),
            Err(e) => Err(GitError::backend(e)),
        },
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::backend(e)),
    }
}

pub fn write_ref(
    repo: &GixRepo,
    name: &RefName,
    oid: GitOid,
    log_message: &str,
) -> Result<(), GitError> {
    tracing::debug!(%name, %oid, log_message, "write ref");
    repo.repo
        .reference(name.as_str(), to_gix_oid(oid), PreviousValue::Any, log_message)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write ref '{name}': {e}"),
        })?;
    Ok(())
}

pub fn write_symbolic_ref(
    repo: &GixRepo,
    name: &RefName,
    target: &RefName,
    log_message: &str,
) -> Result<(), GitError> {
    tracing::debug!(%name, %target, log_message, "write symbolic ref");
    let edit = gix::refs::transaction::RefEdit {
        change: Change::Update {
            log: log_change(log_message),
            expected: PreviousValue::Any,
            new: Target::Symbolic(full_name(target)?),
        },
        name: full_name(name)?,
        deref: false,
    };
    repo.repo
        .edit_reference(edit)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to point '{name}' at '{target}': {e}"),
        })?;
    Ok(())
}

pub fn atomic_ref_update(repo: &GixRepo, edits: &[RefEdit]) -> Result<(), GitError> {
    // Check expectations up front so a mismatch is always reported as a
    // RefConflict, whatever wording the backend uses.
    for edit in edits {
        let current = read_ref(repo, &edit.name)?.unwrap_or(GitOid::ZERO);
        if current != edit.expected_old_oid {
            return Err(GitError::RefConflict {
                ref_name: edit.name.to_string(),
                message: format!(
                    "expected {}, found {current}",
                    edit.expected_old_oid
                ),
            });
        }
    }

    let gix_edits = edits
        .iter()
        .map(|edit| {
            let expected = if edit.expected_old_oid.is_zero() {
                PreviousValue::MustNotExist
            } else {
                PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(
                    edit.expected_old_oid,
                )))
            };
            Ok(gix::refs::transaction::RefEdit {
                change: Change::Update {
                    log: log_change(&edit.log_message),
                    expected,
                    new: Target::Object(to_gix_oid(edit.new_oid)),
                },
                name: full_name(&edit.name)?,
                deref: false,
            })
        })
        .collect::<Result<Vec<_>, GitError>>()?;

    repo.repo.edit_references(gix_edits).map_err(|e| {
        let msg = e.to_string();
        // A concurrent writer can still slip in between the check and the
        // transaction lock.
        if msg.contains("existing object id")
            || msg.contains("MustExistAndMatch")
            || msg.contains("did not match")
            || msg.contains("MustNotExist")
        {
            let ref_name = edits
                .first()
                .map(|e| e.name.to_string())
                .unwrap_or_default();
            GitError::RefConflict {
                ref_name,
                message: msg,
            }
        } else {
            GitError::BackendError { message: msg }
        }
    })?;
    Ok(())
}

pub fn head_name(repo: &GixRepo) -> Result<Option<RefName>, GitError> {
    let name = repo.repo.head_name().map_err(GitError::backend)?;
    name.map(|n| {
        RefName::new(&n.as_bstr().to_string()).map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })
    })
    .transpose()
}

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    let id = repo
        .repo
        .rev_parse_single(spec)
        .map_err(|e| GitError::NotFound {
            message: format!("rev-parse '{spec}': {e}"),
        })?;
    Ok(from_gix_oid(id.as_ref()))
}
