//! gix-backed config reads.

use crate::error::GitError;
use crate::gix_repo::GixRepo;

pub fn read_config(repo: &GixRepo, key: &str) -> Result<Option<String>, GitError> {
    let snapshot = repo.repo.config_snapshot();
    Ok(snapshot.string(key).map(|value| value.to_string()))
}

pub fn read_config_bool(repo: &GixRepo, key: &str) -> Result<Option<bool>, GitError> {
    let snapshot = repo.repo.config_snapshot();
    snapshot
        .try_boolean(key)
        .transpose()
        .map_err(|e| GitError::BackendError {
            message: format!("config value '{key}' is not a boolean: {e}"),
        })
}
