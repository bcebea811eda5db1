//! Git abstraction layer for git-replay.
//!
//! This crate defines the [`GitRepo`] trait, the single interface through
//! which the rebase engine talks to git. The engine never imports gix (or any
//! other git library) directly; it depends on `replay-git` and programs
//! against the trait.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`CommitInfo`], [`MergeOutcome`], etc.).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.
//!
//! Paths, messages and identities travel as [`BString`]: git stores them as
//! bytes, and a rebase must write back exactly what it read.

pub mod error;
pub mod repo;
pub mod types;

// gix-backed implementation modules
mod checkout_impl;
mod config_impl;
mod diff_impl;
mod gix_repo;
mod index_impl;
mod merge_impl;
mod notes_impl;
mod objects_impl;
mod refs_impl;
mod status_impl;
mod walk_impl;

pub use bstr::{BStr, BString, ByteSlice};
pub use gix_repo::GixRepo;

// Re-export the main trait and commonly used types at the crate root for
// ergonomic imports: `use replay_git::{GitRepo, GitOid, GitError};`
pub use error::GitError;
pub use repo::GitRepo;
pub use types::{
    BRANCH_PREFIX, ChangeType, CheckoutStrategy, CommitInfo, DiffEntry, EntryMode, FileStatus,
    GitOid, GitTime, IndexEntry, MergeLabels, MergeOutcome, NewCommit, Note, OidParseError,
    RefEdit, RefName, RefNameError, Signature, StatusEntry,
};
