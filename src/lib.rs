//! git-replay library crate: a resumable, merge-based rebase engine.
//!
//! The engine replays the commits of one branch onto another, one step at a
//! time, persisting its progress under `<git-dir>/rebase-merge/` in the same
//! layout git itself uses. All git access goes through
//! [`replay_git::GitRepo`], passed explicitly to every operation.
//!
//! ```no_run
//! use replay::{Advance, CheckoutOptions, CommitOutcome, Endpoint, RebaseOptions};
//! use replay_git::{GixRepo, Signature};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = GixRepo::open(std::path::Path::new("."))?;
//! let me = Signature::now("A U Thor", "author@example.com");
//! let branch = Endpoint::resolve(&repo, "topic")?;
//! let onto = Endpoint::resolve(&repo, "main")?;
//!
//! replay::begin(&repo, &branch, None, Some(&onto), &me, &RebaseOptions::default())?;
//! while let Advance::Step(step) = replay::advance(&repo, &CheckoutOptions::default())? {
//!     assert!(step.conflicts.is_empty());
//!     if let CommitOutcome::Committed(id) = replay::commit(&repo, None, &me, None, None)? {
//!         println!("{} -> {id}", step.commit.oid);
//!     }
//! }
//! replay::finish(&repo, &me, &RebaseOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod ledger;
pub mod options;
pub mod planner;
pub mod state;

pub use driver::{
    Advance, CommitOutcome, RebaseProgress, Step, abort, advance, begin, commit, finish, status,
};
pub use error::RebaseError;
pub use ledger::{RewrittenPair, copy_notes};
pub use options::{CheckoutOptions, DEFAULT_ANCESTOR_LABEL, RebaseOptions};
pub use planner::{Endpoint, Plan};
pub use state::{MergeState, RebaseKind, RebaseState, StateDir, detect};
