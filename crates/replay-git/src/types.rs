//! Core types for the git abstraction layer.
//!
//! These types form the vocabulary shared between the [`GitRepo`](crate::GitRepo) trait and
//! the rebase engine. No gix types leak through here; the backend is an
//! implementation detail.

use std::fmt;
use std::str::FromStr;

use bstr::{BString, ByteSlice};

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Stored as raw bytes for efficient comparison, hashing, and Copy semantics.
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// The zero OID (`0000...0000`), used as a sentinel for "ref does not exist."
    pub const ZERO: Self = Self([0; 20]);

    /// Width of the hex form, in characters.
    pub const HEX_LEN: usize = 40;

    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(OidParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a hex string into a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        // Accept uppercase for leniency during parsing
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated git ref name.
///
/// Must start with `refs/` or be one of the well-known bare names (`HEAD`,
/// `ORIG_HEAD`, etc.).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefName(String);

/// Well-known bare ref names that don't start with `refs/`.
const BARE_REFS: &[&str] = &["HEAD", "FETCH_HEAD", "MERGE_HEAD", "ORIG_HEAD", "CHERRY_PICK_HEAD"];

/// Namespace holding local branches.
pub const BRANCH_PREFIX: &str = "refs/heads/";

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns an error if the name is empty, doesn't start with `refs/`,
    /// and isn't a well-known bare ref.
    pub fn new(name: &str) -> Result<Self, RefNameError> {
        Self::validate(name)?;
        Ok(Self(name.to_owned()))
    }

    /// The `HEAD` pseudo-ref.
    #[must_use]
    pub fn head() -> Self {
        Self("HEAD".to_owned())
    }

    /// The `ORIG_HEAD` recovery slot.
    #[must_use]
    pub fn orig_head() -> Self {
        Self("ORIG_HEAD".to_owned())
    }

    /// `refs/heads/<branch>` for a short branch name.
    ///
    /// # Errors
    /// Returns an error if `branch` is empty.
    pub fn branch(branch: &str) -> Result<Self, RefNameError> {
        if branch.is_empty() {
            return Err(RefNameError {
                value: branch.to_owned(),
                reason: "branch name must not be empty".to_owned(),
            });
        }
        Ok(Self(format!("{BRANCH_PREFIX}{branch}")))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short branch name if this ref lives under `refs/heads/`.
    #[must_use]
    pub fn short_branch_name(&self) -> Option<&str> {
        self.0.strip_prefix(BRANCH_PREFIX)
    }

    fn validate(name: &str) -> Result<(), RefNameError> {
        if name.is_empty() {
            return Err(RefNameError {
                value: name.to_owned(),
                reason: "ref name must not be empty".to_owned(),
            });
        }
        if name.starts_with("refs/") || BARE_REFS.contains(&name) {
            Ok(())
        } else {
            Err(RefNameError {
                value: name.to_owned(),
                reason: "ref name must start with 'refs/' or be a well-known ref (HEAD, etc.)"
                    .to_owned(),
            })
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = RefNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error from validating a [`RefName`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNameError {
    /// The invalid value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for RefNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ref name {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for RefNameError {}

// ---------------------------------------------------------------------------
// RefEdit
// ---------------------------------------------------------------------------

/// A single ref update for use in atomic ref transactions.
///
/// Encodes the ref name, the expected new OID, and the expected old OID for
/// compare-and-swap semantics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefEdit {
    /// The ref to update.
    pub name: RefName,
    /// The new OID to set the ref to.
    pub new_oid: GitOid,
    /// The expected current OID (for CAS). Use [`GitOid::ZERO`] to assert
    /// that the ref must not already exist.
    pub expected_old_oid: GitOid,
    /// Message recorded in the reflog entry.
    pub log_message: String,
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// A point in time with the timezone offset it was recorded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GitTime {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in seconds (east positive).
    pub offset_seconds: i32,
}

impl GitTime {
    /// The current time, recorded as UTC.
    #[must_use]
    pub fn now() -> Self {
        let now = gix::date::Time::now_utc();
        Self {
            seconds: now.seconds,
            offset_seconds: now.offset,
        }
    }
}

/// An author or committer identity.
///
/// Name and email are kept as raw bytes: commits written under a legacy
/// `encoding` carry identities that are not UTF-8.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Display name.
    pub name: BString,
    /// Email address (without angle brackets).
    pub email: BString,
    /// When the signature was made.
    pub when: GitTime,
}

impl Signature {
    /// A signature stamped with the current time.
    #[must_use]
    pub fn now(name: impl Into<BString>, email: impl Into<BString>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when: GitTime::now(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

// ---------------------------------------------------------------------------
// Tree types
// ---------------------------------------------------------------------------

/// The file mode of a tree entry (analogous to `git ls-tree` mode column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
    /// Gitlink / submodule (`160000`).
    Commit,
}

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TreeEntry {
    /// File or directory name (just the basename, not a full path).
    pub name: BString,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob, tree, or commit this entry points to.
    pub oid: GitOid,
}

/// An edit operation on a tree.
///
/// Builds a new tree from an existing one by inserting, updating, or
/// removing entries. Notes storage edits its trees this way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TreeEdit {
    /// Insert or update an entry. If a path component is missing, intermediate
    /// trees are created automatically.
    Upsert {
        /// Slash-separated path relative to tree root (e.g., `"src/main.rs"`).
        path: BString,
        /// File mode for the entry.
        mode: EntryMode,
        /// OID of the object to store at this path.
        oid: GitOid,
    },
    /// Remove an entry. No-op if the path does not exist.
    Remove {
        /// Slash-separated path relative to tree root.
        path: BString,
    },
}

// ---------------------------------------------------------------------------
// Diff types
// ---------------------------------------------------------------------------

/// The kind of change detected between two trees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeType {
    /// File was added.
    Added,
    /// File content or mode was modified.
    Modified,
    /// File was deleted.
    Deleted,
}

/// A single file-level change between two trees.
///
/// Produced by [`GitRepo::diff_trees`](crate::GitRepo::diff_trees).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    /// Path of the file (in the new tree, or the old tree for deletions).
    pub path: BString,
    /// What kind of change occurred.
    pub change_type: ChangeType,
    /// OID of the old blob (zero OID for additions).
    pub old_oid: GitOid,
    /// OID of the new blob (zero OID for deletions).
    pub new_oid: GitOid,
    /// File mode in the old tree.
    pub old_mode: Option<EntryMode>,
    /// File mode in the new tree.
    pub new_mode: Option<EntryMode>,
}

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// The status of a single file in the working tree relative to the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// File content differs from the index.
    Modified,
    /// File is marked intent-to-add.
    Added,
    /// File is in the index but missing from the working tree.
    Deleted,
    /// File was renamed.
    Renamed,
}

/// A tracked file that differs between the index and the worktree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the repository root.
    pub path: BString,
    /// The status of the file.
    pub status: FileStatus,
}

// ---------------------------------------------------------------------------
// Index types
// ---------------------------------------------------------------------------

/// A single entry in the git index (staging area).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root, exactly as the index stores it.
    pub path: BString,
    /// The file mode.
    pub mode: EntryMode,
    /// OID of the blob in the index.
    pub oid: GitOid,
    /// Merge stage: 0 when resolved, 1 (base), 2 (ours) or 3 (theirs) for
    /// an unresolved conflict.
    pub stage: u8,
}

impl IndexEntry {
    /// `true` if this entry is one side of an unresolved conflict.
    #[must_use]
    pub const fn is_conflicted(&self) -> bool {
        self.stage != 0
    }
}

// ---------------------------------------------------------------------------
// Merge + checkout types
// ---------------------------------------------------------------------------

/// Conflict-marker labels for a three-way merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeLabels {
    /// Label for the common ancestor side.
    pub ancestor: String,
    /// Label for "ours" (the side being built upon).
    pub ours: String,
    /// Label for "theirs" (the side being replayed).
    pub theirs: String,
}

/// The result of a three-way tree merge.
///
/// `entries` is the full staged index the merge produced: stage-0 entries
/// for cleanly merged paths plus stage 1/2/3 entries for each conflicted
/// path. `tree` holds the merged tree, with conflict markers written into
/// blobs where a textual conflict occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged tree.
    pub tree: GitOid,
    /// Staged index entries, conflict stages included.
    pub entries: Vec<IndexEntry>,
    /// Paths left with unresolved conflicts, sorted and deduplicated, in
    /// display form.
    pub conflicts: Vec<String>,
}

impl MergeOutcome {
    /// `true` if any path needs manual resolution.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// How checkout treats local modifications it would overwrite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CheckoutStrategy {
    /// Refuse to touch a dirty worktree or index.
    #[default]
    Safe,
    /// Overwrite local modifications.
    Force,
}

// ---------------------------------------------------------------------------
// Commit types
// ---------------------------------------------------------------------------

/// Information about a commit object.
///
/// Returned by [`GitRepo::read_commit`](crate::GitRepo::read_commit).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// OID of the commit itself.
    pub oid: GitOid,
    /// OID of the tree this commit points to.
    pub tree_oid: GitOid,
    /// OIDs of parent commits (empty for root commits).
    pub parents: Vec<GitOid>,
    /// The commit message, byte for byte.
    pub message: BString,
    /// Value of the `encoding` header, if present.
    pub encoding: Option<BString>,
    /// Author identity.
    pub author: Signature,
    /// Committer identity.
    pub committer: Signature,
}

impl CommitInfo {
    /// The short summary of the message: its first paragraph, with line
    /// breaks folded into single spaces.
    #[must_use]
    pub fn summary(&self) -> String {
        let message = self.message.to_str_lossy();
        let trimmed = message.trim_start();
        let paragraph = trimmed.split("\n\n").next().unwrap_or_default();
        paragraph
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `true` if the commit has more than one parent.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Everything needed to write a new commit object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCommit {
    /// The tree the commit snapshots.
    pub tree: GitOid,
    /// Parent commits, in order.
    pub parents: Vec<GitOid>,
    /// Author identity.
    pub author: Signature,
    /// Committer identity.
    pub committer: Signature,
    /// Optional `encoding` header.
    pub encoding: Option<BString>,
    /// Full commit message.
    pub message: BString,
}

/// A note attached to an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    /// Author of the notes commit that last wrote this note.
    pub author: Signature,
    /// Committer of that notes commit.
    pub committer: Signature,
    /// The note blob's content.
    pub message: BString,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> Signature {
        Signature {
            name: name.into(),
            email: format!("{name}@example.com").into(),
            when: GitTime {
                seconds: 1_700_000_000,
                offset_seconds: 3600,
            },
        }
    }

    fn commit_with_message(message: &str) -> CommitInfo {
        CommitInfo {
            oid: GitOid::ZERO,
            tree_oid: GitOid::ZERO,
            parents: Vec::new(),
            message: message.into(),
            encoding: None,
            author: sig("alice"),
            committer: sig("alice"),
        }
    }

    // -- GitOid --

    #[test]
    fn oid_roundtrip_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid: GitOid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
    }

    #[test]
    fn oid_zero() {
        assert!(GitOid::ZERO.is_zero());
        assert_eq!(
            GitOid::ZERO.to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn oid_rejects_short() {
        assert!("abc".parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_rejects_trailing_garbage() {
        let long = format!("{}\n", "a".repeat(40));
        assert!(long.parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_rejects_non_hex() {
        let bad = "g".repeat(40);
        assert!(bad.parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_from_bytes() {
        let bytes = [0xab; 20];
        let oid = GitOid::from_bytes(bytes);
        assert_eq!(oid.as_bytes(), &bytes);
        assert_eq!(oid.to_string(), "ab".repeat(20));
    }

    // -- RefName --

    #[test]
    fn refname_valid_refs_prefix() {
        assert!(RefName::new("refs/heads/main").is_ok());
        assert!(RefName::new("refs/notes/commits").is_ok());
    }

    #[test]
    fn refname_valid_bare() {
        assert!(RefName::new("HEAD").is_ok());
        assert_eq!(RefName::orig_head().as_str(), "ORIG_HEAD");
    }

    #[test]
    fn refname_rejects_bare() {
        assert!(RefName::new("main").is_err());
    }

    #[test]
    fn refname_rejects_empty() {
        assert!(RefName::new("").is_err());
        assert!(RefName::branch("").is_err());
    }

    #[test]
    fn refname_short_branch_name() {
        let r = RefName::branch("topic").unwrap();
        assert_eq!(r.as_str(), "refs/heads/topic");
        assert_eq!(r.short_branch_name(), Some("topic"));
        let tag = RefName::new("refs/tags/v1").unwrap();
        assert_eq!(tag.short_branch_name(), None);
    }

    // -- Signature --

    #[test]
    fn signature_display_shows_name_and_email() {
        assert_eq!(sig("alice").to_string(), "alice <alice@example.com>");
    }

    // -- CommitInfo --

    #[test]
    fn summary_is_first_line() {
        let c = commit_with_message("Add feature\n\nLonger body here.\n");
        assert_eq!(c.summary(), "Add feature");
    }

    #[test]
    fn summary_folds_first_paragraph() {
        let c = commit_with_message("\n  Conflicting modification\n1 to asparagus\n\nbody\n");
        assert_eq!(c.summary(), "Conflicting modification 1 to asparagus");
    }

    #[test]
    fn summary_of_latin1_message_is_lossy_but_present() {
        let mut c = commit_with_message("");
        c.message = BString::from(&b"caf\xe9 au lait\n"[..]);
        assert_eq!(c.summary(), "caf\u{FFFD} au lait");
        assert_eq!(c.message[3], 0xe9);
    }

    #[test]
    fn merge_detection() {
        let mut c = commit_with_message("m");
        assert!(!c.is_merge());
        c.parents = vec![GitOid::ZERO, GitOid::from_bytes([1; 20])];
        assert!(c.is_merge());
    }
}
