//! Revision data model
//!
//! Plain value types shared by range selection, filtering, the miner and
//! visitors. A [`ChangeSet`] is the cheap pointer used while selecting; a
//! [`Commit`] is the fully materialized revision handed to visitors.

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeSet;
use std::fmt;

/// Path git reports for the missing side of an added or deleted file
pub const DEV_NULL: &str = "/dev/null";

/// Replacement text for diffs that exceed the configured size ceiling
pub const DIFF_TOO_BIG: &str = "-- TOO BIG --";

/// Lightweight revision pointer: id plus author timestamp
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeSet {
    /// Full commit id
    pub id: String,
    /// Author time, in the author's offset
    pub time: DateTime<FixedOffset>,
}

impl ChangeSet {
    pub fn new(id: impl Into<String>, time: DateTime<FixedOffset>) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }
}

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Developer {
    pub name: String,
    pub email: String,
}

impl Developer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Developer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Kind of change a commit made to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationType {
    Add,
    Modify,
    Delete,
    Rename,
    Copy,
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModificationType::Add => "ADD",
            ModificationType::Modify => "MODIFY",
            ModificationType::Delete => "DELETE",
            ModificationType::Rename => "RENAME",
            ModificationType::Copy => "COPY",
        };
        f.write_str(name)
    }
}

/// One file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    /// Path before the change; `None` for additions
    pub old_path: Option<String>,
    /// Path after the change; `None` for deletions
    pub new_path: Option<String>,
    pub kind: ModificationType,
    /// Unified diff, or [`DIFF_TOO_BIG`] when it exceeded the ceiling
    pub diff: String,
    /// File content after the change; empty for deletions
    pub source_code: String,
}

impl Modification {
    pub fn new(
        old_path: Option<String>,
        new_path: Option<String>,
        kind: ModificationType,
        diff: impl Into<String>,
        source_code: impl Into<String>,
    ) -> Self {
        Self {
            old_path,
            new_path,
            kind,
            diff: diff.into(),
            source_code: source_code.into(),
        }
    }

    /// Whether the diff text was replaced by the size sentinel
    pub fn is_diff_truncated(&self) -> bool {
        self.diff == DIFF_TOO_BIG
    }

    /// Number of added lines in the diff
    pub fn added(&self) -> usize {
        if self.is_diff_truncated() {
            return 0;
        }
        self.diff
            .lines()
            .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
            .count()
    }

    /// Number of removed lines in the diff
    pub fn removed(&self) -> usize {
        if self.is_diff_truncated() {
            return 0;
        }
        self.diff
            .lines()
            .filter(|line| line.starts_with('-') && !line.starts_with("---"))
            .count()
    }

    /// Name identifying the touched file.
    ///
    /// Deleted files have no new path (or the null device), so the old path
    /// is reported instead.
    pub fn file_name(&self) -> Option<&str> {
        match self.new_path.as_deref() {
            Some(path) if !path.is_empty() && path != DEV_NULL => Some(path),
            _ => self
                .old_path
                .as_deref()
                .filter(|path| !path.is_empty() && *path != DEV_NULL),
        }
    }
}

/// Branch containment of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branches {
    /// Local branches whose history contains the commit
    Known(BTreeSet<String>),
    /// Lookup was disabled for performance
    Omitted,
}

impl Branches {
    /// Name reported for omitted branch information
    pub const OMITTED_MARKER: &'static str = "branch-info-omitted";

    pub fn contains(&self, branch: &str) -> bool {
        match self {
            Branches::Known(set) => set.contains(branch),
            Branches::Omitted => false,
        }
    }

    /// Branch names, or the omitted marker
    pub fn names(&self) -> Vec<&str> {
        match self {
            Branches::Known(set) => set.iter().map(String::as_str).collect(),
            Branches::Omitted => vec![Self::OMITTED_MARKER],
        }
    }
}

impl Default for Branches {
    fn default() -> Self {
        Branches::Known(BTreeSet::new())
    }
}

/// A fully materialized revision
#[derive(Debug, Clone)]
pub struct Commit {
    pub hash: String,
    pub author: Developer,
    pub committer: Developer,
    /// Author time; its offset is the author's timezone
    pub author_date: DateTime<FixedOffset>,
    /// Committer time; its offset is the committer's timezone
    pub committer_date: DateTime<FixedOffset>,
    pub msg: String,
    /// Parent hashes in recorded order: empty for roots, 2+ for merges
    pub parents: Vec<String>,
    pub branches: Branches,
    pub in_main_branch: bool,
    /// File changes in the order the backend reported them
    pub modifications: Vec<Modification>,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First parent hash, or the empty string for root commits
    pub fn parent(&self) -> &str {
        self.parents.first().map(String::as_str).unwrap_or("")
    }

    pub fn author_timezone(&self) -> FixedOffset {
        *self.author_date.offset()
    }

    pub fn committer_timezone(&self) -> FixedOffset {
        *self.committer_date.offset()
    }

    /// Lines added across all modifications
    pub fn lines_added(&self) -> usize {
        self.modifications.iter().map(Modification::added).sum()
    }

    /// Lines removed across all modifications
    pub fn lines_removed(&self) -> usize {
        self.modifications.iter().map(Modification::removed).sum()
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Commit {}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Commit [hash={}, parents={:?}, author={}, msg={}, modifications={}]",
            self.hash,
            self.parents,
            self.author,
            self.msg,
            self.modifications.len()
        )
    }
}

#[cfg(test)]
mod tests;
