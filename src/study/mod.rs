//! Ready-made studies
//!
//! A study wires repositories, a range, filters and visitors into one
//! mining run.

/// One CSV row per commit with line statistics
pub mod list_commits;

pub use list_commits::{CSV_HEADER, CommitStats, ListCommits, ListCommitsVisitor};

/// A complete, runnable mining setup
pub trait Study {
    fn execute(&self) -> anyhow::Result<()>;
}
