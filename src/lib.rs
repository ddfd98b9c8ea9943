//! # repo-miner - Repository History Mining
//!
//! Selects revisions of one or more git repositories, materializes each into a
//! full commit record and streams accepted commits to pluggable visitors that
//! extract facts and write them to output sinks.
//!
//! ## Key Features
//!
//! - **Range Selection**: all commits, head only, single id, since a date,
//!   monthly sampling, date interval, explicit list, start/end interval
//! - **Filter Chain**: merge, branch and file-type predicates combined with AND
//! - **Concurrent Mining**: fixed worker pool, one contiguous partition per worker
//! - **Failure Isolation**: a broken commit or visitor never stops the run;
//!   only resource exhaustion does
//! - **Git Backend**: libgit2 with one repository handle per worker thread
//!
//! ## Architecture
//!
//! ```text
//!   Scm (git) ──► CommitRange ──► partitions ──► worker pool
//!                                                   │
//!                        materialize ──► FilterChain ──► CommitVisitor ──► sink
//! ```
//!
//! ## Modules
//!
//! - [`domain`]: Revision data model
//! - [`scm`]: Backend trait, local and remote git repositories
//! - [`filter`]: Range strategies and commit filters
//! - [`visitor`]: Visitor trait and registry
//! - [`persistence`]: Output sinks (CSV)
//! - [`mining`]: Builder and orchestrator
//! - [`study`]: Ready-made studies
//! - [`config`]: Configuration with environment variable overrides
//! - [`error`]: Error types
//! - [`paths`]: Platform paths
//!
//! ## Usage Example
//!
//! ```no_run
//! use repo_miner::filter::{Commits, OnlyNoMerge};
//! use repo_miner::mining::RepositoryMining;
//! use repo_miner::persistence::CsvFile;
//! use repo_miner::scm::{GitRepository, GitSettings};
//! use repo_miner::study::{CSV_HEADER, ListCommitsVisitor};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let repo = GitRepository::open("/path/to/repo", GitSettings::default())?;
//!     let output = Arc::new(CsvFile::with_header("commits.csv", &CSV_HEADER)?);
//!
//!     RepositoryMining::new()
//!         .in_repo(repo)
//!         .through(Commits::all())
//!         .filter(OnlyNoMerge)
//!         .with_threads(4)
//!         .process(Arc::new(ListCommitsVisitor::new()), output)
//!         .mine()?;
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Revision data model
pub mod domain;

/// Error types and utilities
pub mod error;

/// Range selection and commit filters
pub mod filter;

/// Mining builder and orchestrator
pub mod mining;

/// Platform path utilities
pub mod paths;

/// Output sinks
pub mod persistence;

/// Version-control backends
pub mod scm;

/// Ready-made studies
pub mod study;

/// Commit visitors
pub mod visitor;

#[cfg(test)]
mod fixtures;
