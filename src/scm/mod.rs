//! Version-control backends
//!
//! The miner only talks to the [`Scm`] trait. [`GitRepository`] implements it
//! on top of libgit2 and [`GitRemoteRepository`] clones a URL first and then
//! delegates to a local [`GitRepository`].

/// libgit2 backed local repositories
pub mod git;
/// Per-thread backend handles
pub mod handles;
/// Remote repositories cloned into a temporary directory
pub mod remote;

pub use git::{GitRepository, GitSettings};
pub use handles::HandlePool;
pub use remote::GitRemoteRepository;

use crate::domain::{Branches, ChangeSet, Commit};
use crate::error::ScmError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One line of a blame result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlamedLine {
    /// Zero-based line index
    pub line_number: usize,
    pub line: String,
    pub author: String,
    pub committer: String,
    /// Commit that last touched the line
    pub commit: String,
}

/// A file in the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFile {
    pub path: PathBuf,
}

impl RepositoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// True if the file name ends with the given suffix
    pub fn file_name_ends_with(&self, suffix: &str) -> bool {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix))
    }
}

/// Facts about a repository gathered once before mining
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Origin URL, empty if the repository has no `origin` remote
    pub origin: String,
    pub path: String,
    pub head_commit: String,
    pub first_commit: String,
}

/// Backend capability consumed by the miner, ranges and visitors
pub trait Scm: Send + Sync {
    /// All revision pointers in backend order, stable across calls
    fn change_sets(&self) -> Result<Vec<ChangeSet>, ScmError>;

    /// Materialize one revision
    fn commit(&self, id: &str) -> Result<Commit, ScmError>;

    /// Pointer to the current head
    fn head(&self) -> Result<ChangeSet, ScmError>;

    /// Local branches containing the commit, or [`Branches::Omitted`]
    fn branches_containing(&self, id: &str) -> Result<Branches, ScmError>;

    /// Files in the working tree
    fn files(&self) -> Result<Vec<RepositoryFile>, ScmError>;

    fn total_commits(&self) -> Result<usize, ScmError> {
        Ok(self.change_sets()?.len())
    }

    /// Restore the working tree to the main branch
    fn reset(&self) -> Result<(), ScmError>;

    /// Put the working tree at the given commit
    fn checkout(&self, id: &str) -> Result<(), ScmError>;

    /// Per-line attribution of `file` at `commit`, or at its first parent
    /// when `prior_commit` is set
    fn blame(
        &self,
        file: &str,
        commit: &str,
        prior_commit: bool,
    ) -> Result<Vec<BlamedLine>, ScmError>;

    /// Origin, path, head and first commit
    fn describe(&self) -> Result<RepositoryInfo, ScmError>;
}

/// Handle to one repository under mining
///
/// Built once per repository before mining starts and shared (cheaply
/// cloned) with every worker and visitor.
#[derive(Clone)]
pub struct ScmRepository {
    scm: Arc<dyn Scm>,
    info: RepositoryInfo,
}

impl ScmRepository {
    /// Describe the backend and wrap it into a handle
    pub fn open(scm: Arc<dyn Scm>) -> Result<Self, ScmError> {
        let info = scm.describe()?;
        Ok(Self { scm, info })
    }

    pub fn scm(&self) -> &dyn Scm {
        self.scm.as_ref()
    }

    pub fn origin(&self) -> &str {
        &self.info.origin
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn head_commit(&self) -> &str {
        &self.info.head_commit
    }

    pub fn first_commit(&self) -> &str {
        &self.info.first_commit
    }

    /// Last path component, used to tag log lines
    pub fn last_dir(&self) -> &str {
        Path::new(&self.info.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.info.path)
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }
}

impl fmt::Debug for ScmRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScmRepository")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
