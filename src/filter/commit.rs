use crate::domain::{Branches, Commit};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Stateless predicate over a materialized commit
pub trait CommitFilter: Send + Sync {
    fn accept(&self, commit: &Commit) -> bool;

    /// Shown in debug logs when the filter rejects a commit
    fn name(&self) -> &str {
        "filter"
    }
}

/// AND over a list of filters, evaluated in order with short-circuit
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn CommitFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn CommitFilter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Arc<dyn CommitFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True when every filter accepts; an empty chain accepts everything
    pub fn accept(&self, commit: &Commit) -> bool {
        self.rejected_by(commit).is_none()
    }

    /// Name of the first filter that rejects the commit
    pub fn rejected_by(&self, commit: &Commit) -> Option<&str> {
        self.filters
            .iter()
            .find(|filter| !filter.accept(commit))
            .map(|filter| filter.name())
    }
}

/// Rejects merge commits
#[derive(Debug, Default, Clone, Copy)]
pub struct OnlyNoMerge;

impl CommitFilter for OnlyNoMerge {
    fn accept(&self, commit: &Commit) -> bool {
        !commit.is_merge()
    }

    fn name(&self) -> &str {
        "OnlyNoMerge"
    }
}

/// Accepts commits reachable from the main branch
#[derive(Debug, Default, Clone, Copy)]
pub struct OnlyInMainBranch;

impl CommitFilter for OnlyInMainBranch {
    fn accept(&self, commit: &Commit) -> bool {
        commit.in_main_branch
    }

    fn name(&self) -> &str {
        "OnlyInMainBranch"
    }
}

/// Accepts commits contained in at least one of the given branches
///
/// Commits mined with branch lookup disabled carry no branch data and are
/// rejected.
#[derive(Debug, Clone)]
pub struct OnlyInBranches {
    branches: BTreeSet<String>,
}

impl OnlyInBranches {
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: branches.into_iter().map(Into::into).collect(),
        }
    }
}

impl CommitFilter for OnlyInBranches {
    fn accept(&self, commit: &Commit) -> bool {
        match &commit.branches {
            Branches::Known(names) => !names.is_disjoint(&self.branches),
            Branches::Omitted => false,
        }
    }

    fn name(&self) -> &str {
        "OnlyInBranches"
    }
}

/// Accepts commits whose every modified file has one of the extensions
#[derive(Debug, Clone)]
pub struct OnlyModificationsWithFileTypes {
    extensions: Vec<String>,
}

impl OnlyModificationsWithFileTypes {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

impl CommitFilter for OnlyModificationsWithFileTypes {
    fn accept(&self, commit: &Commit) -> bool {
        commit.modifications.iter().all(|m| {
            m.file_name()
                .is_some_and(|name| self.extensions.iter().any(|ext| name.ends_with(ext.as_str())))
        })
    }

    fn name(&self) -> &str {
        "OnlyModificationsWithFileTypes"
    }
}
