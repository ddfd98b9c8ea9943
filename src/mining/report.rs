use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of mining one repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryReport {
    pub path: String,
    /// Pointers returned by the range
    pub selected: usize,
    /// Commits handed to the visitors
    pub processed: usize,
    /// Commits rejected by the filter chain
    pub filtered: usize,
    /// Commits skipped for touching too many files
    pub too_large: usize,
    /// Commits whose materialization failed or panicked
    pub failed: usize,
    /// Individual visitor invocations that failed
    pub visitor_failures: usize,
}

/// Outcome of a whole mining run, one entry per repository in mining order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningReport {
    pub repositories: Vec<RepositoryReport>,
}

impl MiningReport {
    pub fn processed(&self) -> usize {
        self.repositories.iter().map(|r| r.processed).sum()
    }

    pub fn selected(&self) -> usize {
        self.repositories.iter().map(|r| r.selected).sum()
    }
}

/// Counters shared by the workers of one repository
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub processed: AtomicUsize,
    pub filtered: AtomicUsize,
    pub too_large: AtomicUsize,
    pub failed: AtomicUsize,
    pub visitor_failures: AtomicUsize,
}

impl Tally {
    pub fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn into_report(self, path: &str, selected: usize) -> RepositoryReport {
        RepositoryReport {
            path: path.to_string(),
            selected,
            processed: self.processed.into_inner(),
            filtered: self.filtered.into_inner(),
            too_large: self.too_large.into_inner(),
            failed: self.failed.into_inner(),
            visitor_failures: self.visitor_failures.into_inner(),
        }
    }
}
