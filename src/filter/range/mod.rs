//! Range selection strategies
//!
//! Every strategy asks the backend for its full, ordered list of revision
//! pointers (head-only asks for the head pointer) and slices it. None of them
//! mutate the backend and all of them preserve backend order.

use crate::domain::ChangeSet;
use crate::error::ScmError;
use crate::scm::Scm;
use chrono::{DateTime, FixedOffset, Months};
use std::collections::HashSet;
use std::sync::Arc;

/// Selects which revision pointers of a repository are mined
pub trait CommitRange: Send + Sync {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Every revision the backend knows
#[derive(Debug, Default, Clone, Copy)]
pub struct AllCommits;

impl CommitRange for AllCommits {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        scm.change_sets()
    }

    fn describe(&self) -> String {
        "all commits".to_string()
    }
}

/// Only the current head
#[derive(Debug, Default, Clone, Copy)]
pub struct OnlyInHead;

impl CommitRange for OnlyInHead {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(vec![scm.head()?])
    }

    fn describe(&self) -> String {
        "head only".to_string()
    }
}

/// One revision by id; empty when the id is unknown
#[derive(Debug, Clone)]
pub struct SingleCommit {
    id: String,
}

impl CommitRange for SingleCommit {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(scm
            .change_sets()?
            .into_iter()
            .find(|cs| cs.id == self.id)
            .into_iter()
            .collect())
    }

    fn describe(&self) -> String {
        format!("single commit {}", self.id)
    }
}

/// Revisions authored at or after a date
#[derive(Debug, Clone)]
pub struct SinceCommit {
    since: DateTime<FixedOffset>,
}

impl CommitRange for SinceCommit {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(scm
            .change_sets()?
            .into_iter()
            .filter(|cs| cs.time >= self.since)
            .collect())
    }

    fn describe(&self) -> String {
        format!("since {}", self.since.to_rfc3339())
    }
}

/// Samples revisions at least `months` calendar months apart
///
/// The first pointer is always kept; every later pointer is kept when it is
/// `months` or more away from the previously kept one, in either direction,
/// so the sampling works for both newest-first and oldest-first lists.
#[derive(Debug, Clone)]
pub struct MonthlyCommits {
    months: u32,
}

impl MonthlyCommits {
    fn far_enough(&self, last: &DateTime<FixedOffset>, time: &DateTime<FixedOffset>) -> bool {
        let step = Months::new(self.months);
        let forward = last.checked_add_months(step).is_some_and(|bound| *time >= bound);
        let backward = last.checked_sub_months(step).is_some_and(|bound| *time <= bound);
        forward || backward
    }
}

impl CommitRange for MonthlyCommits {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        let all = scm.change_sets()?;
        if self.months == 0 {
            return Ok(all);
        }

        let mut kept: Vec<ChangeSet> = Vec::new();
        for cs in all {
            let keep = match kept.last() {
                None => true,
                Some(last) => self.far_enough(&last.time, &cs.time),
            };
            if keep {
                kept.push(cs);
            }
        }
        Ok(kept)
    }

    fn describe(&self) -> String {
        format!("every {} months", self.months)
    }
}

/// Revisions authored within `[from, to]`
#[derive(Debug, Clone)]
pub struct BetweenDates {
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
}

impl CommitRange for BetweenDates {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(scm
            .change_sets()?
            .into_iter()
            .filter(|cs| cs.time >= self.from && cs.time <= self.to)
            .collect())
    }

    fn describe(&self) -> String {
        format!(
            "between {} and {}",
            self.from.to_rfc3339(),
            self.to.to_rfc3339()
        )
    }
}

/// An explicit set of ids, returned in backend order
#[derive(Debug, Clone)]
pub struct ListOfCommits {
    ids: HashSet<String>,
}

impl CommitRange for ListOfCommits {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        Ok(scm
            .change_sets()?
            .into_iter()
            .filter(|cs| self.ids.contains(&cs.id))
            .collect())
    }

    fn describe(&self) -> String {
        format!("{} listed commits", self.ids.len())
    }
}

/// Everything between two boundary ids, inclusive
///
/// The scan starts at whichever boundary shows up first and stops after the
/// other one, so the boundaries may be given in either order. When only one
/// boundary exists the scan runs to the end of the list.
#[derive(Debug, Clone)]
pub struct Range {
    start: String,
    end: String,
}

impl CommitRange for Range {
    fn get(&self, scm: &dyn Scm) -> Result<Vec<ChangeSet>, ScmError> {
        let mut selected = Vec::new();
        // The boundary that closes the scan once collecting started
        let mut closing: Option<&str> = None;

        for cs in scm.change_sets()? {
            match closing {
                None => {
                    if cs.id == self.end {
                        closing = Some(&self.start);
                    } else if cs.id == self.start {
                        closing = Some(&self.end);
                    } else {
                        continue;
                    }
                    let done = self.start == self.end;
                    selected.push(cs);
                    if done {
                        break;
                    }
                }
                Some(stop) => {
                    let done = cs.id == stop;
                    selected.push(cs);
                    if done {
                        break;
                    }
                }
            }
        }
        Ok(selected)
    }

    fn describe(&self) -> String {
        format!("range {}..{}", self.start, self.end)
    }
}

/// Factory for the built-in ranges
pub struct Commits;

impl Commits {
    pub fn all() -> Arc<dyn CommitRange> {
        Arc::new(AllCommits)
    }

    pub fn only_in_head() -> Arc<dyn CommitRange> {
        Arc::new(OnlyInHead)
    }

    pub fn single(id: impl Into<String>) -> Arc<dyn CommitRange> {
        Arc::new(SingleCommit { id: id.into() })
    }

    pub fn since(date: DateTime<FixedOffset>) -> Arc<dyn CommitRange> {
        Arc::new(SinceCommit { since: date })
    }

    pub fn monthly(months: u32) -> Arc<dyn CommitRange> {
        Arc::new(MonthlyCommits { months })
    }

    pub fn between_dates(
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Arc<dyn CommitRange> {
        Arc::new(BetweenDates { from, to })
    }

    pub fn list<I, S>(ids: I) -> Arc<dyn CommitRange>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(ListOfCommits {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    pub fn range(start: impl Into<String>, end: impl Into<String>) -> Arc<dyn CommitRange> {
        Arc::new(Range {
            start: start.into(),
            end: end.into(),
        })
    }
}
