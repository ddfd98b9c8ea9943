//! Mining orchestration
//!
//! [`RepositoryMining`] collects repositories, a range, filters and visitors
//! and freezes them into a [`MiningConfig`]. [`Miner`] then mines each
//! repository in turn:
//!
//! 1. initialize every visitor
//! 2. select change sets through the range
//! 3. reverse them unless `reverse_order` was requested (git lists newest
//!    first, so the default mines oldest first)
//! 4. split the list into one contiguous partition per worker thread
//! 5. on each worker, materialize, filter and visit the partition in order
//! 6. wait for every partition, then finalize every visitor
//!
//! Sinks are closed once all repositories are done. A failure on one commit
//! (or one visitor) is logged and mining continues; only resource
//! exhaustion stops the run.

mod report;

pub use report::{MiningReport, RepositoryReport};

use crate::domain::ChangeSet;
use crate::error::{ConfigError, MinerError, ResourceExhausted, ScmError};
use crate::filter::{CommitFilter, CommitRange, FilterChain};
use crate::persistence::{NoPersistence, PersistenceMechanism};
use crate::scm::{Scm, ScmRepository};
use crate::visitor::{CommitVisitor, VisitorRegistry, panic_message};
use report::Tally;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info_span;

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// What to do when a commit exhausts resources
pub trait FatalHandler: Send + Sync {
    /// Called once, from the worker that hit the failure. Returning (instead
    /// of terminating) makes the miner stop and report the failure.
    fn on_fatal(&self, repo: &ScmRepository, commit: &str, cause: &ResourceExhausted);
}

/// Terminates the process with a non-zero status
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl FatalHandler for ExitProcess {
    fn on_fatal(&self, _repo: &ScmRepository, _commit: &str, _cause: &ResourceExhausted) {
        tracing::error!("Goodbye!");
        std::process::exit(1);
    }
}

/// Fluent front end for a mining run
pub struct RepositoryMining {
    repos: Vec<Arc<dyn Scm>>,
    range: Option<Arc<dyn CommitRange>>,
    filters: FilterChain,
    visitors: VisitorRegistry,
    threads: usize,
    reverse_order: bool,
    fatal: Arc<dyn FatalHandler>,
}

impl Default for RepositoryMining {
    fn default() -> Self {
        Self {
            repos: Vec::new(),
            range: None,
            filters: FilterChain::default(),
            visitors: VisitorRegistry::new(),
            threads: 1,
            reverse_order: false,
            fatal: Arc::new(ExitProcess),
        }
    }
}

impl RepositoryMining {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_repo(mut self, scm: impl Scm + 'static) -> Self {
        self.repos.push(Arc::new(scm));
        self
    }

    pub fn in_repos<I, S>(mut self, repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Scm + 'static,
    {
        self.repos
            .extend(repos.into_iter().map(|scm| Arc::new(scm) as Arc<dyn Scm>));
        self
    }

    /// Add an already shared backend
    pub fn in_shared_repo(mut self, scm: Arc<dyn Scm>) -> Self {
        self.repos.push(scm);
        self
    }

    pub fn through(mut self, range: Arc<dyn CommitRange>) -> Self {
        self.range = Some(range);
        self
    }

    /// Register a visitor writing to `writer`
    pub fn process(
        mut self,
        visitor: Arc<dyn CommitVisitor>,
        writer: Arc<dyn PersistenceMechanism>,
    ) -> Self {
        self.visitors.register(visitor, writer);
        self
    }

    /// Register a visitor that writes nothing
    pub fn process_only(self, visitor: Arc<dyn CommitVisitor>) -> Self {
        self.process(visitor, Arc::new(NoPersistence))
    }

    /// Replace the filter chain
    pub fn filters(mut self, filters: Vec<Arc<dyn CommitFilter>>) -> Self {
        self.filters = FilterChain::new(filters);
        self
    }

    /// Append one filter to the chain
    pub fn filter(mut self, filter: impl CommitFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Keep the backend's order instead of reversing it
    pub fn reverse_order(mut self) -> Self {
        self.reverse_order = true;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn on_fatal(mut self, handler: Arc<dyn FatalHandler>) -> Self {
        self.fatal = handler;
        self
    }

    /// Validate and freeze the configuration
    ///
    /// Every repository is described here, so unreadable repositories fail
    /// before anything is mined.
    pub fn build(self) -> Result<MiningConfig, MinerError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "threads".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        let range = self
            .range
            .ok_or_else(|| ConfigError::MissingRequired("commit range".to_string()))?;
        if self.repos.is_empty() {
            return Err(ConfigError::MissingRequired("repository".to_string()).into());
        }

        let repos = self
            .repos
            .into_iter()
            .map(ScmRepository::open)
            .collect::<Result<Vec<_>, ScmError>>()?;

        Ok(MiningConfig {
            repos,
            range,
            filters: self.filters,
            visitors: self.visitors,
            threads: self.threads,
            reverse_order: self.reverse_order,
            fatal: self.fatal,
        })
    }

    /// Build and run
    pub fn mine(self) -> Result<MiningReport, MinerError> {
        Miner::new(self.build()?).mine()
    }
}

/// Frozen, validated mining configuration
pub struct MiningConfig {
    pub repos: Vec<ScmRepository>,
    pub range: Arc<dyn CommitRange>,
    pub filters: FilterChain,
    pub visitors: VisitorRegistry,
    pub threads: usize,
    pub reverse_order: bool,
    pub fatal: Arc<dyn FatalHandler>,
}

/// Executes a [`MiningConfig`]
pub struct Miner {
    config: MiningConfig,
}

/// First resource exhaustion seen by any worker
struct Abort {
    commit: String,
    reason: String,
}

impl Miner {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Mine every repository, then close the sinks
    pub fn mine(&self) -> Result<MiningReport, MinerError> {
        let mut report = MiningReport::default();
        for repo in &self.config.repos {
            self.config.visitors.initialize_all(repo);
            report.repositories.push(self.mine_repository(repo)?);
            self.config.visitors.finalize_all(repo);
        }

        let closed = self.config.visitors.close_all();
        tracing::debug!("Closed {} outputs", closed);
        self.print_script();
        Ok(report)
    }

    fn mine_repository(&self, repo: &ScmRepository) -> Result<RepositoryReport, MinerError> {
        tracing::info!("Git repository in {}", repo.path());

        let mut change_sets = self.config.range.get(repo.scm())?;
        if !self.config.reverse_order {
            change_sets.reverse();
        }
        tracing::info!("Total of commits: {}", change_sets.len());

        let threads = self.config.threads;
        tracing::info!("Starting threads: {}", threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("miner-{}", i))
            .build()
            .map_err(|e| MinerError::other(format!("Failed to start worker pool: {}", e)))?;

        let partitions = partition(&change_sets, threads);
        let tally = Tally::default();
        let stop = AtomicBool::new(false);
        let abort: OnceLock<Abort> = OnceLock::new();

        pool.scope(|scope| {
            for (index, chunk) in partitions.iter().enumerate() {
                let (tally, stop, abort) = (&tally, &stop, &abort);
                scope.spawn(move |_| {
                    let span = info_span!("partition", repo = repo.last_dir(), index);
                    let _entered = span.enter();
                    for cs in *chunk {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        if let Err(cause) = self.process_change_set(repo, cs, tally) {
                            self.fatal(repo, cs, &cause, stop, abort);
                            break;
                        }
                    }
                });
            }
        });

        if let Some(abort) = abort.into_inner() {
            return Err(MinerError::ResourceExhausted {
                commit: abort.commit,
                repo: repo.last_dir().to_string(),
                reason: abort.reason,
            });
        }
        Ok(tally.into_report(repo.path(), change_sets.len()))
    }

    /// Materialize, filter and visit one change set
    ///
    /// Only resource exhaustion escapes; everything else is logged and
    /// counted.
    fn process_change_set(
        &self,
        repo: &ScmRepository,
        cs: &ChangeSet,
        tally: &Tally,
    ) -> Result<(), ResourceExhausted> {
        let materialized = catch_unwind(AssertUnwindSafe(|| repo.scm().commit(&cs.id)));
        let commit = match materialized {
            Ok(Ok(commit)) => commit,
            Ok(Err(ScmError::ResourceExhausted(cause))) => return Err(cause),
            Ok(Err(e @ ScmError::CommitTooLarge { .. })) => {
                tracing::warn!("{}", e);
                Tally::bump(&tally.too_large, 1);
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::error!("Error materializing #{} in {}: {}", cs.id, repo.last_dir(), e);
                Tally::bump(&tally.failed, 1);
                return Ok(());
            }
            Err(payload) => {
                tracing::error!(
                    "Panic materializing #{} in {}: {}",
                    cs.id,
                    repo.last_dir(),
                    panic_message(payload.as_ref())
                );
                Tally::bump(&tally.failed, 1);
                return Ok(());
            }
        };

        tracing::info!(
            "Commit #{} @ {} in {} from {} with {} modifications",
            commit.hash,
            repo.last_dir(),
            commit.author_date.format(DATE_FORMAT),
            commit.author.name,
            commit.modifications.len()
        );

        match catch_unwind(AssertUnwindSafe(|| self.config.filters.rejected_by(&commit))) {
            Ok(None) => {}
            Ok(Some(filter)) => {
                tracing::debug!("-> Filtered by {}", filter);
                Tally::bump(&tally.filtered, 1);
                return Ok(());
            }
            Err(payload) => {
                tracing::error!(
                    "Panic filtering #{} in {}: {}",
                    commit.hash,
                    repo.last_dir(),
                    panic_message(payload.as_ref())
                );
                Tally::bump(&tally.failed, 1);
                return Ok(());
            }
        }

        let failures = self.config.visitors.process_commit(repo, &commit)?;
        Tally::bump(&tally.processed, 1);
        Tally::bump(&tally.visitor_failures, failures);
        Ok(())
    }

    fn fatal(
        &self,
        repo: &ScmRepository,
        cs: &ChangeSet,
        cause: &ResourceExhausted,
        stop: &AtomicBool,
        abort: &OnceLock<Abort>,
    ) {
        tracing::error!(
            "FATAL: Commit {} in {} caused resource exhaustion: {}",
            cs.id,
            repo.last_dir(),
            cause
        );
        stop.store(true, Ordering::SeqCst);
        // Only the first worker to fail reports
        let first = abort
            .set(Abort {
                commit: cs.id.clone(),
                reason: cause.0.clone(),
            })
            .is_ok();
        if first {
            self.config.fatal.on_fatal(repo, &cs.id, cause);
        }
    }

    fn print_script(&self) {
        tracing::info!("# --------------------------------------------------");
        tracing::info!("Study has been executed in the following projects:");
        for repo in &self.config.repos {
            tracing::info!(
                "- {}, from {} to {}",
                repo.origin(),
                repo.first_commit(),
                repo.head_commit()
            );
        }

        tracing::info!("The following processors were executed:");
        for name in self.config.visitors.names() {
            tracing::info!("- {}", name);
        }
    }
}

/// Split `items` into `min(n, len)` contiguous chunks
///
/// Chunk sizes differ by at most one, the longer chunks first. An empty list
/// gives no chunks.
pub fn partition<T>(items: &[T], n: usize) -> Vec<&[T]> {
    let count = n.min(items.len());
    if count == 0 {
        return Vec::new();
    }
    let (base, extra) = (items.len() / count, items.len() % count);
    let mut chunks = Vec::with_capacity(count);
    let mut rest = items;
    for index in 0..count {
        let (chunk, tail) = rest.split_at(base + usize::from(index < extra));
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}
