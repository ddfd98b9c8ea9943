//! Commit visitors
//!
//! A visitor is the analysis run on every accepted commit. It is registered
//! together with the sink it writes to; the same sink may back several
//! visitors and is still closed only once.

use crate::domain::Commit;
use crate::error::ResourceExhausted;
use crate::persistence::PersistenceMechanism;
use crate::scm::ScmRepository;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Analysis applied to each accepted commit
///
/// Visitors are shared by all worker threads of a repository, so `process`
/// takes `&self`; keep mutable state behind atomics or locks.
pub trait CommitVisitor: Send + Sync {
    /// Called once per repository before any commit is processed
    fn initialize(&self, _repo: &ScmRepository) -> anyhow::Result<()> {
        Ok(())
    }

    fn process(
        &self,
        repo: &ScmRepository,
        commit: &Commit,
        writer: &dyn PersistenceMechanism,
    ) -> anyhow::Result<()>;

    /// Called once per repository after every commit was processed
    fn finalize(&self, _repo: &ScmRepository) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> String;
}

/// Visitors paired with their sinks, in registration order
#[derive(Clone, Default)]
pub struct VisitorRegistry {
    entries: Vec<(Arc<dyn CommitVisitor>, Arc<dyn PersistenceMechanism>)>,
}

impl VisitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        visitor: Arc<dyn CommitVisitor>,
        writer: Arc<dyn PersistenceMechanism>,
    ) {
        self.entries.push((visitor, writer));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(v, _)| v.name()).collect()
    }

    /// Initialize every visitor; failures are logged and skipped
    pub fn initialize_all(&self, repo: &ScmRepository) {
        for (visitor, _) in &self.entries {
            let name = visitor.name();
            if let Err(reason) = guarded(|| visitor.initialize(repo)) {
                tracing::error!(
                    "Error initializing {} in {}: {}",
                    name,
                    repo.last_dir(),
                    reason
                );
            }
        }
    }

    /// Run every visitor on `commit`, in registration order
    ///
    /// A failing visitor does not stop the others. Returns the number of
    /// visitors that failed, or the resource exhaustion that must abort the
    /// run.
    pub fn process_commit(
        &self,
        repo: &ScmRepository,
        commit: &Commit,
    ) -> Result<usize, ResourceExhausted> {
        let mut failures = 0;
        for (visitor, writer) in &self.entries {
            match catch_unwind(AssertUnwindSafe(|| {
                visitor.process(repo, commit, writer.as_ref())
            })) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if let Some(exhausted) = ResourceExhausted::find_in(&err) {
                        return Err(exhausted.clone());
                    }
                    failures += 1;
                    tracing::error!(
                        "Error processing #{} in {}, visitor {}: {:#}",
                        commit.hash,
                        repo.last_dir(),
                        visitor.name(),
                        err
                    );
                }
                Err(payload) => {
                    failures += 1;
                    tracing::error!(
                        "Panic processing #{} in {}, visitor {}: {}",
                        commit.hash,
                        repo.last_dir(),
                        visitor.name(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        Ok(failures)
    }

    /// Finalize every visitor; failures are logged and skipped
    pub fn finalize_all(&self, repo: &ScmRepository) {
        for (visitor, _) in &self.entries {
            let name = visitor.name();
            if let Err(reason) = guarded(|| visitor.finalize(repo)) {
                tracing::error!(
                    "Error finalizing {} in {}: {}",
                    name,
                    repo.last_dir(),
                    reason
                );
            }
        }
    }

    /// Close every distinct sink exactly once
    ///
    /// Returns how many sinks were closed.
    pub fn close_all(&self) -> usize {
        let mut closed: Vec<*const ()> = Vec::new();
        for (_, writer) in &self.entries {
            let ptr = Arc::as_ptr(writer) as *const ();
            if closed.contains(&ptr) {
                continue;
            }
            closed.push(ptr);
            if let Err(e) = writer.close() {
                tracing::error!("Error closing output: {}", e);
            }
        }
        closed.len()
    }
}

/// Run a lifecycle hook, turning errors and panics into a message
fn guarded(hook: impl FnOnce() -> anyhow::Result<()>) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{:#}", err)),
        Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
