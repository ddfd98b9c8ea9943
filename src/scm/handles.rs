//! Per-thread backend handles
//!
//! libgit2 repositories must not be used from several threads at once. The
//! pool lazily opens one handle per worker thread and never hands a thread
//! another thread's handle, so workers never contend on a shared connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

type Opener<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// Lazily created, thread-affine handles
pub struct HandlePool<T, E> {
    slots: Mutex<HashMap<ThreadId, Arc<Mutex<T>>>>,
    open: Opener<T, E>,
}

impl<T: Send, E> HandlePool<T, E> {
    /// Create an empty pool; `open` runs once per thread on first use
    pub fn new(open: impl Fn() -> Result<T, E> + Send + Sync + 'static) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            open: Box::new(open),
        }
    }

    /// Run `f` with the calling thread's handle, opening it if needed
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let handle = self.handle_for_current_thread()?;
        // Only the owning thread ever locks this slot
        let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Number of handles opened so far
    pub fn opened(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn handle_for_current_thread(&self) -> Result<Arc<Mutex<T>>, E> {
        let id = thread::current().id();
        if let Some(handle) = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Ok(Arc::clone(handle));
        }

        // Open outside the map lock; opening a repository can be slow
        let handle = Arc::new(Mutex::new((self.open)()?));
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(slots.entry(id).or_insert(handle)))
    }
}
