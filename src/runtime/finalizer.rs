//! Deferred finalizers registered with `atexit`.
//!
//! Finalizers run in registration order, once, when the host shuts the
//! runtime down. After the flush has started the queue is closed: late
//! registrations, including ones made by a running finalizer, are rejected.

use crate::error::TaskError;

/// A zero-argument deferred action.
pub type Finalizer = Box<dyn FnOnce() -> Result<(), TaskError>>;

pub(crate) struct FinalizerQueue {
    entries: Vec<Finalizer>,
    flushed: bool,
}

impl FinalizerQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            flushed: false,
        }
    }

    pub(crate) fn push(&mut self, finalizer: Finalizer) -> Result<(), TaskError> {
        if self.flushed {
            return Err(TaskError::invariant(
                "atexit called after finalizers were flushed",
            ));
        }

        self.entries.push(finalizer);
        Ok(())
    }

    /// Closes the queue and hands out its entries, or `None` if that already happened.
    pub(crate) fn begin_flush(&mut self) -> Option<Vec<Finalizer>> {
        if self.flushed {
            return None;
        }

        self.flushed = true;
        Some(std::mem::take(&mut self.entries))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_flushed(&self) -> bool {
        self.flushed
    }
}
