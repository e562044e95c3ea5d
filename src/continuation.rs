//! Single-use resume capabilities.
//!
//! A [`Continuation`] plays the part a `Waker` plays in a poll-based runtime,
//! except that it also carries the result of whatever the task was waiting on
//! and it may be used only once. Handles can be cloned freely (a timer entry,
//! a join slot and a script variable may all refer to the same one), but the
//! underlying cell is consumed by the first [`Continuation::resume`]. Every
//! later call, through any clone, fails with
//! [`TaskError::InvariantViolation`] and has no other effect.

use crate::error::TaskError;
use crate::value::{Outcome, Value};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Resume = Box<dyn FnOnce(Outcome) -> Result<(), TaskError>>;

struct ContinuationCell {
    label: &'static str,
    resume: RefCell<Option<Resume>>,
}

/// Exactly-once handle that resumes one waiting computation with one outcome.
#[derive(Clone)]
pub struct Continuation {
    cell: Rc<ContinuationCell>,
}

impl Continuation {
    /// Creates a continuation that runs `f` with the delivered outcome.
    ///
    /// Errors returned by `f` are handed back to whoever calls
    /// [`resume`](Self::resume).
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Outcome) -> Result<(), TaskError> + 'static,
    {
        Self::labeled("callback", f)
    }

    /// Creates a continuation for a host-side consumer that cannot fail.
    ///
    /// # Example
    /// ```ignore
    /// let seen = Rc::new(RefCell::new(None));
    /// let sink = seen.clone();
    /// let cb = Continuation::terminal(move |outcome| *sink.borrow_mut() = Some(outcome));
    /// ```
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(Outcome) + 'static,
    {
        Self::labeled("terminal", move |outcome| {
            f(outcome);
            Ok(())
        })
    }

    pub(crate) fn labeled<F>(label: &'static str, f: F) -> Self
    where
        F: FnOnce(Outcome) -> Result<(), TaskError> + 'static,
    {
        Self {
            cell: Rc::new(ContinuationCell {
                label,
                resume: RefCell::new(Some(Box::new(f))),
            }),
        }
    }

    /// Resumes the waiting computation with `outcome`.
    ///
    /// # Errors
    /// [`TaskError::InvariantViolation`] if this continuation (or a clone of it)
    /// has already been resumed. Otherwise whatever the resumed computation
    /// reports, e.g. the error of a task that failed with no final callback.
    pub fn resume(&self, outcome: Outcome) -> Result<(), TaskError> {
        // The borrow must end before `f` runs: `f` may re-enter this handle.
        let taken = self.cell.resume.borrow_mut().take();

        match taken {
            Some(f) => f(outcome),
            None => Err(TaskError::invariant(format!(
                "{} continuation resumed more than once",
                self.cell.label
            ))),
        }
    }

    /// Shorthand for resuming with a successful value.
    pub fn resume_with(&self, value: impl Into<Value>) -> Result<(), TaskError> {
        self.resume(Ok(value.into()))
    }

    /// Returns `true` once the continuation has been resumed.
    pub fn is_spent(&self) -> bool {
        self.cell.resume.borrow().is_none()
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("label", &self.cell.label)
            .field("spent", &self.is_spent())
            .finish()
    }
}
