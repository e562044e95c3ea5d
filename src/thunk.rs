//! Suspended operations and task bodies.
//!
//! A [`Thunk`] is "work that will eventually produce a result": it is invoked
//! with a [`Continuation`] and must resume it exactly once, now or later (or
//! never, which leaves the waiting task suspended for good). Thunks carry no
//! state of their own between invocations, so the same thunk may be awaited
//! several times; every invocation starts the work afresh.
//!
//! A [`ScriptFn`] is the body of a task: an async function receiving the
//! task's [`TaskContext`] and its arguments.

use crate::continuation::Continuation;
use crate::error::TaskError;
use crate::runtime::{Runtime, TaskContext};
use crate::value::{Outcome, Value};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Body of a task: called once per task with its context and arguments.
pub type ScriptFn = Rc<dyn Fn(TaskContext, Vec<Value>) -> LocalBoxFuture<'static, Outcome>>;

/// Wraps an async closure into a [`ScriptFn`].
///
/// # Example
/// ```ignore
/// let body = script_fn(|cx, args| async move {
///     cx.await_op(sleep_ms(100.0)).await?;
///     Ok(args.into_iter().next().unwrap_or_default())
/// });
/// ```
pub fn script_fn<F, Fut>(f: F) -> ScriptFn
where
    F: Fn(TaskContext, Vec<Value>) -> Fut + 'static,
    Fut: Future<Output = Outcome> + 'static,
{
    Rc::new(move |cx, args| f(cx, args).boxed_local())
}

type Invoke = dyn Fn(&Runtime, Continuation) -> Result<(), TaskError>;

/// A value that is invoked with a continuation to eventually produce a result.
#[derive(Clone)]
pub struct Thunk {
    label: &'static str,
    invoke: Rc<Invoke>,
}

impl Thunk {
    /// Creates a thunk from its invocation function.
    ///
    /// The function receives the runtime it runs on and the continuation to
    /// resume. It must not block; anything that takes time has to go through
    /// the timer queue or another task.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Runtime, Continuation) -> Result<(), TaskError> + 'static,
    {
        Self::labeled("thunk", f)
    }

    pub(crate) fn labeled<F>(label: &'static str, f: F) -> Self
    where
        F: Fn(&Runtime, Continuation) -> Result<(), TaskError> + 'static,
    {
        Self {
            label,
            invoke: Rc::new(f),
        }
    }

    /// A thunk that resumes its continuation immediately with `value`.
    pub fn resolved(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::labeled("resolved", move |_, cb| cb.resume(Ok(value.clone())))
    }

    /// A thunk that resumes its continuation immediately with `error`.
    pub fn rejected(error: TaskError) -> Self {
        Self::labeled("rejected", move |_, cb| cb.resume(Err(error.clone())))
    }

    /// Invokes the thunk with `cb`.
    ///
    /// If the invocation fails before `cb` was resumed, the error is delivered
    /// through `cb` instead, so the waiting side always observes it. Errors are
    /// returned only when they have nowhere else to go.
    pub fn invoke(&self, rt: &Runtime, cb: Continuation) -> Result<(), TaskError> {
        match (self.invoke)(rt, cb.clone()) {
            Ok(()) => Ok(()),
            Err(e) if !cb.is_spent() => {
                tracing::trace!(thunk = self.label, error = %e, "thunk failed before resuming");
                cb.resume(Err(e))
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Thunk) -> bool {
        Rc::ptr_eq(&self.invoke, &other.invoke)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thunk({})", self.label)
    }
}
