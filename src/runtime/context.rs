//! Per-task handle given to every task body.
//!
//! A [`TaskContext`] is how a body reaches the runtime that drives it: it
//! suspends through [`TaskContext::await_op`], registers finalizers and reads
//! globals. It holds only a weak reference to the runtime, so a body that
//! keeps its context alive never keeps the runtime alive.
//!
//! # Example
//!
//! ```ignore
//! use pong::{Runtime, Value, script_fn, sleep_ms};
//!
//! let rt = Runtime::new();
//! rt.start(script_fn(|cx, _| async move {
//!     cx.atexit(|| { println!("bye"); Ok(()) })?;
//!     cx.await_op(sleep_ms(10.0)).await?;
//!     Ok(Value::Nil)
//! }), vec![])?;
//! ```

use crate::error::TaskError;
use crate::runtime::Shared;
use crate::task::{Await, TaskChannel, TaskId};
use crate::thunk::{ScriptFn, Thunk};
use crate::value::Value;

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Instant;

/// Handle through which a task body talks to its runtime.
pub struct TaskContext {
    id: TaskId,
    channel: Rc<TaskChannel>,
    clock: Rc<Cell<Instant>>,
    runtime: Weak<Shared>,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, channel: Rc<TaskChannel>, shared: &Rc<Shared>) -> Self {
        Self {
            id,
            channel,
            clock: shared.clock.clone(),
            runtime: Rc::downgrade(shared),
        }
    }

    /// Id of the task this context belongs to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Suspends the task until `op` resumes it, evaluating to the delivered outcome.
    ///
    /// This is the task's only suspension point: the body runs synchronously
    /// between two awaits.
    pub fn await_op(&self, op: Thunk) -> Await {
        Await::new(op, self.channel.clone())
    }

    /// Awaits a dynamic value, which must hold a thunk.
    ///
    /// Any other value resolves to a [`TaskError::Protocol`] without suspending.
    pub fn await_value(&self, value: Value) -> Await {
        match value {
            Value::Thunk(op) => self.await_op(op),
            other => Await::failed(
                TaskError::protocol(format!("awaited a {} instead of a thunk", other.type_name())),
                self.channel.clone(),
            ),
        }
    }

    /// Registers a finalizer to run once when the host shuts the runtime down.
    ///
    /// # Errors
    /// [`TaskError::InvariantViolation`] once finalizers have been flushed.
    pub fn atexit<F>(&self, f: F) -> Result<(), TaskError>
    where
        F: FnOnce() -> Result<(), TaskError> + 'static,
    {
        self.shared()?.register_finalizer(Box::new(f))
    }

    /// Current time on the runtime's clock.
    pub fn now(&self) -> Instant {
        self.clock.get()
    }

    /// Looks up a global value published by the host or another task.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.runtime.upgrade()?.globals.borrow().get(name)
    }

    /// Stores a global value, returning the previous one.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) -> Result<Option<Value>, TaskError> {
        Ok(self.shared()?.globals.borrow_mut().set(name, value.into()))
    }

    /// Looks up a registered function.
    pub fn function(&self, name: &str) -> Option<ScriptFn> {
        self.runtime.upgrade()?.globals.borrow().function(name)
    }

    fn shared(&self) -> Result<Rc<Shared>, TaskError> {
        self.runtime
            .upgrade()
            .ok_or_else(|| TaskError::invariant("runtime has been dropped"))
    }
}
