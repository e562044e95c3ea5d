//! Tasks: resumable units of computation owned by the runtime's task arena.
//!
//! A task wraps the future produced by a [`ScriptFn`](crate::ScriptFn). The
//! future *is* the task's execution state: every `await_op(..).await` inside
//! the body compiles to a point where the future returns `Poll::Pending`, and
//! the driver polls it again only once a value for that point has arrived.
//!
//! # How a suspension travels
//!
//! 1. The body awaits an [`Await`] future holding a [`Thunk`]
//! 2. On first poll the `Await` parks the thunk in the task's [`TaskChannel`]
//!    and returns `Poll::Pending`
//! 3. The driver picks the thunk up and invokes it with the task's step
//!    continuation
//! 4. Whoever holds that continuation later places the outcome in the
//!    channel's inbox and asks the driver to poll again
//! 5. The `Await` finds the outcome and completes with it

use crate::continuation::Continuation;
use crate::error::TaskError;
use crate::thunk::Thunk;
use crate::utils::slab::Key;
use crate::value::Outcome;

use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Identity of a task inside one runtime.
///
/// Ids of finished tasks are never confused with ids of newer tasks that
/// happen to reuse the same arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) Key);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}v{}", self.0.index(), self.0.generation())
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The body is executing, or the driver is dispatching what it just yielded.
    Running,
    /// The body is parked at an await, waiting for its step continuation.
    Suspended,
    /// The body returned a value.
    ///
    /// Finished tasks leave the arena, so only [`Runtime::root_status`]
    /// reports this; [`Runtime::status`] returns `None` for them.
    ///
    /// [`Runtime::root_status`]: crate::Runtime::root_status
    /// [`Runtime::status`]: crate::Runtime::status
    Completed,
    /// The body raised an error or broke the await protocol.
    ///
    /// Like [`TaskStatus::Completed`], only reported for the root task.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Mailbox shared between a task's body and its driver.
#[derive(Default)]
pub(crate) struct TaskChannel {
    /// Thunk the body is waiting on, handed to the driver on suspension.
    pub(crate) yielded: RefCell<Option<Thunk>>,
    /// Outcome delivered by the step continuation, consumed by the body.
    pub(crate) inbox: RefCell<Option<Outcome>>,
}

/// Arena entry for a live task.
pub(crate) struct Task {
    pub(crate) status: TaskStatus,
    pub(crate) future: Option<LocalBoxFuture<'static, Outcome>>,
    pub(crate) channel: Rc<TaskChannel>,
    pub(crate) final_callback: Option<Continuation>,
}

impl Task {
    pub(crate) fn new(channel: Rc<TaskChannel>, final_callback: Option<Continuation>) -> Self {
        Self {
            status: TaskStatus::Running,
            future: None,
            channel,
            final_callback,
        }
    }
}

/// Future returned by [`TaskContext::await_op`](crate::TaskContext::await_op).
///
/// Resolves to the outcome the awaited thunk's continuation was resumed with.
#[must_use = "an await does nothing unless `.await`ed"]
pub struct Await {
    state: AwaitState,
    channel: Rc<TaskChannel>,
}

enum AwaitState {
    Start(Thunk),
    Parked,
    Failed(TaskError),
    Done,
}

impl Await {
    pub(crate) fn new(op: Thunk, channel: Rc<TaskChannel>) -> Self {
        Self {
            state: AwaitState::Start(op),
            channel,
        }
    }

    pub(crate) fn failed(error: TaskError, channel: Rc<TaskChannel>) -> Self {
        Self {
            state: AwaitState::Failed(error),
            channel,
        }
    }
}

impl Future for Await {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, AwaitState::Parked) {
            AwaitState::Start(op) => {
                let mut yielded = this.channel.yielded.borrow_mut();
                if yielded.is_some() {
                    this.state = AwaitState::Done;
                    return Poll::Ready(Err(TaskError::protocol(
                        "task awaited more than one suspended operation at once",
                    )));
                }

                *yielded = Some(op);
                Poll::Pending
            }
            AwaitState::Parked => match this.channel.inbox.borrow_mut().take() {
                Some(outcome) => {
                    this.state = AwaitState::Done;
                    Poll::Ready(outcome)
                }
                None => Poll::Pending,
            },
            AwaitState::Failed(e) => {
                this.state = AwaitState::Done;
                Poll::Ready(Err(e))
            }
            AwaitState::Done => {
                this.state = AwaitState::Done;
                Poll::Ready(Err(TaskError::invariant("await polled after completion")))
            }
        }
    }
}
