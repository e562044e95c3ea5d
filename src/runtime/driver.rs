//! The task driver.
//!
//! Drives a task by polling its future until it either finishes or parks at
//! an await. A parked task hands over the thunk it is waiting on; the driver
//! invokes that thunk with a fresh *step* continuation that, when resumed,
//! delivers the outcome to the task and polls it again.
//!
//! A step continuation may be resumed while the driver is still inside the
//! thunk invocation (an empty join, an `async` child that never suspends).
//! The task is still marked [`TaskStatus::Running`] at that point, so the
//! resumption only fills the task's inbox and the driver loop already on the
//! stack picks it up. The stack depth therefore stays flat no matter how many
//! operations complete synchronously in a row.

use crate::continuation::Continuation;
use crate::error::TaskError;
use crate::runtime::{Runtime, TaskContext};
use crate::task::{Task, TaskChannel, TaskId, TaskStatus};
use crate::thunk::ScriptFn;
use crate::value::{Outcome, Value};

use std::rc::Rc;
use std::task::{Context, Poll};

impl Runtime {
    /// Creates a task over `body(args)` and runs it until its first suspension.
    ///
    /// When the task finishes, its outcome goes to `final_callback`. Without a
    /// callback a failure is returned to whoever resumed the task last: this
    /// call if the task fails before suspending, otherwise the step
    /// continuation's caller.
    ///
    /// # Returns
    /// The id of the new task. It may already be finished when this returns.
    pub fn drive(
        &self,
        body: ScriptFn,
        final_callback: Option<Continuation>,
        args: Vec<Value>,
    ) -> Result<TaskId, TaskError> {
        let channel = Rc::new(TaskChannel::default());
        let key = self
            .shared
            .tasks
            .borrow_mut()
            .insert(Task::new(channel.clone(), final_callback));
        let id = TaskId(key);

        tracing::debug!(task = %id, args = args.len(), "task created");

        let future = body(TaskContext::new(id, channel, &self.shared), args);
        if let Some(task) = self.shared.tasks.borrow_mut().get_mut(key) {
            task.future = Some(future);
        }

        self.run_task(id)?;
        Ok(id)
    }

    /// Delivers `outcome` to a suspended task and drives it again.
    pub(crate) fn resume_task(&self, id: TaskId, outcome: Outcome) -> Result<(), TaskError> {
        let running = {
            let tasks = self.shared.tasks.borrow();
            let task = tasks
                .get(id.0)
                .ok_or_else(|| TaskError::invariant(format!("{id} resumed after it finished")))?;

            let mut inbox = task.channel.inbox.borrow_mut();
            if inbox.is_some() {
                return Err(TaskError::invariant(format!("{id} resumed twice for one await")));
            }
            *inbox = Some(outcome);

            task.status == TaskStatus::Running
        };

        if running {
            tracing::trace!(task = %id, "resumed during dispatch");
            return Ok(());
        }

        self.run_task(id)
    }

    fn run_task(&self, id: TaskId) -> Result<(), TaskError> {
        loop {
            let (mut future, channel) = {
                let mut tasks = self.shared.tasks.borrow_mut();
                let task = tasks
                    .get_mut(id.0)
                    .ok_or_else(|| TaskError::invariant(format!("{id} is not a live task")))?;
                let future = task
                    .future
                    .take()
                    .ok_or_else(|| TaskError::invariant(format!("{id} polled re-entrantly")))?;

                task.status = TaskStatus::Running;
                (future, task.channel.clone())
            };

            tracing::trace!(task = %id, "resuming");

            let mut cx = Context::from_waker(futures::task::noop_waker_ref());
            if let Poll::Ready(outcome) = future.as_mut().poll(&mut cx) {
                drop(future);
                return self.finish(id, outcome);
            }

            let Some(op) = channel.yielded.borrow_mut().take() else {
                // Parked on something that is not one of ours: nothing will
                // ever resume it, so fail now instead of leaking.
                drop(future);
                return self.finish(
                    id,
                    Err(TaskError::protocol(
                        "task suspended without awaiting a suspended operation",
                    )),
                );
            };

            if let Some(task) = self.shared.tasks.borrow_mut().get_mut(id.0) {
                task.future = Some(future);
            }

            tracing::trace!(task = %id, ?op, "suspended");

            if let Err(e) = op.invoke(self, self.step_continuation(id)) {
                // The step continuation was already used, so this error came
                // from further down the chain and this task is not its owner.
                tracing::error!(task = %id, error = %e, "awaited operation raised an unhandled error");
            }

            let mut tasks = self.shared.tasks.borrow_mut();
            let Some(task) = tasks.get_mut(id.0) else {
                return Ok(());
            };

            if channel.inbox.borrow().is_none() {
                task.status = TaskStatus::Suspended;
                tracing::trace!(task = %id, "parked");
                return Ok(());
            }
        }
    }

    fn finish(&self, id: TaskId, outcome: Outcome) -> Result<(), TaskError> {
        let task = self
            .shared
            .tasks
            .borrow_mut()
            .remove(id.0)
            .ok_or_else(|| TaskError::invariant(format!("{id} finished twice")))?;

        let status = if outcome.is_ok() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        match &outcome {
            Ok(_) => tracing::debug!(task = %id, ?status, "task finished"),
            Err(e) => tracing::debug!(task = %id, ?status, error = %e, "task finished"),
        }

        match task.final_callback {
            Some(cb) => cb.resume(outcome),
            None => outcome.map(|_| ()),
        }
    }

    fn step_continuation(&self, id: TaskId) -> Continuation {
        let shared = Rc::downgrade(&self.shared);

        Continuation::labeled("step", move |outcome| {
            let shared = shared
                .upgrade()
                .ok_or_else(|| TaskError::invariant("runtime dropped before the task resumed"))?;

            Runtime::from_shared(shared).resume_task(id, outcome)
        })
    }
}
