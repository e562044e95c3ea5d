//! Host-facing runtime: owns the task arena, the timer queue and the finalizer queue.
//!
//! The host drives everything. It starts a root task, then calls
//! [`Runtime::tick`] with the current time, typically once per frame, until
//! the root task reaches a terminal state, and finally calls
//! [`Runtime::flush_finalizers`]. [`Runtime::run`] and [`Runtime::run_while`]
//! package that loop for hosts that have nothing else to do in between.
//!
//! All state lives in one `Runtime` instance. Nothing is global, and the
//! runtime is confined to the thread that created it.

use crate::builder::DEFAULT_FRAME_INTERVAL;
use crate::continuation::Continuation;
use crate::error::{RuntimeError, TaskError};
use crate::globals::Globals;
use crate::runtime::finalizer::{Finalizer, FinalizerQueue};
use crate::task::{Task, TaskId, TaskStatus};
use crate::thunk::ScriptFn;
use crate::timer::TimerQueue;
use crate::utils::slab::Slab;
use crate::value::{Outcome, Value};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Where the root task stands after a [`Runtime::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostStatus {
    /// The root task is suspended; keep ticking.
    Pending,
    /// The root task completed with this value.
    Done(Value),
}

#[derive(Default)]
struct RootState {
    started: bool,
    id: Option<TaskId>,
    outcome: Option<Outcome>,
}

/// State shared by the runtime handle, task contexts and step continuations.
pub(crate) struct Shared {
    pub(crate) clock: Rc<Cell<Instant>>,
    pub(crate) tasks: RefCell<Slab<Task>>,
    pub(crate) timers: RefCell<TimerQueue>,
    pub(crate) finalizers: RefCell<FinalizerQueue>,
    pub(crate) globals: RefCell<Globals>,
    root: RefCell<RootState>,
    frame_interval: Duration,
}

impl Shared {
    pub(crate) fn register_finalizer(&self, finalizer: Finalizer) -> Result<(), TaskError> {
        let result = self.finalizers.borrow_mut().push(finalizer);

        if let Err(e) = &result {
            tracing::warn!(error = %e, "rejected atexit registration");
        }

        result
    }
}

/// Cooperative task runtime driven by a host loop.
///
/// # Example
/// ```ignore
/// use pong::{Runtime, Value, join, script_fn, sleep_ms};
///
/// let rt = Runtime::new();
/// rt.start(script_fn(|cx, _| async move {
///     let results = cx.await_op(join(vec![sleep_ms(100.0), sleep_ms(50.0)])).await?;
///     Ok(results)
/// }), vec![])?;
///
/// let value = rt.run()?;
/// ```
pub struct Runtime {
    pub(crate) shared: Rc<Shared>,
}

impl Runtime {
    /// Creates a runtime whose clock starts now, with the default frame interval.
    pub fn new() -> Self {
        Self::with_config(Instant::now(), DEFAULT_FRAME_INTERVAL)
    }

    pub(crate) fn with_config(start_time: Instant, frame_interval: Duration) -> Self {
        let shared = Shared {
            clock: Rc::new(Cell::new(start_time)),
            tasks: RefCell::new(Slab::new()),
            timers: RefCell::new(TimerQueue::new()),
            finalizers: RefCell::new(FinalizerQueue::new()),
            globals: RefCell::new(Globals::default()),
            root: RefCell::new(RootState::default()),
            frame_interval,
        };

        Self {
            shared: Rc::new(shared),
        }
    }

    pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    /// Current time on the runtime's clock (the latest time passed to [`tick`](Self::tick)).
    pub fn now(&self) -> Instant {
        self.shared.clock.get()
    }

    /// Schedules `cb` to be resumed with `nil` once the clock has advanced by `duration`.
    ///
    /// # Errors
    /// [`TaskError::Script`] if the deadline does not fit in an [`Instant`].
    pub fn schedule_timer(&self, duration: Duration, cb: Continuation) -> Result<(), TaskError> {
        let deadline = self
            .now()
            .checked_add(duration)
            .ok_or_else(|| TaskError::script("sleep: duration out of range"))?;

        self.schedule_at(deadline, cb);
        Ok(())
    }

    /// Schedules `cb` to be resumed with `nil` once the clock reaches `deadline`.
    pub fn schedule_at(&self, deadline: Instant, cb: Continuation) {
        self.shared.timers.borrow_mut().schedule(deadline, cb);
        tracing::trace!(delay = ?deadline.saturating_duration_since(self.now()), "timer scheduled");
    }

    /// Starts `root` as the root task, running it up to its first suspension.
    ///
    /// # Errors
    /// [`RuntimeError::AlreadyStarted`] on the second call.
    pub fn start(&self, root: ScriptFn, args: Vec<Value>) -> Result<TaskId, RuntimeError> {
        {
            let mut state = self.shared.root.borrow_mut();
            if state.started {
                return Err(RuntimeError::AlreadyStarted);
            }
            state.started = true;
        }

        let shared = Rc::downgrade(&self.shared);
        let on_finish = Continuation::labeled("root", move |outcome| {
            match &outcome {
                Ok(value) => tracing::info!(?value, "root task completed"),
                Err(e) => tracing::error!(error = %e, "root task failed"),
            }

            if let Some(shared) = shared.upgrade() {
                shared.root.borrow_mut().outcome = Some(outcome);
            }
            Ok(())
        });

        let id = self.drive(root, Some(on_finish), args)?;
        self.shared.root.borrow_mut().id = Some(id);

        Ok(id)
    }

    /// Starts the function registered under `name` as the root task.
    pub fn start_named(&self, name: &str, args: Vec<Value>) -> Result<TaskId, RuntimeError> {
        let root = self
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_owned()))?;

        self.start(root, args)
    }

    /// Advances the clock to `now` and fires every timer that is due.
    ///
    /// Timers fire in deadline order, ties in registration order. Timers
    /// scheduled while firing wait for the next tick. Errors raised by a fired
    /// continuation that have nowhere else to go are logged and do not stop the
    /// remaining timers.
    ///
    /// # Returns
    /// [`HostStatus::Pending`] while the root task is suspended,
    /// [`HostStatus::Done`] once it has completed.
    ///
    /// Tasks driven directly with [`drive`](Self::drive) advance the same way,
    /// so ticking before [`start`](Self::start) is allowed and reports
    /// [`HostStatus::Pending`].
    ///
    /// # Errors
    /// [`RuntimeError::Task`] once the root task has failed.
    pub fn tick(&self, now: Instant) -> Result<HostStatus, RuntimeError> {
        if !self.is_done() {
            if now > self.now() {
                self.shared.clock.set(now);
            }

            let due = self.shared.timers.borrow_mut().take_due(self.now());
            if !due.is_empty() {
                tracing::trace!(due = due.len(), "firing timers");
            }

            for cb in due {
                if let Err(e) = cb.resume(Ok(Value::Nil)) {
                    tracing::error!(error = %e, "timer continuation failed");
                }
            }
        }

        match &self.shared.root.borrow().outcome {
            None => Ok(HostStatus::Pending),
            Some(Ok(value)) => Ok(HostStatus::Done(value.clone())),
            Some(Err(e)) => Err(RuntimeError::Task(e.clone())),
        }
    }

    /// Returns `true` once the root task has completed or failed.
    pub fn is_done(&self) -> bool {
        self.shared.root.borrow().outcome.is_some()
    }

    /// Status of the root task, `None` before [`start`](Self::start).
    pub fn root_status(&self) -> Option<TaskStatus> {
        let root = self.shared.root.borrow();

        match &root.outcome {
            Some(Ok(_)) => Some(TaskStatus::Completed),
            Some(Err(_)) => Some(TaskStatus::Failed),
            None => root.id.and_then(|id| self.status(id)),
        }
    }

    /// Outcome of the root task once it is terminal.
    pub fn root_outcome(&self) -> Option<Outcome> {
        self.shared.root.borrow().outcome.clone()
    }

    /// Status of a live task. Tasks leave the arena when they finish, so
    /// terminal tasks report `None`; only [`root_status`](Self::root_status)
    /// remembers how the root ended.
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.shared.tasks.borrow().get(id.0).map(|task| task.status)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.timers.borrow().next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.shared.timers.borrow().len()
    }

    /// Number of tasks that have started and not yet finished.
    pub fn live_tasks(&self) -> usize {
        self.shared.tasks.borrow().len()
    }

    /// Registers a finalizer from the host side.
    pub fn atexit<F>(&self, f: F) -> Result<(), TaskError>
    where
        F: FnOnce() -> Result<(), TaskError> + 'static,
    {
        self.shared.register_finalizer(Box::new(f))
    }

    /// Number of finalizers waiting for the flush.
    pub fn pending_finalizers(&self) -> usize {
        self.shared.finalizers.borrow().len()
    }

    /// Returns `true` once [`flush_finalizers`](Self::flush_finalizers) has run.
    pub fn finalizers_flushed(&self) -> bool {
        self.shared.finalizers.borrow().is_flushed()
    }

    /// Runs every registered finalizer once, in registration order.
    ///
    /// A failing finalizer is logged and the rest still run. Only the first
    /// call does anything; later calls return `0`.
    ///
    /// # Returns
    /// The number of finalizers that ran.
    pub fn flush_finalizers(&self) -> usize {
        let Some(entries) = self.shared.finalizers.borrow_mut().begin_flush() else {
            tracing::debug!("finalizers already flushed");
            return 0;
        };

        let count = entries.len();
        tracing::debug!(count, "flushing finalizers");

        for (index, finalizer) in entries.into_iter().enumerate() {
            if let Err(e) = finalizer() {
                tracing::error!(index, error = %e, "finalizer failed");
            }
        }

        count
    }

    /// Runs the host loop until the root task is terminal, then flushes finalizers.
    ///
    /// Between ticks the thread sleeps until the next timer deadline, capped
    /// at the frame interval, so nothing is busy-polled.
    ///
    /// # Errors
    /// The root task's error, or [`RuntimeError::Stalled`] when the root is
    /// suspended and no timer is left that could resume it.
    pub fn run(&self) -> Result<Value, RuntimeError> {
        match self.run_loop(|| true, true)? {
            HostStatus::Done(value) => Ok(value),
            HostStatus::Pending => Err(RuntimeError::Stalled {
                suspended: self.live_tasks(),
            }),
        }
    }

    /// Like [`run`](Self::run), but also stops as soon as `keep_running`
    /// returns `false` (the host asked to quit, e.g. its window closed).
    ///
    /// Finalizers are flushed on every exit path. An idle root task is not an
    /// error here: the host may still resume it through a continuation it holds.
    ///
    /// # Returns
    /// [`HostStatus::Pending`] if the host stopped the loop first.
    pub fn run_while<F>(&self, keep_running: F) -> Result<HostStatus, RuntimeError>
    where
        F: FnMut() -> bool,
    {
        self.run_loop(keep_running, false)
    }

    fn run_loop<F>(&self, mut keep_running: F, stall_when_idle: bool) -> Result<HostStatus, RuntimeError>
    where
        F: FnMut() -> bool,
    {
        if !self.shared.root.borrow().started {
            return Err(RuntimeError::NotStarted);
        }

        let result = loop {
            if !keep_running() {
                tracing::debug!("host requested shutdown");
                break Ok(HostStatus::Pending);
            }

            match self.tick(Instant::now()) {
                Ok(HostStatus::Pending) => {}
                other => break other,
            }

            let wait = match self.next_deadline() {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.shared.frame_interval),
                None if stall_when_idle => {
                    let suspended = self.live_tasks();
                    tracing::warn!(suspended, "root task can never resume");
                    break Err(RuntimeError::Stalled { suspended });
                }
                None => self.shared.frame_interval,
            };

            if !wait.is_zero() {
                thread::sleep(wait);
            }
        };

        self.flush_finalizers();
        result
    }

    /// Publishes a global value, returning the previous one.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.shared.globals.borrow_mut().set(name, value.into())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.shared.globals.borrow().get(name)
    }

    /// Registers a task body under `name` for [`start_named`](Self::start_named)
    /// and [`TaskContext::function`](crate::TaskContext::function).
    pub fn register_fn(&self, name: &str, body: ScriptFn) -> Option<ScriptFn> {
        self.shared.globals.borrow_mut().register(name, body)
    }

    pub fn function(&self, name: &str) -> Option<ScriptFn> {
        self.shared.globals.borrow().function(name)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("live_tasks", &self.live_tasks())
            .field("pending_timers", &self.pending_timers())
            .field("done", &self.is_done())
            .finish()
    }
}
