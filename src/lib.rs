//! Cooperative task runtime for scripted, timer-driven workflows.
//!
//! Scripts describe asynchronous workflows as task bodies: sequences of
//! waits, concurrent sub-tasks and deferred cleanup. A host event loop drives
//! them by advancing time. There is no preemption and there are no worker
//! threads: exactly one task body runs at a time and control changes hands
//! only at awaits.
//!
//! # Architecture
//!
//! - **Runtime**: Owns the task arena, timer queue, finalizer queue and globals; the host calls `tick`
//! - **Task driver**: Resumes a task until it finishes or yields a thunk, then invokes that thunk
//! - **Continuation**: Single-use capability that resumes one waiting computation with one outcome
//! - **Thunk**: Suspended operation, invoked with a continuation to eventually produce a result
//! - **Combinators**: `sleep`, `join` and `async_fn`, all built on the three pieces above
//! - **Finalizers**: `atexit` actions flushed exactly once when the host shuts down
//! - **RuntimeBuilder**: Fluent builder pattern for runtime instantiation
//!
//! # Example
//!
//! ```ignore
//! use pong::{Runtime, Value, async_fn, join, script_fn, sleep_ms};
//!
//! let rt = Runtime::new();
//! let worker = async_fn(script_fn(|cx, args| async move {
//!     let ms = args[0].as_number().unwrap_or(0.0);
//!     cx.await_op(sleep_ms(ms)).await?;
//!     Ok(Value::Number(ms))
//! }));
//!
//! rt.start(script_fn(move |cx, _| {
//!     let worker = worker.clone();
//!     async move {
//!         let ops = vec![worker.call(vec![100.0.into()]), worker.call(vec![50.0.into()])];
//!         cx.await_op(join(ops)).await
//!     }
//! }), vec![])?;
//!
//! assert_eq!(rt.run()?, Value::List(vec![100.0.into(), 50.0.into()]));
//! ```

mod async_fn;
mod builder;
mod continuation;
mod error;
mod globals;
mod join;
mod runtime;
mod task;
mod thunk;
mod timer;
mod utils;
mod value;

pub use async_fn::{Factory, async_fn};
pub use builder::RuntimeBuilder;
pub use continuation::Continuation;
pub use error::{RuntimeError, TaskError};
pub use join::join;
pub use runtime::{Finalizer, HostStatus, Runtime, TaskContext};
pub use task::{Await, TaskId, TaskStatus};
pub use thunk::{ScriptFn, Thunk, script_fn};
pub use timer::{sleep, sleep_ms};
pub use value::{Outcome, Value};
