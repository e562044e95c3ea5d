//! Error types for tasks and the host-facing runtime API.
//!
//! Two layers of errors exist:
//!
//! - [`TaskError`] travels *inside* the runtime: task bodies return it, continuations
//!   carry it, and [`join`](crate::join) records it per slot. It is `Clone` so it can be
//!   stored in a [`Value`](crate::Value).
//! - [`RuntimeError`] is what the host sees from [`Runtime`](crate::Runtime) calls.

use thiserror::Error;

/// Errors raised while driving a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// A task body raised an error during a resume step.
    #[error("script error: {0}")]
    Script(String),

    /// A task suspended on something that is not a suspended operation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A continuation or join slot was used more than once, or the runtime
    /// state was otherwise used in a way that can never be valid.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl TaskError {
    /// Creates a [`TaskError::Script`] from any displayable message.
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script(message.into())
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Returns `true` for errors that indicate a programming mistake rather
    /// than a failure raised by script code.
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, Self::Script(_))
    }
}

/// Errors reported to the host loop.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The root task (or a driver call made by the host) failed.
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("a root task has already been started on this runtime")]
    AlreadyStarted,

    #[error("no root task has been started")]
    NotStarted,

    #[error("no function registered under `{0}`")]
    UnknownFunction(String),

    /// The root task is suspended but nothing is left that could resume it.
    #[error("root task is suspended with no pending timers ({suspended} task(s) leaked)")]
    Stalled { suspended: usize },
}
