//! Structured concurrency: wait for several suspended operations at once.
//!
//! All children are started back to back when the join thunk is invoked.
//! Results are gathered by original position, whatever order the children
//! finish in. A child that fails does not cancel its siblings: its slot
//! holds [`Value::Error`] and the join itself still succeeds once every slot
//! is filled.
//!
//! # Example
//!
//! ```ignore
//! use pong::{join, sleep_ms};
//!
//! // resolves after ~100ms with [nil, nil], slot 0 belonging to the 100ms sleep
//! let both = join(vec![sleep_ms(100.0), sleep_ms(50.0)]);
//! let results = cx.await_op(both).await?;
//! ```

use crate::continuation::Continuation;
use crate::error::TaskError;
use crate::runtime::Runtime;
use crate::thunk::Thunk;
use crate::value::{Outcome, Value};

use std::cell::RefCell;
use std::rc::Rc;

/// Aggregation record for one invocation of a join thunk.
struct JoinState {
    expected: usize,
    completed: usize,
    results: Vec<Option<Value>>,
    cb: Option<Continuation>,
}

impl JoinState {
    fn new(expected: usize, cb: Continuation) -> Self {
        Self {
            expected,
            completed: 0,
            results: vec![None; expected],
            cb: Some(cb),
        }
    }

    /// Records the outcome of `slot`, returning the aggregate continuation and
    /// results once the last slot is filled.
    fn record(&mut self, slot: usize, outcome: Outcome) -> Result<Option<(Continuation, Value)>, TaskError> {
        let entry = self
            .results
            .get_mut(slot)
            .ok_or_else(|| TaskError::invariant(format!("join slot {slot} out of range")))?;

        if entry.is_some() {
            return Err(TaskError::invariant(format!("join slot {slot} completed twice")));
        }

        *entry = Some(outcome.unwrap_or_else(Value::Error));
        self.completed += 1;

        if self.completed < self.expected {
            return Ok(None);
        }

        let cb = self
            .cb
            .take()
            .ok_or_else(|| TaskError::invariant("join resolved twice"))?;

        let results = self.results.drain(..).map(Option::unwrap_or_default).collect();

        Ok(Some((cb, Value::List(results))))
    }
}

fn slot_continuation(state: &Rc<RefCell<JoinState>>, slot: usize) -> Continuation {
    let state = state.clone();

    Continuation::labeled("join slot", move |outcome| {
        // Release the borrow before resuming: the aggregate continuation may
        // run arbitrary code, including another join.
        let ready = state.borrow_mut().record(slot, outcome)?;

        match ready {
            Some((cb, results)) => {
                tracing::debug!(slots = state.borrow().expected, "join resolved");
                cb.resume(Ok(results))
            }
            None => Ok(()),
        }
    })
}

/// Returns a thunk that runs every operation in `ops` and resolves with a
/// [`Value::List`] of their results in the order given.
///
/// An empty list resolves immediately, within the same invocation.
pub fn join(ops: Vec<Thunk>) -> Thunk {
    let ops: Rc<[Thunk]> = ops.into();

    Thunk::labeled("join", move |rt: &Runtime, cb| {
        if ops.is_empty() {
            return cb.resume(Ok(Value::List(Vec::new())));
        }

        let state = Rc::new(RefCell::new(JoinState::new(ops.len(), cb)));
        let mut first_error = None;

        for (slot, op) in ops.iter().enumerate() {
            // Start every child even if an earlier one reported an error
            // that had nowhere else to go.
            if let Err(e) = op.invoke(rt, slot_continuation(&state, slot)) {
                tracing::error!(slot, error = %e, "join child raised an unhandled error");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}
