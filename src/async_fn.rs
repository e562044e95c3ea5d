//! `async(fn)`: turning a task body into a factory of suspended operations.
//!
//! Calling a [`Factory`] does not run anything. It returns a [`Thunk`] which,
//! each time it is invoked, starts a fresh task over the body under its own
//! driver and reports the task's outcome to the continuation it was invoked
//! with. Sub-tasks created this way interleave with everything else only
//! through the shared timer queue.

use crate::runtime::Runtime;
use crate::thunk::{ScriptFn, Thunk};
use crate::value::Value;

use std::fmt;

/// Produces suspended operations that run one task body.
#[derive(Clone)]
pub struct Factory {
    body: ScriptFn,
}

impl Factory {
    /// Binds `args` and returns the operation that will run the body with them.
    pub fn call(&self, args: Vec<Value>) -> Thunk {
        let body = self.body.clone();

        Thunk::labeled("async", move |rt: &Runtime, cb| {
            rt.drive(body.clone(), Some(cb), args.clone()).map(|_| ())
        })
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// Wraps `body` into a [`Factory`].
///
/// # Example
/// ```ignore
/// let add = async_fn(script_fn(|_, args| async move {
///     let sum = args.iter().filter_map(Value::as_number).sum::<f64>();
///     Ok(Value::Number(sum))
/// }));
///
/// let three = cx.await_op(add.call(vec![1.into(), 2.into()])).await?;
/// ```
pub fn async_fn(body: ScriptFn) -> Factory {
    Factory { body }
}
