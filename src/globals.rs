//! Named values and functions shared between the host and task bodies.
//!
//! The host publishes data and callable task bodies under string names before
//! (or while) scripts run; scripts look them up through their
//! [`TaskContext`](crate::TaskContext), and the host can read back whatever a
//! script stored.

use crate::thunk::ScriptFn;
use crate::value::Value;

use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct Globals {
    values: HashMap<String, Value>,
    functions: HashMap<String, ScriptFn>,
}

impl Globals {
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Option<Value> {
        self.values.insert(name.to_owned(), value)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    pub(crate) fn register(&mut self, name: &str, body: ScriptFn) -> Option<ScriptFn> {
        self.functions.insert(name.to_owned(), body)
    }

    pub(crate) fn function(&self, name: &str) -> Option<ScriptFn> {
        self.functions.get(name).cloned()
    }
}
