//! Dynamic values exchanged between the host, task bodies and continuations.

use crate::error::TaskError;
use crate::thunk::Thunk;

use std::fmt;
use std::rc::Rc;

/// What a task produces and what a continuation delivers.
pub type Outcome = Result<Value, TaskError>;

/// A dynamically typed script value.
///
/// Thunks compare by identity; everything else compares structurally.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Vec<Value>),
    Thunk(Thunk),
    /// A captured failure, used by [`join`](crate::join) for slots whose child failed.
    Error(TaskError),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&TaskError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the value, returning the thunk it holds.
    pub fn into_thunk(self) -> Option<Thunk> {
        match self {
            Value::Thunk(t) => Some(t),
            _ => None,
        }
    }

    /// Short name of the value's type, used in protocol error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Thunk(_) => "thunk",
            Value::Error(_) => "error",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Thunk(t) => write!(f, "{t:?}"),
            Value::Error(e) => write!(f, "error({e})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Thunk> for Value {
    fn from(t: Thunk) -> Self {
        Value::Thunk(t)
    }
}

impl From<TaskError> for Value {
    fn from(e: TaskError) -> Self {
        Value::Error(e)
    }
}
