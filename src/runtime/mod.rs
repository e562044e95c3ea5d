//! Runtime subsystem modules.

pub(crate) mod context;
mod core;
mod driver;
pub(crate) mod finalizer;

pub use context::TaskContext;
pub use self::core::{HostStatus, Runtime};
pub(crate) use self::core::Shared;
pub use finalizer::Finalizer;
