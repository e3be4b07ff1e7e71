//! Task registration
//!
//! Named handlers that a worker process can run, plus the built-in set
//! hosted by the `fanout` binary.

mod builtin;
mod registry;

pub use builtin::builtin_registry;
pub use registry::{TaskHandler, TaskRegistry};
