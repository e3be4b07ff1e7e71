//! Core type definitions
//!
//! Tasks, argument bundles and the failure sentinel.

mod args;
mod task;

pub use args::*;
pub use task::*;
