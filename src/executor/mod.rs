//! Task execution
//!
//! Both sides of a run:
//! - `runner`: spawns one worker process per task and collects results
//! - `worker`: serves a single request inside the spawned process
//! - `wrapper`: invokes the named handler and folds failures into the sentinel
//! - `state`: per-task lifecycle bookkeeping

mod runner;
mod state;
mod worker;
mod wrapper;

pub use runner::*;
pub use state::*;
pub use worker::*;
pub use wrapper::*;
