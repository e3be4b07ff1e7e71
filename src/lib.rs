//! Fanout - process-per-task parallel runner
//!
//! Every task of a batch runs in its own OS process, all launched at once.
//! Results are collected over a one-shot pipe per worker and returned in
//! submission order; a task that fails for any reason leaves the empty-array
//! sentinel in its slot.
//!
//! Handlers are registered by name, since closures cannot cross a process
//! boundary. A program hosting tasks calls [`serve_if_worker`] first thing in
//! `main`:
//!
//! ```no_run
//! use fanout::{serve_if_worker, Task, TaskRegistry, TaskRunner};
//! use serde_json::json;
//!
//! fn main() -> fanout::Result<()> {
//!     let mut registry = TaskRegistry::new();
//!     registry.register("double", "Multiply by two", |args| {
//!         let n: i64 = args.require(0, "n")?;
//!         Ok(json!(n * 2))
//!     });
//!
//!     if let Some(served) = serve_if_worker(&registry) {
//!         return served;
//!     }
//!
//!     let runner = TaskRunner::for_current_exe()?;
//!     let results = runner.run_all_blocking(vec![
//!         Task::new("double", json!(3)),
//!         Task::new("missing", json!(1)),
//!         Task::new("double", json!({"n": 3})),
//!     ])?;
//!     assert_eq!(results, vec![json!(6), json!([]), json!(6)]);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod protocol;
pub mod tasks;
pub mod types;
pub mod version;

pub use config::FanoutConfig;
pub use error::{Error, ErrorCode, Result};
pub use executor::{
    serve_if_worker, RunReport, RunnerConfig, TaskRecord, TaskRunner, TaskState, WorkerCommand,
};
pub use tasks::{builtin_registry, TaskHandler, TaskRegistry};
pub use types::{failure_sentinel, is_failure_sentinel, Task, TaskArgs};
