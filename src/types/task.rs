//! Task definitions
//!
//! A task names a handler registered in the worker's `TaskRegistry` and
//! carries its raw, not yet normalized, arguments.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One unit of work submitted to the runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Registered handler name
    #[serde(rename = "task")]
    pub name: String,

    /// Raw arguments; normalized by the wrapper inside the worker
    #[serde(default = "no_args")]
    pub args: Value,
}

impl Task {
    pub fn new(name: impl Into<String>, args: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }

    /// Build a task list from parallel name and argument lists
    pub fn zip<N, A>(names: N, args: A) -> Result<Vec<Task>>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        A: IntoIterator<Item = Value>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let args: Vec<Value> = args.into_iter().collect();
        if names.len() != args.len() {
            return Err(Error::MalformedInput(format!(
                "{} task names but {} argument bundles",
                names.len(),
                args.len()
            )));
        }
        Ok(names.into_iter().zip(args).map(|(n, a)| Task::new(n, a)).collect())
    }
}

/// Parse a JSON task list; `origin` names the source in errors
pub fn parse_task_list(origin: &str, raw: &str) -> Result<Vec<Task>> {
    serde_json::from_str(raw).map_err(|e| Error::task_file(origin, e.to_string()))
}

/// Load a task list from a file, or from stdin when `path` is `-`
pub fn load_task_list(path: &Path) -> Result<Vec<Task>> {
    if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return parse_task_list("<stdin>", &raw);
    }

    let raw = fs::read_to_string(path).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_task_list(&path.display().to_string(), &raw)
}

fn no_args() -> Value {
    Value::Array(Vec::new())
}

/// The value stored in place of a result when a task fails.
///
/// It is an empty array and therefore indistinguishable from a task that
/// legitimately returned an empty sequence.
pub fn failure_sentinel() -> Value {
    Value::Array(Vec::new())
}

/// Whether `value` looks like the failure sentinel (it may also be a genuine empty result)
pub fn is_failure_sentinel(value: &Value) -> bool {
    matches!(value, Value::Array(values) if values.is_empty())
}
