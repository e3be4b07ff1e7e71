//! Common test utilities and fixtures
//!
//! Shared helpers for the integration tests. The `fanout` binary hosts the
//! built-in tasks, so it serves as the worker program for every run.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use fanout::{RunnerConfig, TaskRunner, WorkerCommand};
use serde_json::Value;

/// Path to the compiled `fanout` binary
pub fn fanout_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fanout"))
}

/// Runner configuration using the `fanout` binary as worker
pub fn runner_config() -> RunnerConfig {
    RunnerConfig::new(WorkerCommand::new(fanout_bin())).with_inherit_stderr(false)
}

/// Runner using the `fanout` binary as worker
pub fn runner() -> TaskRunner {
    TaskRunner::new(runner_config())
}

/// Write a JSON task list into `dir` and return its path
pub fn write_tasks(dir: &Path, tasks: &Value) -> PathBuf {
    let path = dir.join("tasks.json");
    fs::write(&path, serde_json::to_vec(tasks).unwrap()).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_bin_exists() {
        assert!(fanout_bin().exists(), "fanout binary should be built for integration tests");
    }
}
