//! Task wrapper
//!
//! Runs one handler inside a worker process. Every failure mode of the
//! handler, returned error or panic, collapses into `TaskOutcome::Failed`;
//! the error itself is dropped.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::protocol::ReplyOutcome;
use crate::tasks::TaskRegistry;
use crate::types::{failure_sentinel, TaskArgs};

/// Result of invoking a single task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded(Value),
    Failed,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    /// The value reported to the runner; failures become the empty-array sentinel
    pub fn into_result(self) -> Value {
        match self {
            TaskOutcome::Succeeded(value) => value,
            TaskOutcome::Failed => failure_sentinel(),
        }
    }

    pub fn reply_outcome(&self) -> ReplyOutcome {
        match self {
            TaskOutcome::Succeeded(_) => ReplyOutcome::Succeeded,
            TaskOutcome::Failed => ReplyOutcome::Failed,
        }
    }
}

/// Resolve `name` in `registry` and call it with the normalized `args`
pub fn invoke(registry: &TaskRegistry, name: &str, args: Value) -> TaskOutcome {
    let Some(handler) = registry.get(name) else {
        return TaskOutcome::Failed;
    };
    let args = TaskArgs::from_value(args);

    match panic::catch_unwind(AssertUnwindSafe(|| handler.call(&args))) {
        Ok(Ok(value)) => TaskOutcome::Succeeded(value),
        Ok(Err(_)) | Err(_) => TaskOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::builtin_registry;
    use serde_json::json;

    #[test]
    fn test_positional_keyword_and_scalar_dispatch() {
        let registry = builtin_registry();
        assert_eq!(invoke(&registry, "double", json!(5)), TaskOutcome::Succeeded(json!(10)));
        assert_eq!(invoke(&registry, "double", json!({"n": 1})), TaskOutcome::Succeeded(json!(2)));
        assert_eq!(invoke(&registry, "sum", json!([1, 2])), TaskOutcome::Succeeded(json!(3)));
    }

    #[test]
    fn test_error_becomes_sentinel() {
        let outcome = invoke(&builtin_registry(), "fail", json!([]));
        assert!(!outcome.is_success());
        assert_eq!(outcome.reply_outcome(), ReplyOutcome::Failed);
        assert_eq!(outcome.into_result(), json!([]));
    }

    #[test]
    fn test_panic_becomes_sentinel() {
        let outcome = invoke(&builtin_registry(), "panic", json!([]));
        assert_eq!(outcome, TaskOutcome::Failed);
    }

    #[test]
    fn test_unknown_task_is_failure() {
        assert_eq!(invoke(&builtin_registry(), "nope", json!(1)), TaskOutcome::Failed);
    }

    #[test]
    fn test_wrong_arity_is_failure() {
        assert_eq!(invoke(&builtin_registry(), "double", json!([])), TaskOutcome::Failed);
    }

    #[test]
    fn test_empty_success_matches_sentinel() {
        let outcome = invoke(&builtin_registry(), "empty", json!([]));
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result(), failure_sentinel());
    }
}
