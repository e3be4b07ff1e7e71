//! Built-in tasks hosted by the `fanout` binary
//!
//! Small, deterministic tasks for exercising the runner from the CLI and
//! from tests: arithmetic, echo, sleeping, and the different ways a task
//! can fail (error, panic, abort, early exit).

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde_json::{json, Number, Value};

use super::TaskRegistry;
use crate::types::{failure_sentinel, TaskArgs};

/// Registry containing every built-in task
pub fn builtin_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .register("double", "Return 2 * n", |args: &TaskArgs| {
            let n: Value = args.require(0, "n")?;
            scale(&n, 2)
        })
        .register("sum", "Sum of all numeric arguments", |args: &TaskArgs| {
            sum(args.values())
        })
        .register("echo", "Return the normalized arguments unchanged", |args: &TaskArgs| {
            Ok(args.to_value())
        })
        .register("sleep", "Sleep for ms milliseconds, then return ms", |args: &TaskArgs| {
            let ms: u64 = args.require(0, "ms")?;
            thread::sleep(Duration::from_millis(ms));
            Ok(json!(ms))
        })
        .register("empty", "Succeed with an empty sequence", |_: &TaskArgs| {
            Ok(failure_sentinel())
        })
        .register("fail", "Always return an error", |args: &TaskArgs| {
            let message: String = args.optional(0, "message", "requested failure".to_string())?;
            bail!(message)
        })
        .register("panic", "Panic inside the handler", |_: &TaskArgs| -> anyhow::Result<Value> {
            panic!("requested panic")
        })
        .register(
            "abort",
            "Abort the worker process without replying",
            |_: &TaskArgs| -> anyhow::Result<Value> { std::process::abort() },
        )
        .register("exit", "Exit the worker process with the given code", |args: &TaskArgs| {
            let code: i32 = args.optional(0, "code", 3)?;
            std::process::exit(code)
        });
    registry
}

/// Multiply a JSON number, keeping integers integral
fn scale(n: &Value, factor: i64) -> anyhow::Result<Value> {
    if let Some(i) = n.as_i64() {
        let product = i
            .checked_mul(factor)
            .ok_or_else(|| anyhow!("integer overflow"))?;
        return Ok(json!(product));
    }
    let f = n.as_f64().ok_or_else(|| anyhow!("expected a number, got {}", n))?;
    float(f * factor as f64)
}

/// Sum JSON numbers; the result is an integer when every input is one
fn sum(values: Vec<&Value>) -> anyhow::Result<Value> {
    if values.iter().all(|v| v.is_i64()) {
        let total = values
            .iter()
            .filter_map(|v| v.as_i64())
            .try_fold(0i64, |acc, v| acc.checked_add(v))
            .ok_or_else(|| anyhow!("integer overflow"))?;
        return Ok(json!(total));
    }

    let mut total = 0.0;
    for value in values {
        total += value
            .as_f64()
            .ok_or_else(|| anyhow!("expected a number, got {}", value))?;
    }
    float(total)
}

fn float(f: f64) -> anyhow::Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("result is not a finite number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> anyhow::Result<Value> {
        builtin_registry()
            .get(name)
            .expect("builtin registered")
            .call(&TaskArgs::from_value(args))
    }

    #[test]
    fn test_double() {
        assert_eq!(call("double", json!(3)).unwrap(), json!(6));
        assert_eq!(call("double", json!({"n": 4})).unwrap(), json!(8));
        assert_eq!(call("double", json!(1.5)).unwrap(), json!(3.0));
        assert!(call("double", json!("x")).is_err());
        assert!(call("double", json!([])).is_err());
    }

    #[test]
    fn test_sum() {
        assert_eq!(call("sum", json!([1, 2, 3])).unwrap(), json!(6));
        assert_eq!(call("sum", json!({"a": 1, "b": 2})).unwrap(), json!(3));
        assert_eq!(call("sum", json!([])).unwrap(), json!(0));
        assert_eq!(call("sum", json!([1, 0.5])).unwrap(), json!(1.5));
        assert!(call("sum", json!(["a"])).is_err());
    }

    #[test]
    fn test_echo_returns_normalized_args() {
        assert_eq!(call("echo", json!(5)).unwrap(), json!([5]));
        assert_eq!(call("echo", json!({"k": "v"})).unwrap(), json!({"k": "v"}));
    }

    #[test]
    fn test_sleep_returns_duration() {
        assert_eq!(call("sleep", json!(1)).unwrap(), json!(1));
        assert_eq!(call("sleep", json!({"ms": 2})).unwrap(), json!(2));
    }

    #[test]
    fn test_fail_and_empty() {
        assert!(call("fail", json!([])).is_err());
        assert_eq!(
            call("fail", json!({"message": "boom"})).unwrap_err().to_string(),
            "boom"
        );
        assert_eq!(call("empty", json!([])).unwrap(), json!([]));
    }

    #[test]
    fn test_all_builtins_described() {
        let registry = builtin_registry();
        for name in ["double", "sum", "echo", "sleep", "empty", "fail", "panic", "abort", "exit"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
        assert!(registry.descriptions().iter().all(|(_, d)| !d.is_empty()));
    }
}
