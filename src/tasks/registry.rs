//! Task Registry
//!
//! Closures cannot cross a process boundary, so the runner ships a task
//! *name* and the worker process resolves it here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::types::TaskArgs;

/// A callable that can be run as a task
pub trait TaskHandler: Send + Sync {
    /// Invoke the task with its normalized arguments
    fn call(&self, args: &TaskArgs) -> anyhow::Result<Value>;
}

impl<F> TaskHandler for F
where
    F: Fn(&TaskArgs) -> anyhow::Result<Value> + Send + Sync,
{
    fn call(&self, args: &TaskArgs) -> anyhow::Result<Value> {
        self(args)
    }
}

struct RegisteredTask {
    description: String,
    handler: Arc<dyn TaskHandler>,
}

/// Named task handlers hosted by a worker executable
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure; a later registration under the same name replaces the earlier one
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&TaskArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register_handler(name, description, handler)
    }

    /// Register any `TaskHandler` implementation
    pub fn register_handler<H>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> &mut Self
    where
        H: TaskHandler + 'static,
    {
        self.tasks.insert(
            name.into(),
            RegisteredTask {
                description: description.into(),
                handler: Arc::new(handler),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.tasks.get(name).map(|t| t.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// (name, description) pairs, sorted by name
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .map(|(name, t)| (name.as_str(), t.description.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_call() {
        let mut registry = TaskRegistry::new();
        registry.register("triple", "n * 3", |args: &TaskArgs| {
            let n: i64 = args.require(0, "n")?;
            Ok(json!(n * 3))
        });

        assert!(registry.contains("triple"));
        let handler = registry.get("triple").unwrap();
        let result = handler.call(&TaskArgs::from_value(json!(2))).unwrap();
        assert_eq!(result, json!(6));
        let result = handler.call(&TaskArgs::from_value(json!({"n": 5}))).unwrap();
        assert_eq!(result, json!(15));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = TaskRegistry::new();
        registry
            .register("zeta", "", |_: &TaskArgs| Ok(Value::Null))
            .register("alpha", "first", |_: &TaskArgs| Ok(Value::Null));

        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert_eq!(registry.descriptions()[0], ("alpha", "first"));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = TaskRegistry::new();
        registry.register("t", "old", |_: &TaskArgs| Ok(json!(1)));
        registry.register("t", "new", |_: &TaskArgs| Ok(json!(2)));

        assert_eq!(registry.len(), 1);
        let result = registry.get("t").unwrap().call(&TaskArgs::Positional(vec![])).unwrap();
        assert_eq!(result, json!(2));
    }
}
