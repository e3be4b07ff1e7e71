//! Argument bundles
//!
//! A task's arguments arrive as a single JSON value and are normalized
//! before the handler is called:
//! - an object becomes a keyword bundle
//! - an array becomes a positional bundle
//! - anything else (including strings) becomes a one-element positional bundle

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized arguments for one task invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", content = "values", rename_all = "snake_case")]
pub enum TaskArgs {
    /// Keyword-style invocation, `f(x=1, y=2)`
    Keyword(Map<String, Value>),
    /// Positional invocation, `f(1, 2)`
    Positional(Vec<Value>),
}

impl TaskArgs {
    /// Normalize a raw argument value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => TaskArgs::Keyword(map),
            Value::Array(values) => TaskArgs::Positional(values),
            scalar => TaskArgs::Positional(vec![scalar]),
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self, TaskArgs::Keyword(_))
    }

    /// Number of arguments in the bundle
    pub fn len(&self) -> usize {
        match self {
            TaskArgs::Keyword(map) => map.len(),
            TaskArgs::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a parameter by keyword `name` or by `position`,
    /// whichever style the bundle was built with
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        match self {
            TaskArgs::Keyword(map) => map.get(name),
            TaskArgs::Positional(values) => values.get(position),
        }
    }

    /// Look up and deserialize a required parameter
    pub fn require<T: DeserializeOwned>(&self, position: usize, name: &str) -> anyhow::Result<T> {
        let value = self
            .get(position, name)
            .ok_or_else(|| anyhow::anyhow!("missing argument '{}' (position {})", name, position))?;
        serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("argument '{}' has the wrong type: {}", name, e))
    }

    /// Look up an optional parameter, falling back to `default` when absent
    pub fn optional<T: DeserializeOwned>(
        &self,
        position: usize,
        name: &str,
        default: T,
    ) -> anyhow::Result<T> {
        match self.get(position, name) {
            Some(_) => self.require(position, name),
            None => Ok(default),
        }
    }

    /// All argument values, in positional order or keyword insertion order
    pub fn values(&self) -> Vec<&Value> {
        match self {
            TaskArgs::Keyword(map) => map.values().collect(),
            TaskArgs::Positional(values) => values.iter().collect(),
        }
    }

    /// The bundle as a plain JSON value
    pub fn to_value(&self) -> Value {
        match self {
            TaskArgs::Keyword(map) => Value::Object(map.clone()),
            TaskArgs::Positional(values) => Value::Array(values.clone()),
        }
    }
}

impl From<Value> for TaskArgs {
    fn from(value: Value) -> Self {
        TaskArgs::from_value(value)
    }
}
