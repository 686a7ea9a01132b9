//! Task value submitted by the front end.

use serde_json::Value;

use crate::error::TaskError;

/// A named unit of work with positional arguments.
///
/// Immutable once built; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: String,
    args: Vec<Value>,
}

impl Task {
    /// Build a task, rejecting an empty name.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Result<Self, TaskError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TaskError::MissingName);
        }
        Ok(Self { name, args })
    }

    /// Build a task from the variadic call form `[name, arg1, arg2, ...]`.
    pub fn from_call(call: Vec<Value>) -> Result<Self, TaskError> {
        let mut parts = call.into_iter();
        let name = parts.next().ok_or(TaskError::MissingName)?;
        Self::new(call_name(&name), parts.collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.name, self.args)
    }
}

/// Render the leading element of a variadic call as a function name.
pub(crate) fn call_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
