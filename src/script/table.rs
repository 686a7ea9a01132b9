//! Function table — the callable surface of one evaluated worker script.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{ScriptError, TaskError};

/// A callable exported by a worker script.
pub type ScriptFn = Box<dyn Fn(&[Value]) -> Result<Value, ScriptError>>;

/// Name → callable map, owned by exactly one worker.
///
/// Deliberately not `Send`: a table stays on the thread that evaluated it.
#[derive(Default)]
pub struct FunctionTable {
    functions: HashMap<String, ScriptFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Returns `true` if it replaced an existing one.
    pub fn insert<F>(&mut self, name: impl Into<String>, function: F) -> bool
    where
        F: Fn(&[Value]) -> Result<Value, ScriptError> + 'static,
    {
        self.functions
            .insert(name.into(), Box::new(function))
            .is_some()
    }

    /// Look up a function by exact name.
    pub fn get(&self, name: &str) -> Result<&ScriptFn, TaskError> {
        self.functions.get(name).ok_or_else(|| TaskError::NotFound {
            name: name.to_string(),
        })
    }

    /// Look up and invoke `name` with `args`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, TaskError> {
        let function = self.get(name)?;
        function(args).map_err(|e| TaskError::Execution {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Function names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> FunctionTable {
        let mut table = FunctionTable::new();
        table.insert("sum", |args: &[Value]| {
            Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        });
        table.insert("fail", |_: &[Value]| {
            Err(ScriptError::Failed {
                function: "fail".to_string(),
                reason: "boom".to_string(),
            })
        });
        table
    }

    #[test]
    fn call_invokes_by_exact_name() {
        let table = table();
        assert_eq!(table.call("sum", &[json!(2), json!(3)]).unwrap(), json!(5));
        assert!(matches!(
            table.call("Sum", &[]),
            Err(TaskError::NotFound { ref name }) if name == "Sum"
        ));
    }

    #[test]
    fn execution_errors_name_the_task() {
        let err = table().call("fail", &[]).unwrap_err();
        match err {
            TaskError::Execution { name, reason } => {
                assert_eq!(name, "fail");
                assert!(reason.contains("boom"));
            }
            other => panic!("Expected Execution, got {other:?}"),
        }
    }

    #[test]
    fn insert_reports_replacement() {
        let mut table = table();
        assert_eq!(table.names(), vec!["fail", "sum"]);
        assert!(table.insert("sum", |_: &[Value]| Ok(Value::Null)));
        assert!(!table.insert("new", |_: &[Value]| Ok(Value::Null)));
        assert_eq!(table.len(), 3);
        assert_eq!(table.call("sum", &[json!(1)]).unwrap(), Value::Null);
    }
}
