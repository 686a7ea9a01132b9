//! Native engine — binds the functions a worker script declares to Rust implementations.
//!
//! Function bodies are ignored: the script text only decides *which*
//! functions a worker exports, and the host decides what they do. Tests use
//! it to drive pools with deterministic Rust functions; real scripts go
//! through [`JsEngine`](crate::script::JsEngine).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ScriptError;
use crate::resources::Resource;
use crate::script::builtin;
use crate::script::engine::{ScriptBindings, ScriptEngine};
use crate::script::table::FunctionTable;

/// Host implementation of a script function.
pub type NativeFn = Arc<dyn Fn(&ScriptBindings, &[Value]) -> Result<Value, ScriptError> + Send + Sync>;

/// Registry of native functions a script may declare.
#[derive(Default)]
pub struct NativeEngine {
    natives: HashMap<String, NativeFn>,
}

impl NativeEngine {
    /// An engine with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with the built-in bindings registered.
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        builtin::register_all(&mut engine);
        engine
    }

    /// Bind `name` to a native implementation, replacing any previous binding.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&ScriptBindings, &[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registered native: {}", name);
        self.natives.insert(name, Arc::new(function));
    }

    pub fn has(&self, name: &str) -> bool {
        self.natives.contains_key(name)
    }

    /// Registered native names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.natives.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ScriptEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn evaluate(
        &self,
        script: &Resource,
        bindings: ScriptBindings,
    ) -> Result<FunctionTable, ScriptError> {
        let declared = script.declared_functions();
        if declared.is_empty() {
            return Err(ScriptError::Evaluation {
                script: script.origin.clone(),
                reason: "script declares no functions".to_string(),
            });
        }

        let mut table = FunctionTable::new();
        for name in declared {
            let native = self
                .natives
                .get(&name)
                .cloned()
                .ok_or_else(|| ScriptError::Unbound {
                    script: script.origin.clone(),
                    name: name.clone(),
                })?;
            let bindings = bindings.clone();
            table.insert(name, move |args: &[Value]| native(&bindings, args));
        }

        debug!(
            worker = %bindings.worker,
            functions = ?table.names(),
            "Evaluated {}",
            script.name
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::ui::UiSink;
    use serde_json::json;

    fn engine() -> NativeEngine {
        let mut engine = NativeEngine::new();
        engine.register("double", |_: &ScriptBindings, args: &[Value]| {
            Ok(json!(args[0].as_i64().unwrap_or_default() * 2))
        });
        engine.register("whoami", |bindings: &ScriptBindings, _: &[Value]| {
            Ok(json!(bindings.worker))
        });
        engine
    }

    fn bindings() -> ScriptBindings {
        let (ui, _rx) = UiSink::channel();
        ScriptBindings::new("worker-pool-1", ui)
    }

    #[test]
    fn exports_only_declared_functions() {
        let script = Resource::new("worker.js", "test", "function double(x) {}\n");
        let table = engine().evaluate(&script, bindings()).unwrap();

        assert_eq!(table.names(), vec!["double"]);
        assert_eq!(table.call("double", &[json!(21)]).unwrap(), json!(42));
        assert!(matches!(
            table.call("whoami", &[]),
            Err(TaskError::NotFound { .. })
        ));
    }

    #[test]
    fn functions_see_their_bindings() {
        let script = Resource::new("worker.js", "test", "function whoami() {}\n");
        let table = engine().evaluate(&script, bindings()).unwrap();
        assert_eq!(table.call("whoami", &[]).unwrap(), json!("worker-pool-1"));
    }

    #[test]
    fn unbound_declaration_fails_evaluation() {
        let script = Resource::new("worker.js", "test", "function double(x) {}\nfunction nope() {}\n");
        let err = engine().evaluate(&script, bindings()).unwrap_err();
        assert!(matches!(err, ScriptError::Unbound { ref name, .. } if name == "nope"));
    }

    #[test]
    fn empty_script_fails_evaluation() {
        let script = Resource::new("worker.js", "test", "// nothing here\n");
        assert!(matches!(
            engine().evaluate(&script, bindings()),
            Err(ScriptError::Evaluation { .. })
        ));
    }

    #[test]
    fn builtins_are_registered() {
        let engine = NativeEngine::with_builtins();
        assert!(engine.has("doWork"));
        assert!(engine.has("log"));
    }
}
