//! Script engine abstraction and the bindings a worker script can reach.

use serde_json::Value;

use crate::error::ScriptError;
use crate::resources::Resource;
use crate::script::table::FunctionTable;
use crate::ui::UiSink;

/// Turns a worker script into a function table.
///
/// `evaluate` runs on the worker thread that will own the table, once per
/// worker and once per reload. Implementations are shared across threads; the
/// tables they produce are not.
pub trait ScriptEngine: Send + Sync {
    /// Engine name, for logs.
    fn name(&self) -> &str;

    /// Evaluate `script` with `bindings` in scope.
    fn evaluate(
        &self,
        script: &Resource,
        bindings: ScriptBindings,
    ) -> Result<FunctionTable, ScriptError>;
}

/// Globals visible to a worker script.
#[derive(Debug, Clone)]
pub struct ScriptBindings {
    /// `console.log` sink.
    pub console: Console,
    /// `ui.send` sink, stamped with this worker's origin.
    pub ui: UiSink,
    /// Name of the worker thread evaluating the script.
    pub worker: String,
}

impl ScriptBindings {
    pub fn new(worker: impl Into<String>, ui: UiSink) -> Self {
        let worker = worker.into();
        Self {
            console: Console::new(worker.clone()),
            ui,
            worker,
        }
    }
}

/// `console.log` for worker scripts, forwarded to tracing.
#[derive(Debug, Clone)]
pub struct Console {
    worker: String,
}

impl Console {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
        }
    }

    pub fn log(&self, values: &[Value]) {
        tracing::info!(target: "console", worker = %self.worker, "{}", format_values(values));
    }
}

/// Join values the way `console.log` prints them: strings bare, everything else as JSON.
pub fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
