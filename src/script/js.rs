//! JavaScript engine — runs the worker script in a boa context owned by the worker thread.
//!
//! The script sees three globals: `console.log(...values)`, `ui.send(name, ...args)`
//! and `workerName`. Every global function it defines becomes a task.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::{
    Context, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source,
    js_string,
};
use serde_json::Value;
use tracing::debug;

use crate::error::ScriptError;
use crate::resources::Resource;
use crate::script::engine::{Console, ScriptBindings, ScriptEngine};
use crate::script::table::FunctionTable;
use crate::ui::UiSink;

/// Prefix of host hooks; never exported as tasks.
const HOST_PREFIX: &str = "__webshell_";

const PRELUDE: &str = r#"
globalThis.console = {
    log: function (...values) { __webshell_log(...values); }
};
globalThis.ui = {
    send: function (name, ...args) { __webshell_send(name, ...args); }
};
"#;

const EXPORTED_FUNCTIONS: &str = r#"
JSON.stringify(Object.keys(globalThis).filter(function (name) {
    return !name.startsWith("__webshell_") && typeof globalThis[name] === "function";
}))
"#;

/// Evaluates worker scripts with the boa JavaScript engine.
#[derive(Debug, Default, Clone)]
pub struct JsEngine;

impl JsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for JsEngine {
    fn name(&self) -> &str {
        "boa"
    }

    fn evaluate(
        &self,
        script: &Resource,
        bindings: ScriptBindings,
    ) -> Result<FunctionTable, ScriptError> {
        let mut context = Context::default();
        install_bindings(&mut context, &bindings).map_err(|e| evaluation_error(script, e))?;
        context
            .eval(Source::from_bytes(script.text.as_bytes()))
            .map_err(|e| evaluation_error(script, e))?;

        let names = exported_functions(&mut context).map_err(|e| evaluation_error(script, e))?;
        if names.is_empty() {
            return Err(ScriptError::Evaluation {
                script: script.origin.clone(),
                reason: "script defines no functions".to_string(),
            });
        }

        let context = Rc::new(RefCell::new(context));
        let mut table = FunctionTable::new();
        for name in names {
            let context = Rc::clone(&context);
            let function = name.clone();
            table.insert(name, move |args: &[Value]| {
                call_global(&mut context.borrow_mut(), &function, args)
            });
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

fn install_bindings(context: &mut Context, bindings: &ScriptBindings) -> JsResult<()> {
    context.register_global_callable(
        js_string!("__webshell_log"),
        0,
        log_function(bindings.console.clone()),
    )?;
    context.register_global_callable(
        js_string!("__webshell_send"),
        1,
        send_function(bindings.ui.clone()),
    )?;

    let worker = Value::String(bindings.worker.clone());
    let prelude = format!("{PRELUDE}\nvar workerName = {worker};\n");
    context.eval(Source::from_bytes(prelude.as_bytes()))?;
    Ok(())
}

fn log_function(console: Console) -> NativeFunction {
    // SAFETY: the closure captures no garbage-collected values.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            console.log(&to_json_args(args, context)?);
            Ok(JsValue::undefined())
        })
    }
}

fn send_function(ui: UiSink) -> NativeFunction {
    // SAFETY: the closure captures no garbage-collected values.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            let Some((name, rest)) = args.split_first() else {
                return Err(JsNativeError::typ()
                    .with_message("ui.send requires a function name")
                    .into());
            };
            let name = name.to_string(context)?.to_std_string_escaped();
            let rest = to_json_args(rest, context)?;
            ui.send(&name, rest)
                .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
            Ok(JsValue::undefined())
        })
    }
}

/// Names of the functions the script left on the global object.
fn exported_functions(context: &mut Context) -> JsResult<Vec<String>> {
    let listed = context.eval(Source::from_bytes(EXPORTED_FUNCTIONS.as_bytes()))?;
    let listed = listed.to_string(context)?.to_std_string_escaped();
    let names: Vec<String> = serde_json::from_str(&listed)
        .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
    Ok(names
        .into_iter()
        .filter(|name| !name.starts_with(HOST_PREFIX))
        .collect())
}

fn call_global(context: &mut Context, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
    match invoke(context, name, args) {
        Ok(result) => Ok(result),
        Err(e) => Err(ScriptError::Failed {
            function: name.to_string(),
            reason: describe(e, context),
        }),
    }
}

fn invoke(context: &mut Context, name: &str, args: &[Value]) -> JsResult<Value> {
    let value = context.global_object().get(JsString::from(name), context)?;
    let Some(function) = value.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message(format!("{name} is no longer a function"))
            .into());
    };

    let js_args = args
        .iter()
        .map(|arg| JsValue::from_json(arg, context))
        .collect::<JsResult<Vec<_>>>()?;
    let result = function.call(&JsValue::undefined(), &js_args, context)?;

    // Results that have no JSON form (functions, symbols) come back as null.
    Ok(result.to_json(context).ok().flatten().unwrap_or(Value::Null))
}

/// Render a thrown value as `Kind: message` when it is an error object.
fn describe(error: JsError, context: &mut Context) -> String {
    match error.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => error.to_string(),
    }
}

fn to_json_args(args: &[JsValue], context: &mut Context) -> JsResult<Vec<Value>> {
    args.iter()
        .map(|arg| Ok(arg.to_json(context)?.unwrap_or(Value::Null)))
        .collect()
}

fn evaluation_error(script: &Resource, error: JsError) -> ScriptError {
    ScriptError::Evaluation {
        script: script.origin.clone(),
        reason: error.to_string(),
    }
}
