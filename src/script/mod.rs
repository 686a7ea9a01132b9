//! Worker scripts — evaluation, function tables and native bindings.

pub mod builtin;
pub mod engine;
pub mod js;
pub mod native;
pub mod table;

pub use engine::{Console, ScriptBindings, ScriptEngine};
pub use js::JsEngine;
pub use native::{NativeEngine, NativeFn};
pub use table::{FunctionTable, ScriptFn};
