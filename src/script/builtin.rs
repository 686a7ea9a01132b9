//! Built-in natives available to every worker script.

use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::error::ScriptError;
use crate::script::engine::ScriptBindings;
use crate::script::native::NativeEngine;

/// UI function `doWork` reports back to.
pub const WORK_DONE: &str = "workDone";

/// Register the built-ins on `engine`.
pub fn register_all(engine: &mut NativeEngine) {
    engine.register("doWork", do_work);
    engine.register("log", log);
}

/// `doWork(seconds)` — keep a core busy for `seconds`, then call
/// `workDone("work finished", seconds, <worker>)` on the UI.
pub fn do_work(bindings: &ScriptBindings, args: &[Value]) -> Result<Value, ScriptError> {
    let seconds = seconds_arg(args.first())?;
    bindings
        .console
        .log(&[json!(format!("working for {seconds} seconds"))]);

    let finish = Instant::now()
        .checked_add(Duration::from_secs(seconds))
        .ok_or_else(|| ScriptError::InvalidArgument {
            function: "doWork".to_string(),
            reason: format!("{seconds} seconds is too long"),
        })?;
    let mut result = 0.0_f64;
    while Instant::now() <= finish {
        result += rand::random::<f64>() * rand::random::<f64>();
    }

    bindings.ui.send(
        WORK_DONE,
        vec![json!("work finished"), json!(seconds), json!(bindings.worker)],
    )?;
    Ok(json!(result))
}

/// `log(...values)` — write the values to the console sink.
pub fn log(bindings: &ScriptBindings, args: &[Value]) -> Result<Value, ScriptError> {
    bindings.console.log(args);
    Ok(Value::Null)
}

/// Accept a non-negative integer or a string that starts with one.
fn seconds_arg(value: Option<&Value>) -> Result<u64, ScriptError> {
    let invalid = |reason: String| ScriptError::InvalidArgument {
        function: "doWork".to_string(),
        reason,
    };
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| invalid(format!("seconds must be non-negative, got {n}"))),
        Some(Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits
                .parse()
                .map_err(|_| invalid(format!("seconds is not a number: {s:?}")))
        }
        Some(other) => Err(invalid(format!("seconds is not a number: {other}"))),
        None => Err(invalid("seconds is required".to_string())),
    }
}
