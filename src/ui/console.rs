//! Console frontend — stdin/stdout stand-in for the page, for headless runs.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{Error, UiError};
use crate::resources::Resource;
use crate::ui::frontend::{Frontend, FrontendRequest, RequestStream};
use crate::ui::sink::UiCall;

/// Reads `name arg...` lines from stdin and prints UI calls to stdout.
#[derive(Debug, Default)]
pub struct ConsoleFrontend {
    /// Functions the loaded page declares inline. When empty (nothing loaded,
    /// or handlers live in external scripts) every call is accepted.
    handlers: HashSet<String>,
}

impl ConsoleFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a call of `name` can be delivered to the loaded page.
    pub fn handles(&self, name: &str) -> bool {
        self.handlers.is_empty() || self.handlers.contains(name)
    }
}

#[async_trait]
impl Frontend for ConsoleFrontend {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&mut self) -> Result<RequestStream, UiError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_line(&line) {
                        Some(request) => {
                            let quit = request == FrontendRequest::Quit;
                            if tx.send(request).is_err() || quit {
                                break;
                            }
                        }
                        None => eprint!("> "),
                    },
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn load(&mut self, page: &Resource) -> Result<(), UiError> {
        self.handlers = page.declared_functions().into_iter().collect();
        let mut names: Vec<&str> = self.handlers.iter().map(String::as_str).collect();
        names.sort_unstable();
        eprintln!("📄 Loaded {} (handlers: {})", page.origin, names.join(", "));
        Ok(())
    }

    async fn invoke(&mut self, call: &UiCall) -> Result<(), UiError> {
        if !self.handles(&call.name) {
            return Err(UiError::HandlerNotFound {
                name: call.name.clone(),
            });
        }
        println!("\n{}\n", format_call(call));
        eprint!("> ");
        Ok(())
    }

    async fn report_error(&mut self, error: &Error) -> Result<(), UiError> {
        eprintln!("❌ {}", error);
        eprint!("> ");
        Ok(())
    }
}

/// Parse one input line. `None` for blank lines.
pub fn parse_line(line: &str) -> Option<FrontendRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/quit" {
        return Some(FrontendRequest::Quit);
    }
    let call = line
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            if i == 0 {
                Value::String(token.to_string())
            } else {
                serde_json::from_str(token).unwrap_or_else(|_| Value::String(token.to_string()))
            }
        })
        .collect();
    Some(FrontendRequest::Submit(call))
}

/// Render a call the way the page would see it: `name(arg, ...)`.
pub fn format_call(call: &UiCall) -> String {
    let args = call
        .args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", call.name, args)
}
