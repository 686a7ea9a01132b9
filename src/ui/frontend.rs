//! Frontend abstraction — the surface that renders the page and submits work.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::{Error, UiError};
use crate::resources::Resource;
use crate::ui::sink::UiCall;

/// Requests coming from the page.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendRequest {
    /// `tasks.add(name, ...args)`, in the variadic form `[name, arg1, ...]`.
    Submit(Vec<Value>),
    /// The user closed the surface.
    Quit,
}

/// Stream of requests from a frontend.
pub type RequestStream = Pin<Box<dyn Stream<Item = FrontendRequest> + Send>>;

/// A rendering surface driven exclusively by the UI event loop.
#[async_trait]
pub trait Frontend: Send {
    /// Frontend name, for logs.
    fn name(&self) -> &str;

    /// Begin accepting input. Called once, before the first `load`.
    async fn start(&mut self) -> Result<RequestStream, UiError>;

    /// Load or reload the page.
    async fn load(&mut self, page: &Resource) -> Result<(), UiError>;

    /// Call a page-level function.
    async fn invoke(&mut self, call: &UiCall) -> Result<(), UiError>;

    /// Tell the user that one of their requests was rejected.
    async fn report_error(&mut self, error: &Error) -> Result<(), UiError>;

    /// Release the surface.
    async fn shutdown(&mut self) -> Result<(), UiError> {
        Ok(())
    }
}
