//! UI side — dispatch sink, frontend abstraction and the UI event loop.

pub mod console;
pub mod event_loop;
pub mod frontend;
pub mod sink;

pub use console::ConsoleFrontend;
pub use event_loop::UiLoop;
pub use frontend::{Frontend, FrontendRequest, RequestStream};
pub use sink::{CallOrigin, UiCall, UiEvent, UiSink};
