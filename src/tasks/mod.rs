//! Tasks and the queue workers pull them from.

pub mod queue;
pub mod task;

pub use queue::{Next, ShutdownSignal, TaskQueue};
pub use task::Task;
