//! Web shell — a UI page driven by a pool of script workers.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod package;
pub mod resources;
pub mod script;
pub mod tasks;
pub mod ui;
pub mod watch;
pub mod worker;
