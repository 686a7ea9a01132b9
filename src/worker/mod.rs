//! Worker system — a fixed pool of threads executing queued tasks.
//!
//! Core components:
//! - `pool` — WorkerPool: spawns workers, accepts tasks, stops and joins
//! - `context` — per-thread pull/execute loop and shared PoolStats

pub mod context;
pub mod pool;

pub use context::PoolStats;
pub use pool::{PoolConfig, WORKER_NAME_PREFIX, WorkerPool};
