//! Per-thread worker context — the pull/execute loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::error::TaskError;
use crate::script::FunctionTable;
use crate::tasks::{Next, ShutdownSignal, Task, TaskQueue};

/// Counters shared by every worker of one pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl PoolStats {
    /// Tasks that ran to completion.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Tasks dropped because of a lookup, execution or panic failure.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Tasks executing right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of tasks ever executing at once.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
    }

    fn end(&self, ok: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if ok {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Everything one worker thread owns besides its function table.
pub(crate) struct WorkerContext {
    pub name: String,
    pub generation: u64,
    pub queue: Arc<TaskQueue>,
    pub shutdown: Arc<ShutdownSignal>,
    pub stats: Arc<PoolStats>,
    pub poll_interval: Duration,
}

impl WorkerContext {
    /// Pull and execute tasks until the pool shuts down.
    pub fn run(self, table: FunctionTable) {
        info!(worker = %self.name, generation = self.generation, "Worker started");

        loop {
            match self.queue.next(self.poll_interval, &self.shutdown) {
                Next::Task(task) => {
                    if self.shutdown.is_triggered() {
                        debug!(worker = %self.name, task = %task.name(), "Discarding task after stop");
                        break;
                    }
                    self.execute(&table, task);
                }
                Next::Timeout => trace!(worker = %self.name, "Idle"),
                Next::Cancelled => break,
            }
        }

        info!(worker = %self.name, generation = self.generation, "Worker stopped");
    }

    /// Run one task. Failures are logged and the task is dropped.
    fn execute(&self, table: &FunctionTable, task: Task) {
        let start = Instant::now();
        self.stats.begin();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            table.call(task.name(), task.args())
        }));

        let ok = match outcome {
            Ok(Ok(result)) => {
                debug!(
                    worker = %self.name,
                    task = %task.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    %result,
                    "Task completed"
                );
                true
            }
            Ok(Err(e @ TaskError::NotFound { .. })) => {
                warn!(worker = %self.name, task = %task.name(), "{}", e);
                false
            }
            Ok(Err(e)) => {
                error!(worker = %self.name, task = %task.name(), "{}", e);
                false
            }
            Err(payload) => {
                error!(
                    worker = %self.name,
                    task = %task.name(),
                    "Task panicked: {}",
                    panic_message(payload.as_ref())
                );
                false
            }
        };

        self.stats.end(ok);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
