//! Worker pool — fixed set of worker threads draining one task queue.
//!
//! Every worker evaluates the script itself, so each function table lives and
//! dies on the thread that created it. Only tasks and UI calls cross threads.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, PoolError};
use crate::resources::Resource;
use crate::script::{ScriptBindings, ScriptEngine};
use crate::tasks::{ShutdownSignal, Task, TaskQueue};
use crate::ui::UiSink;
use crate::worker::context::{PoolStats, WorkerContext};

/// Thread name prefix; workers are `worker-pool-1`, `worker-pool-2`, ...
pub const WORKER_NAME_PREFIX: &str = "worker-pool";

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    /// Upper bound on how long a worker waits before re-checking for shutdown.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::config::default_worker_count(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// A running set of workers. Once stopped it is never restarted.
pub struct WorkerPool {
    generation: u64,
    worker_count: usize,
    queue: Arc<TaskQueue>,
    shutdown: Arc<ShutdownSignal>,
    stats: Arc<PoolStats>,
    /// Held shared by `enqueue` and exclusively by `stop`, so no task can land
    /// on the queue between the signal firing and the queue being cleared.
    gate: RwLock<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn the workers and wait until every one has evaluated `script`.
    ///
    /// Blocks the caller for the duration of script evaluation. If any worker
    /// fails to evaluate the script the whole pool is shut down.
    pub fn start(
        config: &PoolConfig,
        generation: u64,
        engine: Arc<dyn ScriptEngine>,
        script: Arc<Resource>,
        ui: &UiSink,
    ) -> Result<Self, PoolError> {
        let worker_count = config.worker_count.max(1);
        let pool = Self {
            generation,
            worker_count,
            queue: TaskQueue::new(),
            shutdown: ShutdownSignal::new(),
            stats: Arc::new(PoolStats::default()),
            gate: RwLock::new(()),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(worker_count);
        for index in 1..=worker_count {
            let name = format!("{WORKER_NAME_PREFIX}-{index}");
            let ctx = WorkerContext {
                name: name.clone(),
                generation,
                queue: Arc::clone(&pool.queue),
                shutdown: Arc::clone(&pool.shutdown),
                stats: Arc::clone(&pool.stats),
                poll_interval: config.poll_interval,
            };
            let bindings = ScriptBindings::new(name.clone(), ui.for_worker(name.clone(), generation));
            let engine = Arc::clone(&engine);
            let script = Arc::clone(&script);
            let ready_tx = ready_tx.clone();

            let handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || match engine.evaluate(&script, bindings) {
                    Ok(table) => {
                        let _ = ready_tx.send((ctx.name.clone(), Ok(())));
                        drop(ready_tx);
                        ctx.run(table);
                    }
                    Err(e) => {
                        let _ = ready_tx.send((ctx.name.clone(), Err(e)));
                    }
                })
                .map_err(|e| {
                    pool.shutdown.trigger();
                    PoolError::Spawn(e)
                })?;
            pool.push_handle(handle);
        }
        drop(ready_tx);

        for _ in 0..worker_count {
            match ready_rx.recv() {
                Ok((_, Ok(()))) => {}
                Ok((worker, Err(e))) => {
                    pool.shutdown.trigger();
                    return Err(PoolError::Startup {
                        worker,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    pool.shutdown.trigger();
                    return Err(PoolError::Startup {
                        worker: WORKER_NAME_PREFIX.to_string(),
                        reason: "worker exited before reporting readiness".to_string(),
                    });
                }
            }
        }

        info!(
            generation,
            workers = worker_count,
            engine = engine.name(),
            script = %script.origin,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Queue `name(args...)` for some worker.
    pub fn add(&self, name: &str, args: Vec<Value>) -> Result<(), Error> {
        self.enqueue(Task::new(name, args)?)
    }

    /// Queue a task in the variadic call form `[name, arg1, ...]`.
    pub fn submit(&self, call: Vec<Value>) -> Result<(), Error> {
        self.enqueue(Task::from_call(call)?)
    }

    fn enqueue(&self, task: Task) -> Result<(), Error> {
        let _open = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_stopped() {
            return Err(PoolError::Stopped.into());
        }
        self.queue.enqueue(task);
        Ok(())
    }

    /// Stop pulling tasks and discard the queue. In-flight tasks run to completion.
    pub fn stop(&self) {
        let _closed = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        if self.shutdown.trigger() {
            let discarded = self.queue.clear();
            info!(generation = self.generation, discarded, "Worker pool stopped");
        }
    }

    /// Stop, then wait for every worker thread to exit.
    pub fn join(&self) {
        self.stop();
        let handles = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            let name = handle.thread().name().unwrap_or_default().to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "Worker thread panicked");
            }
        }
        debug!(generation = self.generation, "Worker pool joined");
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_triggered()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    fn push_handle(&self, handle: JoinHandle<()>) {
        match self.workers.lock() {
            Ok(mut workers) => workers.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
