//! Task queue — unbounded multi-producer, multi-consumer FIFO shared by a pool's workers.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use super::task::Task;

/// Outcome of waiting on the queue.
#[derive(Debug)]
pub enum Next {
    Task(Task),
    /// The poll interval elapsed with nothing to do.
    Timeout,
    /// The shutdown signal fired.
    Cancelled,
}

/// Blocking FIFO of tasks.
///
/// Holds both channel halves, so the channel never disconnects while the queue
/// is alive and `enqueue` cannot fail.
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl TaskQueue {
    /// Create a new task queue.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        Arc::new(Self { tx, rx })
    }

    /// Append a task to the tail. Never blocks.
    pub fn enqueue(&self, task: Task) {
        debug!(task = %task.name(), "Task queued");
        let _ = self.tx.send(task);
    }

    /// Wait up to `timeout` for the next task.
    pub fn dequeue(&self, timeout: Duration) -> Option<Task> {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next task, waking early if `shutdown` fires.
    pub fn next(&self, timeout: Duration, shutdown: &ShutdownSignal) -> Next {
        if shutdown.is_triggered() {
            return Next::Cancelled;
        }
        crossbeam_channel::select! {
            recv(self.rx) -> task => match task {
                Ok(task) => Next::Task(task),
                Err(_) => Next::Cancelled,
            },
            recv(shutdown.rx) -> _ => Next::Cancelled,
            default(timeout) => Next::Timeout,
        }
    }

    /// Discard every queued task. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// One-shot cancellation signal observed by every blocking queue wait.
///
/// Triggering drops the only sender, which disconnects the channel and wakes
/// every receiver parked in [`TaskQueue::next`].
pub struct ShutdownSignal {
    triggered: AtomicBool,
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Arc::new(Self {
            triggered: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            rx,
        })
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.tx.lock() {
            Ok(mut tx) => drop(tx.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
