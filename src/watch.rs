//! Dev-mode watcher — reloads the shell when the web folder changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::ResourceError;
use crate::lifecycle::Lifecycle;

/// Keeps the file watcher alive alongside its reload task.
pub struct DevWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl DevWatch {
    /// Stop watching.
    pub fn abort(self) {
        self.task.abort();
    }
}

/// Whether an event should trigger a reload.
pub fn is_reload_event(kind: &EventKind) -> bool {
    kind.is_create() || kind.is_modify() || kind.is_remove()
}

/// Watch `dir` recursively and call `controller.reload()` after each burst of changes.
pub fn spawn_reload_task(
    controller: Arc<Lifecycle>,
    dir: &Path,
    debounce: Duration,
) -> Result<DevWatch, ResourceError> {
    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        match res {
            Ok(event) if is_reload_event(&event.kind) => {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => error!("File watch error: {}", e),
        }
    })?;
    watcher.watch(dir, RecursiveMode::Recursive)?;

    info!(dir = %dir.display(), "In dev mode, watching for changes");
    let task = tokio::spawn(reload_on_change(controller, rx, debounce));

    Ok(DevWatch {
        _watcher: watcher,
        task,
    })
}

async fn reload_on_change(
    controller: Arc<Lifecycle>,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
) {
    while let Some(first) = changes.recv().await {
        let batch = collect_burst(first, &mut changes, debounce).await;
        debug!(changed = ?batch, "Web folder changed");
        if let Err(e) = controller.reload().await {
            error!("Reload failed: {}", e);
        }
    }
}

/// Wait out the debounce window and drain whatever else arrived during it.
async fn collect_burst(
    first: PathBuf,
    changes: &mut mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
) -> Vec<PathBuf> {
    tokio::time::sleep(debounce).await;
    let mut batch = vec![first];
    while let Ok(path) = changes.try_recv() {
        if !batch.contains(&path) {
            batch.push(path);
        }
    }
    batch
}
