//! Lifecycle controller — owns the current worker pool and swaps it on reload.
//!
//! Each pool owns its queue. `stop()` discards queued tasks and a stopped pool
//! rejects new ones, so between `stop()` and the next `reload()` submissions
//! fail with [`PoolError::Stopped`]. After `reload()` every submission goes
//! to the new pool; tasks still running in the old pool finish on their own
//! and their UI calls arrive tagged with the old generation.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::error::{Error, PoolError};
use crate::resources::{Resource, ResourceLocator, UI_PAGE, WORKER_SCRIPT};
use crate::script::ScriptEngine;
use crate::ui::UiSink;
use crate::worker::{PoolConfig, PoolStats, WorkerPool};

struct State {
    pool: Option<WorkerPool>,
    page: Arc<Resource>,
    generation: u64,
}

/// Starts, stops and reloads the worker pool.
pub struct Lifecycle {
    pool_config: PoolConfig,
    locator: ResourceLocator,
    engine: Arc<dyn ScriptEngine>,
    ui: UiSink,
    state: RwLock<State>,
}

impl Lifecycle {
    /// Load `worker.js` and `ui.html` and start the first pool generation.
    ///
    /// A missing resource or a script that fails to evaluate is fatal.
    pub async fn start(
        config: &ShellConfig,
        locator: ResourceLocator,
        engine: Arc<dyn ScriptEngine>,
        ui: UiSink,
    ) -> Result<Arc<Self>, Error> {
        let pool_config = config.pool_config();
        let generation = 1;
        let (pool, page) = launch(&pool_config, &locator, &engine, &ui, generation).await?;

        info!(
            generation,
            workers = pool.worker_count(),
            dev_mode = locator.is_dev(),
            "Shell started"
        );

        Ok(Arc::new(Self {
            pool_config,
            locator,
            engine,
            ui,
            state: RwLock::new(State {
                pool: Some(pool),
                page,
                generation,
            }),
        }))
    }

    /// Queue `name(args...)` on the current pool.
    pub async fn add(&self, name: &str, args: Vec<Value>) -> Result<(), Error> {
        let state = self.state.read().await;
        state.pool.as_ref().ok_or(PoolError::Stopped)?.add(name, args)
    }

    /// Queue a task in the variadic form `[name, arg1, ...]` on the current pool.
    pub async fn submit(&self, call: Vec<Value>) -> Result<(), Error> {
        let state = self.state.read().await;
        state.pool.as_ref().ok_or(PoolError::Stopped)?.submit(call)
    }

    /// Stop the current pool, reload resources, start the next generation and
    /// ask the UI to reload its page. Returns the new generation.
    ///
    /// On failure the controller is left without a pool until a later reload succeeds.
    pub async fn reload(&self) -> Result<u64, Error> {
        let mut state = self.state.write().await;
        if let Some(old) = state.pool.take() {
            old.stop();
        }
        state.generation += 1;
        let generation = state.generation;

        let (pool, page) =
            match launch(&self.pool_config, &self.locator, &self.engine, &self.ui, generation).await
            {
                Ok(launched) => launched,
                Err(e) => {
                    warn!(generation, "Reload failed: {}", e);
                    return Err(e);
                }
            };
        state.pool = Some(pool);
        state.page = page;
        drop(state);

        if let Err(e) = self.ui.request_reload() {
            debug!("Page reload not requested: {}", e);
        }
        info!(generation, "Reloaded");
        Ok(generation)
    }

    /// Stop the current pool without starting another.
    pub async fn stop(&self) {
        if let Some(pool) = self.state.write().await.pool.take() {
            pool.stop();
        }
    }

    /// Stop the current pool and wait for its workers to finish in-flight tasks.
    pub async fn shutdown(&self) {
        let pool = self.state.write().await.pool.take();
        if let Some(pool) = pool {
            if let Err(e) = tokio::task::spawn_blocking(move || pool.join()).await {
                warn!("Worker pool join failed: {}", e);
            }
        }
    }

    /// The page currently loaded.
    pub async fn page(&self) -> Arc<Resource> {
        Arc::clone(&self.state.read().await.page)
    }

    /// Generation of the live pool, if one is running.
    pub async fn generation(&self) -> Option<u64> {
        let state = self.state.read().await;
        state.pool.as_ref().map(WorkerPool::generation)
    }

    /// Most recent generation number, running or not.
    pub async fn current_generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Counters of the live pool.
    pub async fn stats(&self) -> Option<Arc<PoolStats>> {
        let state = self.state.read().await;
        state.pool.as_ref().map(|pool| Arc::clone(pool.stats()))
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// A sink for calls that originate outside the workers.
    pub fn ui(&self) -> &UiSink {
        &self.ui
    }
}

/// Load resources and start a pool off the async runtime.
async fn launch(
    pool_config: &PoolConfig,
    locator: &ResourceLocator,
    engine: &Arc<dyn ScriptEngine>,
    ui: &UiSink,
    generation: u64,
) -> Result<(WorkerPool, Arc<Resource>), Error> {
    let pool_config = pool_config.clone();
    let locator = locator.clone();
    let engine = Arc::clone(engine);
    let ui = ui.clone();

    tokio::task::spawn_blocking(move || -> Result<(WorkerPool, Arc<Resource>), Error> {
        let script = Arc::new(locator.load(WORKER_SCRIPT)?);
        let page = Arc::new(locator.load(UI_PAGE)?);
        let pool = WorkerPool::start(&pool_config, generation, engine, script, &ui)?;
        Ok((pool, page))
    })
    .await
    .map_err(|e| {
        Error::Pool(PoolError::Startup {
            worker: "launcher".to_string(),
            reason: e.to_string(),
        })
    })?
}
