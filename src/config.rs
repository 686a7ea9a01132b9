//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::resources::is_bundle;
use crate::worker::PoolConfig;

/// Default name of the local resource folder (dev mode).
pub const DEFAULT_WEB_DIR: &str = "web";

/// File extension of the bundle archive that sits next to the executable.
pub const BUNDLE_EXTENSION: &str = "bundle";

/// Shell configuration.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Local resource folder. When it exists the shell runs in dev mode.
    pub web_dir: PathBuf,
    /// Explicit bundle archive. Falls back to the executable, then `<executable>.bundle`.
    pub bundle: Option<PathBuf>,
    /// Number of worker threads.
    pub worker_count: usize,
    /// How long a worker waits on the queue before re-checking for shutdown.
    pub poll_interval: Duration,
    /// Quiet period after a file change before reloading.
    pub reload_debounce: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            web_dir: PathBuf::from(DEFAULT_WEB_DIR),
            bundle: None,
            worker_count: default_worker_count(),
            poll_interval: Duration::from_secs(5),
            reload_debounce: Duration::from_millis(50),
        }
    }
}

impl ShellConfig {
    /// Build a configuration from `WEBSHELL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let web_dir = std::env::var("WEBSHELL_WEB_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.web_dir);

        let bundle = std::env::var("WEBSHELL_BUNDLE").ok().map(PathBuf::from);

        let worker_count = match env_number("WEBSHELL_WORKERS")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "WEBSHELL_WORKERS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            Some(n) => n as usize,
            None => defaults.worker_count,
        };

        let poll_interval = env_number("WEBSHELL_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let reload_debounce = env_number("WEBSHELL_RELOAD_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.reload_debounce);

        Ok(Self {
            web_dir,
            bundle,
            worker_count,
            poll_interval,
            reload_debounce,
        })
    }

    /// Where a bundle may live, in lookup order: the explicit bundle if one is
    /// configured, otherwise the executable itself and then `<executable>.bundle`.
    pub fn bundle_candidates(&self) -> Vec<PathBuf> {
        if let Some(bundle) = &self.bundle {
            return vec![bundle.clone()];
        }
        match std::env::current_exe() {
            Ok(exe) => {
                let sidecar = exe.with_extension(BUNDLE_EXTENSION);
                vec![exe, sidecar]
            }
            Err(_) => Vec::new(),
        }
    }

    /// The first candidate that actually holds a bundle.
    pub fn bundle_path(&self) -> Option<PathBuf> {
        self.bundle_candidates()
            .into_iter()
            .find(|path| is_bundle(path))
    }

    /// Worker pool settings derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.worker_count,
            poll_interval: self.poll_interval,
        }
    }
}

/// One worker per core, leaving a core for the UI, and never fewer than one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

fn env_number(key: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?} is not a number: {e}"),
            }),
        Err(_) => Ok(None),
    }
}
