//! Error types for the web shell.

use std::path::PathBuf;

/// Top-level error type for the shell.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("UI error: {0}")]
    Ui(#[from] UiError),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors locating or reading the bundled web resources.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Missing required resource {name}. {hint}")]
    Missing { name: String, hint: String },

    #[error("No web resources found: neither {web_dir} nor bundle {bundle} exists")]
    NoSource { web_dir: PathBuf, bundle: String },

    #[error("Resource {name} is not valid UTF-8")]
    Encoding { name: String },

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while evaluating a worker script or running one of its functions.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Unable to evaluate script {script}: {reason}")]
    Evaluation { script: String, reason: String },

    #[error("Script {script} declares {name} but no native binding exists for it")]
    Unbound { script: String, name: String },

    #[error("Invalid argument for {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("{function} failed: {reason}")]
    Failed { function: String, reason: String },

    #[error("UI send failed: {0}")]
    Ui(#[from] UiError),
}

/// Task submission and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Arguments needed: a task name is required")]
    MissingName,

    #[error("Function not found: {name}")]
    NotFound { name: String },

    #[error("Task {name} failed: {reason}")]
    Execution { name: String, reason: String },
}

/// Worker pool lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is stopped")]
    Stopped,

    #[error("Worker {worker} failed to start: {reason}")]
    Startup { worker: String, reason: String },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// UI dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("Arguments needed: a UI function name is required")]
    MissingName,

    #[error("UI event loop is closed")]
    Closed,

    #[error("UI function not found: {name}")]
    HandlerNotFound { name: String },

    #[error("Frontend {name} failed: {reason}")]
    Frontend { name: String, reason: String },
}

/// Bundle packaging errors.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("No '{}' folder to package", path.display())]
    NoLocalFolder { path: PathBuf },

    #[error("package and unpackage are only supported when running from a bundle")]
    NotPackaged,

    #[error("There's already a '{}' folder", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the shell.
pub type Result<T> = std::result::Result<T, Error>;
