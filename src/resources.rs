//! Web resources — `worker.js` and `ui.html` from a dev folder or a bundle archive.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ShellConfig;
use crate::error::ResourceError;

/// Script evaluated once by every worker.
pub const WORKER_SCRIPT: &str = "worker.js";

/// Page loaded by the frontend.
pub const UI_PAGE: &str = "ui.html";

/// Folder prefix of web resources inside a bundle archive.
pub const BUNDLE_WEB_PREFIX: &str = "web/";

static FUNCTION_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(")
        .expect("function declaration pattern is valid")
});

/// A loaded text resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// File name, e.g. `worker.js`.
    pub name: String,
    /// Where it was loaded from, for diagnostics.
    pub origin: String,
    pub text: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            text: text.into(),
        }
    }

    /// Names of top-level `function name(...)` declarations, in source order, deduplicated.
    pub fn declared_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in FUNCTION_DECLARATION.captures_iter(&self.text) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// Where web resources are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    /// A local folder; the shell watches it and reloads on change.
    Dev { root: PathBuf },
    /// The `web/` folder inside a zip bundle.
    Bundled { archive: PathBuf },
}

impl ResourceLocator {
    /// Prefer the local web folder, then a bundle: the executable itself, then
    /// the `.bundle` file next to it.
    pub fn detect(config: &ShellConfig) -> Result<Self, ResourceError> {
        if config.web_dir.is_dir() {
            return Ok(Self::Dev {
                root: config.web_dir.clone(),
            });
        }
        if let Some(archive) = config.bundle_path() {
            return Ok(Self::Bundled { archive });
        }

        let searched = config
            .bundle_candidates()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>();
        Err(ResourceError::NoSource {
            web_dir: config.web_dir.clone(),
            bundle: if searched.is_empty() {
                "<unknown>".to_string()
            } else {
                searched.join(" or ")
            },
        })
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev { .. })
    }

    /// Load a required resource. A missing file is [`ResourceError::Missing`].
    pub fn load(&self, name: &str) -> Result<Resource, ResourceError> {
        match self {
            Self::Dev { root } => load_from_dir(root, name),
            Self::Bundled { archive } => load_from_archive(archive, name),
        }
    }
}

/// Whether `path` holds a zip archive with a `web/` folder, either standalone
/// or appended to an executable.
pub fn is_bundle(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    match zip::ZipArchive::new(file) {
        Ok(archive) => archive
            .file_names()
            .any(|name| name.starts_with(BUNDLE_WEB_PREFIX)),
        Err(_) => false,
    }
}

fn load_from_dir(root: &Path, name: &str) -> Result<Resource, ResourceError> {
    let path = root.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Resource::new(name, path.display().to_string(), text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ResourceError::Missing {
            name: name.to_string(),
            hint: format!("Must provide {}", path.display()),
        }),
        Err(e) if e.kind() == ErrorKind::InvalidData => Err(ResourceError::Encoding {
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn load_from_archive(archive: &Path, name: &str) -> Result<Resource, ResourceError> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    let entry_name = format!("{BUNDLE_WEB_PREFIX}{name}");

    let mut entry = match zip.by_name(&entry_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ResourceError::Missing {
                name: name.to_string(),
                hint: format!("Must provide {entry_name} in {}", archive.display()),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes).map_err(|_| ResourceError::Encoding {
        name: name.to_string(),
    })?;

    Ok(Resource::new(
        name,
        format!("{}!/{entry_name}", archive.display()),
        text,
    ))
}
