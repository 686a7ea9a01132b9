//! Bundle packaging — move the web folder into and out of a bundle archive.
//!
//! A packaged shell is a single file: the executable with a zip archive
//! appended to it. The archive's `web/` folder holds the shell's resources.
//! `package` never edits its inputs in place: it writes a staging file and
//! renames it onto the target once complete.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

use crate::error::PackageError;
use crate::resources::BUNDLE_WEB_PREFIX;

/// What a `package` run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// `web/` entries dropped from the source bundle.
    pub removed: Vec<String>,
    /// `web/` entries written from the local folder.
    pub added: Vec<String>,
    /// Other entries carried over unchanged.
    pub kept: usize,
    /// Size of the executable the archive was appended to.
    pub launcher_bytes: u64,
}

/// Write `target`: the `launcher` executable followed by the archive of
/// `source` with its `web/` folder replaced by `web_dir`.
///
/// `launcher` may itself be a packaged shell; only its executable part is
/// copied.
pub fn package(
    web_dir: &Path,
    launcher: &Path,
    source: Option<&Path>,
    target: &Path,
) -> Result<PackageReport, PackageError> {
    if !web_dir.is_dir() {
        return Err(PackageError::NoLocalFolder {
            path: web_dir.to_path_buf(),
        });
    }
    let source = source
        .filter(|path| path.is_file())
        .ok_or(PackageError::NotPackaged)?;

    let stub = launcher_stub(launcher)?;
    let (archive, mut report) = build_archive(web_dir, source)?;
    report.launcher_bytes = stub.len() as u64;

    let staging = staging_path(target);
    if let Err(e) = write_staging(&staging, launcher, &stub, &archive) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    if target.exists() {
        std::fs::remove_file(target)?;
    }
    std::fs::rename(&staging, target)?;

    info!(
        target = %target.display(),
        added = report.added.len(),
        removed = report.removed.len(),
        "Packaged"
    );
    Ok(report)
}

/// Extract the `web/` folder of `bundle` into `web_dir`. Returns the files written.
pub fn unpackage(bundle: Option<&Path>, web_dir: &Path) -> Result<Vec<PathBuf>, PackageError> {
    let bundle = bundle
        .filter(|path| path.is_file())
        .ok_or(PackageError::NotPackaged)?;

    if web_dir.exists() {
        return Err(PackageError::AlreadyExists {
            path: web_dir.to_path_buf(),
        });
    }

    let web_root = BUNDLE_WEB_PREFIX.trim_end_matches('/');
    let mut archive = ZipArchive::new(File::open(bundle)?)?;
    let mut created = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().starts_with(BUNDLE_WEB_PREFIX) {
            continue;
        }
        let Some(relative) = entry
            .enclosed_name()
            .and_then(|path| path.strip_prefix(web_root).ok())
            .map(Path::to_path_buf)
        else {
            debug!(entry = entry.name(), "Skipping entry with unsafe path");
            continue;
        };

        let path = web_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&path)?;
        std::io::copy(&mut entry, &mut out)?;
        info!(path = %path.display(), "Created");
        created.push(path);
    }

    Ok(created)
}

/// The executable part of `launcher`: everything before an appended archive.
fn launcher_stub(launcher: &Path) -> Result<Vec<u8>, PackageError> {
    let mut bytes = std::fs::read(launcher)?;
    let archive_start = ZipArchive::new(Cursor::new(bytes.as_slice()))
        .ok()
        .map(|archive| archive.offset());
    if let Some(start) = archive_start {
        bytes.truncate(usize::try_from(start).unwrap_or(bytes.len()));
    }
    Ok(bytes)
}

/// Zip bytes for the new bundle. Offsets are relative to the archive start so
/// it stays readable once appended to the launcher.
fn build_archive(web_dir: &Path, source: &Path) -> Result<(Vec<u8>, PackageReport), PackageError> {
    let mut report = PackageReport::default();
    let mut archive = ZipArchive::new(File::open(source)?)?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if name.starts_with(BUNDLE_WEB_PREFIX) {
            if !entry.is_dir() {
                debug!(entry = %name, "Deleted");
                report.removed.push(name);
            }
            continue;
        }

        let options = FileOptions::default().compression_method(entry.compression());
        if entry.is_dir() {
            zip.add_directory(name, options)?;
        } else {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            zip.start_file(name, options)?;
            zip.write_all(&data)?;
        }
        report.kept += 1;
    }

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for file in list_files(web_dir)? {
        let relative = file
            .strip_prefix(web_dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let name = format!("{BUNDLE_WEB_PREFIX}{}", archive_path(relative));

        let data = std::fs::read(&file)?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&data)?;
        debug!(entry = %name, "Added");
        report.added.push(name);
    }

    let bytes = zip.finish()?.into_inner();
    Ok((bytes, report))
}

fn write_staging(
    staging: &Path,
    launcher: &Path,
    stub: &[u8],
    archive: &[u8],
) -> Result<(), PackageError> {
    let mut out = File::create(staging)?;
    out.write_all(stub)?;
    out.write_all(archive)?;
    out.flush()?;
    std::fs::set_permissions(staging, std::fs::metadata(launcher)?.permissions())?;
    Ok(())
}

/// Every regular file under `dir`, sorted for a stable archive layout.
fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Archive entries always use `/` separators.
fn archive_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}
