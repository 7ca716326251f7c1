//! Directory enumeration for artifacts and model directories.
//!
//! Neither function recurses: artifacts are looked up directly inside a model
//! directory and model directories directly inside a scan root.

use crate::config::{is_artifact_extension, DiscoveryConfig};
use crate::error::{DiscoveryError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

fn artifact_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| is_artifact_extension(e))
        .map(|e| e.to_lowercase())
}

/// Direct children of `dir`, sorted by file name.
///
/// Fails only when `dir` itself cannot be read; unreadable children are
/// logged and left out.
fn children(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => warn!("Skipping unreadable entry in {}: {}", dir.display(), e),
        }
    }
    Ok(entries)
}

/// List the qualifying artifacts directly inside a model directory.
///
/// Artifacts are grouped by extension in the order of
/// [`DiscoveryConfig::ARTIFACT_EXTENSIONS`] (`.mlpackage` before
/// `.mlmodelc`) and sorted by name within each group.
///
/// # Errors
///
/// Returns [`DiscoveryError::DirectoryNotFound`] if `dir` does not exist.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }

    let entries = children(dir)?;
    let mut artifacts = Vec::new();
    for wanted in DiscoveryConfig::ARTIFACT_EXTENSIONS {
        artifacts.extend(
            entries
                .iter()
                .filter(|entry| artifact_extension(entry.path()).as_deref() == Some(*wanted))
                .map(|entry| entry.path().to_path_buf()),
        );
    }

    Ok(artifacts)
}

/// Find the immediate subdirectories of `root` that hold at least one artifact.
///
/// An empty root yields an empty list. A subdirectory that cannot be listed
/// is logged and skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError::DirectoryNotFound`] if `root` does not exist.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    scan_with(root, list_artifacts)
}

fn scan_with<F>(root: &Path, list: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> Result<Vec<PathBuf>>,
{
    if !root.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(root.to_path_buf()));
    }
    debug!("Scanning directory: {}", root.display());

    let mut model_dirs = Vec::new();
    for entry in children(root)? {
        if !entry.path().is_dir() {
            continue;
        }
        let artifacts = match list(entry.path()) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !artifacts.is_empty() {
            debug!(
                "Found model directory: {} ({} files)",
                entry.file_name().to_string_lossy(),
                artifacts.len()
            );
            model_dirs.push(entry.path().to_path_buf());
        }
    }

    Ok(model_dirs)
}
