//! Configuration file persistence.
//!
//! Writes are atomic:
//! 1. Serialize and validate the JSON by re-parsing
//! 2. Write to a temp file with a unique PID+TID suffix beside the target
//! 3. `sync_all` so the data reaches disk
//! 4. Rename over the target
//!
//! A failed write never leaves a partial configuration at the target path.

use crate::config::DiscoveryConfig;
use crate::discovery::DiscoveryResult;
use crate::error::{DiscoveryError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use tracing::debug;

/// Default configuration file for a model directory: `<dir name>-config.json`
/// in the working directory.
pub fn default_config_path(model_dir: &Path) -> PathBuf {
    PathBuf::from(config_file_name(model_dir))
}

/// Configuration file for a model directory inside `output_dir`.
pub fn config_path_in(output_dir: &Path, model_dir: &Path) -> PathBuf {
    output_dir.join(config_file_name(model_dir))
}

/// Default output directory for scan mode.
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(DiscoveryConfig::DEFAULT_OUTPUT_DIR)
}

fn config_file_name(model_dir: &Path) -> String {
    // `file_name` is empty for paths like "." or "models/.."
    let name = model_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            std::path::absolute(model_dir)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "model".to_string());
    format!("{name}{}", DiscoveryConfig::CONFIG_FILE_SUFFIX)
}

/// Write a discovery result to `path` atomically.
///
/// Missing parent directories are created.
pub fn write_config(path: &Path, result: &DiscoveryResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| DiscoveryError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let serialized = serde_json::to_string_pretty(result).map_err(|e| DiscoveryError::Json {
        message: format!("Failed to serialize configuration: {}", e),
        source: Some(e),
    })?;
    serde_json::from_str::<serde_json::Value>(&serialized).map_err(|e| DiscoveryError::Json {
        message: format!("JSON validation failed: {}", e),
        source: Some(e),
    })?;

    let temp_path = temp_path_for(path);
    if let Err(e) = write_synced(&temp_path, serialized.as_bytes()) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(DiscoveryError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        });
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

fn write_synced(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |action: &str, e: std::io::Error| DiscoveryError::Io {
        message: format!("Failed to {} temp file {}", action, temp_path.display()),
        path: Some(temp_path.to_path_buf()),
        source: Some(e),
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| io_err("create", e))?;
    file.write_all(bytes).map_err(|e| io_err("write", e))?;
    file.flush().map_err(|e| io_err("flush", e))?;
    file.sync_all().map_err(|e| io_err("sync", e))?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let pid = process::id();
    let tid = thread_id();
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}.tmp", pid, tid));
    path.with_file_name(name)
}

/// Numeric identifier of the current thread.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Read a configuration previously written by [`write_config`].
pub fn load_config(path: &Path) -> Result<DiscoveryResult> {
    let contents = fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
        message: format!("Failed to read {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    serde_json::from_str(&contents).map_err(|e| DiscoveryError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })
}

/// Point stale component paths at `base_dir`.
///
/// A component whose recorded file no longer exists is redirected to
/// `base_dir/<file name>` when that file is present. Other records are kept.
pub fn relocate_components(result: &DiscoveryResult, base_dir: &Path) -> DiscoveryResult {
    let mut relocated = result.clone();

    for (role, record) in relocated.components.iter_mut() {
        if record.file_path.exists() {
            continue;
        }
        let Some(file_name) = record.file_path.file_name() else {
            continue;
        };
        let candidate = base_dir.join(file_name);
        if candidate.exists() {
            debug!(
                "Relocated {} component to {}",
                role,
                candidate.display()
            );
            record.file_path = candidate;
        }
    }

    relocated
}
