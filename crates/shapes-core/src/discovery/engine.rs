//! Per-directory discovery pipeline.
//!
//! Lists the artifacts of one model directory, reads each through an
//! [`ArtifactReader`], classifies it and folds its evidence into a
//! [`ShapeModel`]. The returned [`DiscoveryResult`] is complete before any
//! caller writes it anywhere.

use super::classifier::{classify, ComponentRole};
use super::naming::{self, NamingPatterns};
use super::scanner::{list_artifacts, scan};
use super::shapes::{aggregate, ShapeModel};
use crate::artifact::{ArtifactFile, ArtifactReader, SignatureMap};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Provenance of a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Absolute path of the analyzed directory
    pub path: PathBuf,
    pub model_type: String,
    pub discovered_at: DateTime<Utc>,
}

/// Declared interface of the artifact chosen for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub file_path: PathBuf,
    pub inputs: SignatureMap,
    pub outputs: SignatureMap,
    #[serde(default)]
    pub functions: Vec<String>,
}

impl From<ArtifactFile> for ComponentRecord {
    fn from(file: ArtifactFile) -> Self {
        Self {
            file_path: file.path,
            inputs: file.inputs,
            outputs: file.outputs,
            functions: file.functions,
        }
    }
}

/// Consolidated configuration for one model directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub model_info: ModelInfo,
    pub shapes: ShapeModel,
    pub components: BTreeMap<ComponentRole, ComponentRecord>,
    pub naming: NamingPatterns,
}

impl DiscoveryResult {
    /// Record for `role`, if a file of that role was read.
    pub fn component(&self, role: &ComponentRole) -> Option<&ComponentRecord> {
        self.components.get(role)
    }

    /// Final path segment of the analyzed directory.
    pub fn model_name(&self) -> String {
        self.model_info
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Analyze one model directory.
///
/// Artifacts the reader cannot open are logged and skipped; they contribute
/// neither a component, shape evidence nor a naming pattern.
///
/// # Errors
///
/// - [`DiscoveryError::DirectoryNotFound`] if `dir` does not exist
/// - [`DiscoveryError::NoArtifactsFound`] if it holds no qualifying artifact
pub fn discover<R: ArtifactReader + ?Sized>(dir: &Path, reader: &R) -> Result<DiscoveryResult> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }
    let dir = std::path::absolute(dir).map_err(|e| DiscoveryError::io_with_path(e, dir))?;
    info!("Discovering shapes in: {}", dir.display());

    let artifacts = list_artifacts(&dir)?;
    if artifacts.is_empty() {
        return Err(DiscoveryError::NoArtifactsFound(dir));
    }
    info!("Found {} model files", artifacts.len());

    let mut shapes = ShapeModel::default();
    let mut components = BTreeMap::new();
    let mut read_names = Vec::with_capacity(artifacts.len());

    for path in &artifacts {
        let file = match reader.read(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let file_name = file.file_name();
        let role = classify(&file_name);
        debug!("Classified {} as {}", file_name, role);

        shapes = aggregate(shapes, &role, &file.inputs, &file.outputs);
        read_names.push(file_name);
        components.insert(role, ComponentRecord::from(file));
    }

    let naming = naming::generate(&read_names);
    info!(
        "Discovery complete: {:?}, components: {:?}",
        shapes,
        components.keys().map(ComponentRole::key).collect::<Vec<_>>()
    );

    Ok(DiscoveryResult {
        model_info: ModelInfo {
            path: dir,
            model_type: DiscoveryConfig::MODEL_TYPE.to_string(),
            discovered_at: Utc::now(),
        },
        shapes,
        components,
        naming,
    })
}

/// Analyze every model directory under `root`, one after another.
///
/// A directory that fails is logged and left out of the result.
///
/// # Errors
///
/// Returns [`DiscoveryError::DirectoryNotFound`] if `root` does not exist.
pub fn discover_all<R: ArtifactReader + ?Sized>(
    root: &Path,
    reader: &R,
) -> Result<Vec<DiscoveryResult>> {
    let model_dirs = scan(root)?;
    info!("Found {} model directories", model_dirs.len());

    let mut results = Vec::with_capacity(model_dirs.len());
    for dir in model_dirs {
        match discover(&dir, reader) {
            Ok(result) => results.push(result),
            Err(e) => warn!("Failed to process {}: {}", dir.display(), e),
        }
    }

    Ok(results)
}
