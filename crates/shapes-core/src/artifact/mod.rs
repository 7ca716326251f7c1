//! Artifact reading - declared tensor signatures of CoreML bundles.
//!
//! Two on-disk layouts are supported:
//! - **Compiled bundles** (`.mlmodelc`): interface read from `metadata.json`
//! - **Packages** (`.mlpackage`): interface decoded from the protobuf model spec
//!
//! Format-specific descriptor data never leaves this module; callers only see
//! typed [`ArtifactSignature`] values.
//!
//! # Example
//!
//! ```rust,ignore
//! use shapes_core::artifact::{ArtifactReader, CoreMlReader};
//!
//! let file = CoreMlReader.read("qwen_embeddings.mlmodelc".as_ref())?;
//! for (name, sig) in &file.inputs {
//!     println!("{name}: {:?} {}", sig.shape, sig.data_type);
//! }
//! ```

mod compiled;
mod package;
mod proto;

#[cfg(test)]
pub(crate) use package::test_support;

use crate::error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element type of a declared tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Float16,
    Float32,
    Int32,
    Unknown,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float16 => "FLOAT16",
            DataType::Float32 => "FLOAT32",
            DataType::Int32 => "INT32",
            DataType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One declared input or output tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSignature {
    pub name: String,
    /// Empty when the feature declares no multi-array shape.
    pub shape: Vec<usize>,
    pub data_type: DataType,
}

impl ArtifactSignature {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            shape,
            data_type,
        }
    }

    /// Last dimension, if any.
    pub fn last_dim(&self) -> Option<usize> {
        self.shape.last().copied()
    }
}

/// Signatures keyed by tensor name.
pub type SignatureMap = BTreeMap<String, ArtifactSignature>;

/// Build a [`SignatureMap`] from a list of signatures.
pub fn signature_map(signatures: impl IntoIterator<Item = ArtifactSignature>) -> SignatureMap {
    signatures
        .into_iter()
        .map(|sig| (sig.name.clone(), sig))
        .collect()
}

/// Interface of one artifact as declared on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Absolute path of the bundle
    pub path: PathBuf,
    pub inputs: SignatureMap,
    pub outputs: SignatureMap,
    /// Function names of multi-function packages
    pub functions: Vec<String>,
}

impl ArtifactFile {
    /// File name of the bundle, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Interface extracted by a format backend before it is keyed by name.
#[derive(Debug, Default)]
pub(crate) struct ModelInterface {
    pub inputs: Vec<ArtifactSignature>,
    pub outputs: Vec<ArtifactSignature>,
    pub functions: Vec<String>,
}

/// Reads the declared interface of one artifact.
///
/// The discovery engine only depends on this trait, so alternative formats
/// or in-memory fixtures can be plugged in.
pub trait ArtifactReader {
    fn read(&self, path: &Path) -> Result<ArtifactFile>;
}

/// Reader for CoreML `.mlmodelc` and `.mlpackage` bundles.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreMlReader;

impl ArtifactReader for CoreMlReader {
    fn read(&self, path: &Path) -> Result<ArtifactFile> {
        let path = std::path::absolute(path).map_err(|e| DiscoveryError::io_with_path(e, path))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let interface = match extension.as_str() {
            "mlmodelc" => compiled::read_compiled(&path),
            "mlpackage" => package::read_package(&path),
            _ => return Err(DiscoveryError::UnsupportedFormat(path)),
        }
        .map_err(|e| match e {
            DiscoveryError::ArtifactRead { .. } => e,
            other => DiscoveryError::artifact_read(&path, other),
        })?;

        for sig in interface.inputs.iter() {
            debug!("Input: {} -> {:?}", sig.name, sig.shape);
        }
        for sig in interface.outputs.iter() {
            debug!("Output: {} -> {:?}", sig.name, sig.shape);
        }

        Ok(ArtifactFile {
            path,
            inputs: signature_map(interface.inputs),
            outputs: signature_map(interface.outputs),
            functions: interface.functions,
        })
    }
}
