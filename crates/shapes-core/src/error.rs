//! Error types for shape discovery.
//!
//! Per-file read failures are recovered by the discovery engine and only skip
//! the offending artifact; everything else ends discovery for the directory.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the discovery library.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    // Directory-level errors
    #[error("Model directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("No CoreML model files found in {0}")]
    NoArtifactsFound(PathBuf),

    // Artifact-level errors
    #[error("Could not analyze {path}: {message}")]
    ArtifactRead { path: PathBuf, message: String },

    #[error("Unsupported artifact format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Malformed protobuf: {message}")]
    Protobuf { message: String },

    #[error("Invalid naming pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<walkdir::Error> for DiscoveryError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        DiscoveryError::Io {
            message: err.to_string(),
            path,
            source: err.into_io_error(),
        }
    }
}

impl DiscoveryError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        DiscoveryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Wrap any failure while reading one artifact.
    pub fn artifact_read(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        DiscoveryError::ArtifactRead {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
