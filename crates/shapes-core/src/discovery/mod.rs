//! Shape discovery for multi-component CoreML assemblies.
//!
//! This module provides:
//! - Role classification of artifacts by filename
//! - Shape inference folded across all components
//! - Wildcard naming patterns per role
//! - Model directory enumeration
//! - The per-directory discovery pipeline
//!
//! # Architecture
//!
//! ```text
//! discover(dir, reader)
//!     │
//!     ├── list_artifacts - .mlpackage then .mlmodelc, sorted
//!     │
//!     ├── ArtifactReader::read - skipped with a warning on failure
//!     │
//!     ├── classify → aggregate - fold into ShapeModel
//!     │
//!     └── generate - NamingPatterns from the files that were read
//! ```

pub mod classifier;
pub mod engine;
pub mod naming;
pub mod scanner;
pub mod shapes;

pub use classifier::{classify, ComponentRole};
pub use engine::{discover, discover_all, ComponentRecord, DiscoveryResult, ModelInfo};
pub use naming::{generalize_filename, generate, resolve_pattern, NamingPatterns, WILDCARD};
pub use scanner::{list_artifacts, scan};
pub use shapes::{aggregate, fold_components, ShapeModel};
