//! Shapes Core - Shape discovery for multi-component CoreML model assemblies.
//!
//! A model assembly is a directory of separately compiled CoreML artifacts
//! (embeddings, FFN stages and an LM head). This crate reads the declared
//! tensor signatures of every artifact, infers the global shape parameters of
//! the assembly and derives filename templates per component role.
//!
//! The crate has no CLI concerns; see the `shapes-cli` crate for the
//! `discover-shapes` binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use shapes_core::{discover, write_config, CoreMlReader};
//!
//! fn main() -> shapes_core::Result<()> {
//!     let result = discover("models/qwen-0.6b".as_ref(), &CoreMlReader)?;
//!     println!(
//!         "context {} hidden {} vocab {}",
//!         result.shapes.context_length, result.shapes.hidden_size, result.shapes.vocab_size
//!     );
//!
//!     write_config("qwen-0.6b-config.json".as_ref(), &result)?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod discovery;
pub mod error;
pub mod persist;

// Re-export commonly used types
pub use artifact::{ArtifactFile, ArtifactReader, ArtifactSignature, CoreMlReader, DataType};
pub use discovery::{
    classify, discover, discover_all, ComponentRole, DiscoveryResult, NamingPatterns, ShapeModel,
};
pub use error::{DiscoveryError, Result};
pub use persist::{load_config, relocate_components, write_config};
