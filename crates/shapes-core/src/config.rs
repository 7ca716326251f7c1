//! Centralized configuration constants for shape discovery.
//!
//! Seed values for the shape model, the artifact extensions that qualify a
//! directory, and the on-disk layout of CoreML bundles.

/// Shape values used when no artifact provides evidence.
pub struct ShapeDefaults;

impl ShapeDefaults {
    pub const BATCH_SIZE: usize = 1;
    pub const CONTEXT_LENGTH: usize = 256;
    pub const HIDDEN_SIZE: usize = 1024;
    pub const VOCAB_SIZE: usize = 151_669;
}

/// Discovery and output conventions.
pub struct DiscoveryConfig;

impl DiscoveryConfig {
    /// Model-kind tag recorded in every discovery result.
    pub const MODEL_TYPE: &'static str = "qwen";
    /// Extensions of qualifying artifacts, in enumeration order.
    pub const ARTIFACT_EXTENSIONS: &'static [&'static str] = &["mlpackage", "mlmodelc"];
    pub const CONFIG_FILE_SUFFIX: &'static str = "-config.json";
    pub const DEFAULT_OUTPUT_DIR: &'static str = "configs";
}

/// File layout inside CoreML bundles.
pub struct CoreMlLayout;

impl CoreMlLayout {
    /// Compiled bundles (`.mlmodelc`) describe their interface here.
    pub const COMPILED_METADATA: &'static str = "metadata.json";
    pub const PACKAGE_MANIFEST: &'static str = "Manifest.json";
    pub const PACKAGE_DATA_DIR: &'static str = "Data";
    /// Used when the manifest does not name a root model item.
    pub const PACKAGE_DEFAULT_SPEC: &'static str = "com.apple.CoreML/model.mlmodel";
    /// Specs larger than this are rejected rather than read into memory.
    pub const MAX_SPEC_BYTES: u64 = 1024 * 1024 * 1024;
}

/// Returns true when `extension` names a qualifying artifact.
pub fn is_artifact_extension(extension: &str) -> bool {
    DiscoveryConfig::ARTIFACT_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}
