//! Filename templates for locating component files.
//!
//! Concrete artifact names are generalized by replacing their variable parts
//! with a `*` wildcard:
//!
//! 1. **Part-of-total index**: `01of01` → `*`
//! 2. **Chunk number**: `_chunk_03` → `_chunk_*`
//! 3. **Quantization precision**: `lut6` → `lut*`
//!
//! The substitutions apply to every role alike.
//!
//! One pattern is kept per role and the last file seen wins, so assemblies
//! split into several chunks of the same role collapse to a single template.

use super::classifier::ComponentRole;
use crate::error::{DiscoveryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `01of01`, `2of4`
static PART_OF_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+of\d+").unwrap());

/// `_chunk_01`
static CHUNK_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(_chunk_)\d+").unwrap());

/// `lut6`, `LUT4`
static LUT_PRECISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(lut)\d+").unwrap());

/// Wildcard marker used in templates.
pub const WILDCARD: &str = "*";

/// Filename template per component role; `None` when no file of that role was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPatterns {
    pub embeddings_pattern: Option<String>,
    pub ffn_infer_pattern: Option<String>,
    pub ffn_prefill_pattern: Option<String>,
    pub lm_head_pattern: Option<String>,
}

impl NamingPatterns {
    /// Template recorded for `role`, if any.
    pub fn pattern_for(&self, role: &ComponentRole) -> Option<&str> {
        match role {
            ComponentRole::Embeddings => self.embeddings_pattern.as_deref(),
            ComponentRole::FfnInfer => self.ffn_infer_pattern.as_deref(),
            ComponentRole::FfnPrefill => self.ffn_prefill_pattern.as_deref(),
            ComponentRole::LmHead => self.lm_head_pattern.as_deref(),
            ComponentRole::Unknown(_) => None,
        }
    }

    fn slot_mut(&mut self, role: &ComponentRole) -> Option<&mut Option<String>> {
        match role {
            ComponentRole::Embeddings => Some(&mut self.embeddings_pattern),
            ComponentRole::FfnInfer => Some(&mut self.ffn_infer_pattern),
            ComponentRole::FfnPrefill => Some(&mut self.ffn_prefill_pattern),
            ComponentRole::LmHead => Some(&mut self.lm_head_pattern),
            ComponentRole::Unknown(_) => None,
        }
    }
}

/// Keyword-only role detection used for naming.
///
/// Deliberately narrower than [`super::classify`]: files without an
/// `embedding`, `ffn` or `lm_head` keyword get no pattern.
fn naming_role(filename: &str) -> Option<ComponentRole> {
    let lower = filename.to_lowercase();

    if lower.contains("embedding") {
        Some(ComponentRole::Embeddings)
    } else if lower.contains("ffn") {
        if lower.contains("prefill") || lower.contains("pf") {
            Some(ComponentRole::FfnPrefill)
        } else {
            Some(ComponentRole::FfnInfer)
        }
    } else if lower.contains("lm_head") || lower.contains("lmhead") {
        Some(ComponentRole::LmHead)
    } else {
        None
    }
}

/// Replace index and precision markers in a filename with wildcards.
///
/// # Examples
///
/// ```
/// use shapes_core::discovery::generalize_filename;
///
/// assert_eq!(
///     generalize_filename("qwen_FFN_PF_chunk_01of01.mlmodelc"),
///     "qwen_FFN_PF_chunk_*.mlmodelc"
/// );
/// assert_eq!(generalize_filename("qwen_lm_head_lut6.mlmodelc"), "qwen_lm_head_lut*.mlmodelc");
/// ```
pub fn generalize_filename(filename: &str) -> String {
    let name = PART_OF_TOTAL.replace_all(filename, WILDCARD);
    let name = CHUNK_INDEX.replace_all(&name, "${1}*");
    LUT_PRECISION.replace_all(&name, "${1}*").into_owned()
}

/// Build one filename template per role from the discovered file names.
pub fn generate<S: AsRef<str>>(filenames: &[S]) -> NamingPatterns {
    let mut patterns = NamingPatterns::default();

    for filename in filenames {
        let filename = filename.as_ref();
        let Some(role) = naming_role(filename) else {
            continue;
        };
        if let Some(slot) = patterns.slot_mut(&role) {
            *slot = Some(generalize_filename(filename));
        }
    }

    patterns
}

/// Compile a template into an anchored regex where `*` matches any run.
fn pattern_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// List the entries of `dir` whose names match `pattern`, sorted by name.
///
/// # Errors
///
/// Returns [`DiscoveryError::DirectoryNotFound`] if `dir` does not exist.
pub fn resolve_pattern(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }
    let regex = pattern_regex(pattern)?;

    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| DiscoveryError::io_with_path(e, dir))? {
        let entry = entry.map_err(|e| DiscoveryError::io_with_path(e, dir))?;
        let name = entry.file_name();
        if regex.is_match(&name.to_string_lossy()) {
            matches.push(entry.path());
        }
    }
    matches.sort();

    Ok(matches)
}
