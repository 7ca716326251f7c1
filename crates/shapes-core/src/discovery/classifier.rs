//! Architectural role detection from artifact filenames.
//!
//! Roles are resolved by an ordered rule table; the first matching rule wins.
//! All tests are case-insensitive substring checks on the file name only.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Architectural role of one artifact in a model assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentRole {
    /// Token embedding lookup
    Embeddings,
    /// Transformer stack, single-token decode
    FfnInfer,
    /// Transformer stack, batched prompt prefill
    FfnPrefill,
    /// Output projection to vocabulary logits
    LmHead,
    /// Unrecognized file; carries the normalized filename token
    Unknown(String),
}

impl ComponentRole {
    /// The four roles an assembly is built from.
    pub const KNOWN: [ComponentRole; 4] = [
        ComponentRole::Embeddings,
        ComponentRole::FfnInfer,
        ComponentRole::FfnPrefill,
        ComponentRole::LmHead,
    ];

    /// Canonical key, as used in the configuration file.
    pub fn key(&self) -> String {
        match self {
            ComponentRole::Embeddings => "embeddings".to_string(),
            ComponentRole::FfnInfer => "ffn_infer".to_string(),
            ComponentRole::FfnPrefill => "ffn_prefill".to_string(),
            ComponentRole::LmHead => "lm_head".to_string(),
            ComponentRole::Unknown(token) => format!("unknown:{token}"),
        }
    }

    /// Parse a canonical key back into a role.
    pub fn from_key(key: &str) -> Self {
        match key {
            "embeddings" => ComponentRole::Embeddings,
            "ffn_infer" => ComponentRole::FfnInfer,
            "ffn_prefill" => ComponentRole::FfnPrefill,
            "lm_head" => ComponentRole::LmHead,
            other => ComponentRole::Unknown(
                other.strip_prefix("unknown:").unwrap_or(other).to_string(),
            ),
        }
    }

    /// True for both transformer-stack roles.
    pub fn is_ffn(&self) -> bool {
        matches!(self, ComponentRole::FfnInfer | ComponentRole::FfnPrefill)
    }
}

impl std::fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl Serialize for ComponentRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for ComponentRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(ComponentRole::from_key(&key))
    }
}

/// Rule predicate over a lower-cased filename.
type Predicate = fn(&str) -> bool;

/// Ordered classification rules. Order is significant.
static RULES: &[(Predicate, ComponentRole)] = &[
    (|name| name.contains("embedding"), ComponentRole::Embeddings),
    (
        |name| name.contains("ffn") && (name.contains("prefill") || name.contains("pf")),
        ComponentRole::FfnPrefill,
    ),
    (|name| name.contains("ffn"), ComponentRole::FfnInfer),
    (
        |name| name.contains("lm_head") || name.contains("lmhead"),
        ComponentRole::LmHead,
    ),
    (|name| name.starts_with("emb"), ComponentRole::Embeddings),
    (|name| name.contains("head"), ComponentRole::LmHead),
];

/// Classify an artifact by its file name.
///
/// Total and pure: unmatched names become [`ComponentRole::Unknown`] carrying
/// the lower-cased name with dots replaced by underscores.
///
/// # Examples
///
/// ```
/// use shapes_core::discovery::{classify, ComponentRole};
///
/// assert_eq!(classify("qwen_embeddings.mlmodelc"), ComponentRole::Embeddings);
/// assert_eq!(classify("qwen_FFN_PF_chunk_01of01.mlpackage"), ComponentRole::FfnPrefill);
/// assert_eq!(classify("tokenizer.json").key(), "unknown:tokenizer_json");
/// ```
pub fn classify(filename: &str) -> ComponentRole {
    let lower = filename.to_lowercase();

    RULES
        .iter()
        .find(|(matches, _)| matches(lower.as_str()))
        .map(|(_, role)| role.clone())
        .unwrap_or_else(|| ComponentRole::Unknown(lower.replace('.', "_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_roles() {
        assert_eq!(classify("qwen_embeddings.mlmodelc"), ComponentRole::Embeddings);
        assert_eq!(classify("qwen_FFN_chunk_01of01.mlmodelc"), ComponentRole::FfnInfer);
        assert_eq!(
            classify("qwen_prefill_ffn_chunk_01of01.mlpackage"),
            ComponentRole::FfnPrefill
        );
        assert_eq!(classify("qwen_lm_head_lut6.mlmodelc"), ComponentRole::LmHead);
        assert_eq!(classify("QwenLMHead.mlpackage"), ComponentRole::LmHead);
    }

    #[test]
    fn test_classify_fallback_rules() {
        assert_eq!(classify("emb_stage.mlpackage"), ComponentRole::Embeddings);
        assert_eq!(classify("output_head.mlmodelc"), ComponentRole::LmHead);
    }

    #[test]
    fn test_embedding_wins_over_ffn() {
        assert_eq!(
            classify("model_embedding_ffn.mlpackage"),
            ComponentRole::Embeddings
        );
        assert_eq!(
            classify("ffn_prefill_embedding.mlpackage"),
            ComponentRole::Embeddings
        );
    }

    #[test]
    fn test_pf_marker_selects_prefill() {
        assert_eq!(classify("qwen_FFN_PF_lut4.mlmodelc"), ComponentRole::FfnPrefill);
    }

    #[test]
    fn test_ffn_wins_over_head() {
        assert_eq!(classify("ffn_head.mlpackage"), ComponentRole::FfnInfer);
    }

    #[test]
    fn test_unknown_carries_normalized_name() {
        assert_eq!(
            classify("Tokenizer.Model.bin"),
            ComponentRole::Unknown("tokenizer_model_bin".to_string())
        );
        assert_eq!(classify("Tokenizer.Model.bin").key(), "unknown:tokenizer_model_bin");
    }

    #[test]
    fn test_classify_is_deterministic() {
        for name in [
            "qwen_embeddings.mlmodelc",
            "qwen_FFN_PF_chunk_01of01.mlpackage",
            "misc.txt",
        ] {
            assert_eq!(classify(name), classify(name));
        }
    }

    #[test]
    fn test_role_key_roundtrip() {
        for role in ComponentRole::KNOWN {
            assert_eq!(ComponentRole::from_key(&role.key()), role);
        }
        let unknown = ComponentRole::Unknown("readme_md".to_string());
        assert_eq!(ComponentRole::from_key(&unknown.key()), unknown);
    }

    #[test]
    fn test_is_ffn() {
        assert!(ComponentRole::FfnInfer.is_ffn());
        assert!(ComponentRole::FfnPrefill.is_ffn());
        assert!(!ComponentRole::LmHead.is_ffn());
        assert!(!ComponentRole::Unknown("readme_md".into()).is_ffn());
    }

    #[test]
    fn test_role_serializes_as_key() {
        let json = serde_json::to_string(&ComponentRole::FfnPrefill).unwrap();
        assert_eq!(json, "\"ffn_prefill\"");
    }
}
