//! `.mlmodelc` reader.
//!
//! Compiled bundles ship a `metadata.json` describing the model interface.
//! The file is a JSON array; the first entry carries `inputSchema` and
//! `outputSchema`, each feature with its shape rendered as a string such as
//! `"[1, 64]"`.

use super::{ArtifactSignature, DataType, ModelInterface};
use crate::config::CoreMlLayout;
use crate::error::{DiscoveryError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompiledMetadata {
    #[serde(default)]
    input_schema: Vec<SchemaEntry>,
    #[serde(default)]
    output_schema: Vec<SchemaEntry>,
    #[serde(default)]
    functions: Vec<FunctionSchema>,
    default_function_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionSchema {
    name: String,
    #[serde(default)]
    input_schema: Vec<SchemaEntry>,
    #[serde(default)]
    output_schema: Vec<SchemaEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaEntry {
    name: String,
    #[serde(rename = "type", default)]
    feature_type: String,
    #[serde(default)]
    data_type: String,
    #[serde(default)]
    shape: String,
}

impl SchemaEntry {
    fn into_signature(self) -> Result<ArtifactSignature> {
        if self.feature_type != "MultiArray" {
            return Ok(ArtifactSignature::new(self.name, Vec::new(), DataType::Unknown));
        }
        let shape = parse_shape(&self.shape)?;
        let data_type = match self.data_type.as_str() {
            "Float16" => DataType::Float16,
            "Float32" => DataType::Float32,
            "Int32" => DataType::Int32,
            _ => DataType::Unknown,
        };
        Ok(ArtifactSignature::new(self.name, shape, data_type))
    }
}

pub(crate) fn read_compiled(bundle: &Path) -> Result<ModelInterface> {
    let metadata_path = bundle.join(CoreMlLayout::COMPILED_METADATA);
    let contents = std::fs::read_to_string(&metadata_path)
        .map_err(|e| DiscoveryError::io_with_path(e, &metadata_path))?;
    parse_metadata(&contents)
}

pub(crate) fn parse_metadata(contents: &str) -> Result<ModelInterface> {
    let entries: Vec<CompiledMetadata> = serde_json::from_str(contents)?;
    let metadata = entries.into_iter().next().unwrap_or_default();

    let function_names: Vec<String> = metadata.functions.iter().map(|f| f.name.clone()).collect();

    let (inputs, outputs) = if metadata.input_schema.is_empty()
        && metadata.output_schema.is_empty()
        && !metadata.functions.is_empty()
    {
        let mut functions = metadata.functions;
        let index = metadata
            .default_function_name
            .as_ref()
            .and_then(|name| functions.iter().position(|f| &f.name == name))
            .unwrap_or(0);
        let function = functions.swap_remove(index);
        (function.input_schema, function.output_schema)
    } else {
        (metadata.input_schema, metadata.output_schema)
    };

    Ok(ModelInterface {
        inputs: inputs
            .into_iter()
            .map(SchemaEntry::into_signature)
            .collect::<Result<_>>()?,
        outputs: outputs
            .into_iter()
            .map(SchemaEntry::into_signature)
            .collect::<Result<_>>()?,
        functions: function_names,
    })
}

/// Parse a rendered shape such as `"[1, 64, 1024]"`.
fn parse_shape(raw: &str) -> Result<Vec<usize>> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|dim| {
            dim.trim()
                .parse::<i64>()
                // Flexible (negative) dimensions are recorded as 0
                .map(|d| usize::try_from(d).unwrap_or(0))
                .map_err(|_| DiscoveryError::Json {
                    message: format!("invalid shape dimension {dim:?} in {raw:?}"),
                    source: None,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMBEDDINGS_METADATA: &str = r#"[
      {
        "metadataOutputVersion" : "3.0",
        "outputSchema" : [
          {
            "hasShapeFlexibility" : "0",
            "isOptional" : "0",
            "dataType" : "Float16",
            "formattedType" : "MultiArray (Float16 1 × 64 × 1024)",
            "shortDescription" : "",
            "shape" : "[1, 64, 1024]",
            "name" : "hidden_states",
            "type" : "MultiArray"
          }
        ],
        "inputSchema" : [
          {
            "hasShapeFlexibility" : "0",
            "isOptional" : "0",
            "dataType" : "Int32",
            "formattedType" : "MultiArray (Int32 1 × 64)",
            "shortDescription" : "",
            "shape" : "[1, 64]",
            "name" : "input_ids",
            "type" : "MultiArray"
          }
        ]
      }
    ]"#;

    #[test]
    fn test_parse_metadata() {
        let interface = parse_metadata(EMBEDDINGS_METADATA).unwrap();
        assert_eq!(interface.inputs.len(), 1);
        assert_eq!(interface.inputs[0].name, "input_ids");
        assert_eq!(interface.inputs[0].shape, vec![1, 64]);
        assert_eq!(interface.inputs[0].data_type, DataType::Int32);
        assert_eq!(interface.outputs[0].shape, vec![1, 64, 1024]);
        assert_eq!(interface.outputs[0].data_type, DataType::Float16);
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("[1, 1, 1, 256]").unwrap(), vec![1, 1, 1, 256]);
        assert_eq!(parse_shape("[]").unwrap(), Vec::<usize>::new());
        assert!(parse_shape("[1, x]").is_err());
    }

    #[test]
    fn test_negative_dimension_is_zero() {
        assert_eq!(parse_shape("[1, -1, 64]").unwrap(), vec![1, 0, 64]);
    }

    #[test]
    fn test_non_array_feature_has_empty_shape() {
        let contents = r#"[{"inputSchema": [
            {"name": "prompt", "type": "String", "dataType": "String"}
        ]}]"#;
        let interface = parse_metadata(contents).unwrap();
        assert!(interface.inputs[0].shape.is_empty());
        assert_eq!(interface.inputs[0].data_type, DataType::Unknown);
    }

    #[test]
    fn test_double_maps_to_unknown() {
        let contents = r#"[{"outputSchema": [
            {"name": "scores", "type": "MultiArray", "dataType": "Double", "shape": "[1, 10]"}
        ]}]"#;
        let interface = parse_metadata(contents).unwrap();
        assert_eq!(interface.outputs[0].data_type, DataType::Unknown);
        assert_eq!(interface.outputs[0].shape, vec![1, 10]);
    }

    #[test]
    fn test_multifunction_metadata() {
        let contents = r#"[{
            "defaultFunctionName": "infer",
            "functions": [
                {"name": "prefill", "inputSchema": [
                    {"name": "causal_mask", "type": "MultiArray", "dataType": "Float16", "shape": "[1, 1, 64, 512]"}
                ]},
                {"name": "infer", "inputSchema": [
                    {"name": "causal_mask", "type": "MultiArray", "dataType": "Float16", "shape": "[1, 1, 1, 512]"}
                ]}
            ]
        }]"#;
        let interface = parse_metadata(contents).unwrap();
        assert_eq!(interface.functions, vec!["prefill", "infer"]);
        assert_eq!(interface.inputs[0].shape, vec![1, 1, 1, 512]);
    }

    #[test]
    fn test_read_compiled_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = temp_dir.path().join("qwen_embeddings.mlmodelc");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("metadata.json"), EMBEDDINGS_METADATA).unwrap();

        let interface = read_compiled(&bundle).unwrap();
        assert_eq!(interface.inputs[0].shape, vec![1, 64]);
    }

    #[test]
    fn test_invalid_metadata_is_error() {
        assert!(parse_metadata("{not json").is_err());
    }
}
