//! `.mlpackage` reader.
//!
//! A package is a directory holding `Manifest.json` and a `Data/` tree. The
//! manifest names the root model item, a protobuf `Model` message. Only the
//! interface description is decoded:
//!
//! ```text
//! Model {
//!   description: ModelDescription       (field 2)
//!     input:  [FeatureDescription]      (field 1, repeated)
//!     output: [FeatureDescription]      (field 10, repeated)
//!     functions: [FunctionDescription]  (field 20, repeated)
//!       name: string                    (field 1)
//!       input / output                  (fields 2 / 3)
//!     defaultFunctionName: string       (field 21)
//! }
//! FeatureDescription { name (1), type: FeatureType (3) }
//! FeatureType { multiArrayType: ArrayFeatureType (5), .. }
//! ArrayFeatureType { shape: [int64] (1), dataType: ArrayDataType (2) }
//! ```

use super::proto::{wire, ProtobufReader};
use super::{ArtifactSignature, DataType, ModelInterface};
use crate::config::CoreMlLayout;
use crate::error::{DiscoveryError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `ArrayFeatureType.ArrayDataType` values.
mod array_data_type {
    pub const FLOAT32: u64 = 65568;
    pub const FLOAT16: u64 = 65552;
    pub const INT32: u64 = 131104;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    item_info_entries: HashMap<String, ManifestItem>,
    root_model_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestItem {
    path: String,
}

pub(crate) fn read_package(package: &Path) -> Result<ModelInterface> {
    let spec_path = resolve_spec_path(package)?;
    debug!("Reading model spec {}", spec_path.display());

    let file = std::fs::File::open(&spec_path)
        .map_err(|e| DiscoveryError::io_with_path(e, &spec_path))?;
    let mut data = Vec::new();
    file.take(CoreMlLayout::MAX_SPEC_BYTES + 1)
        .read_to_end(&mut data)
        .map_err(|e| DiscoveryError::io_with_path(e, &spec_path))?;
    if data.len() as u64 > CoreMlLayout::MAX_SPEC_BYTES {
        return Err(DiscoveryError::artifact_read(
            package,
            format!("model spec {} is too large", spec_path.display()),
        ));
    }

    parse_model(&data)
}

/// Locate the protobuf spec inside a package.
fn resolve_spec_path(package: &Path) -> Result<PathBuf> {
    let data_dir = package.join(CoreMlLayout::PACKAGE_DATA_DIR);
    let manifest_path = package.join(CoreMlLayout::PACKAGE_MANIFEST);

    if manifest_path.is_file() {
        let contents = std::fs::read_to_string(&manifest_path)
            .map_err(|e| DiscoveryError::io_with_path(e, &manifest_path))?;
        let manifest: Manifest = serde_json::from_str(&contents)?;

        let root_item = manifest
            .root_model_identifier
            .as_ref()
            .and_then(|id| manifest.item_info_entries.get(id));
        if let Some(item) = root_item {
            return Ok(data_dir.join(&item.path));
        }
    }

    let fallback = data_dir.join(CoreMlLayout::PACKAGE_DEFAULT_SPEC);
    if fallback.is_file() {
        Ok(fallback)
    } else {
        Err(DiscoveryError::artifact_read(
            package,
            "package has no root model specification",
        ))
    }
}

/// Decode the interface from a serialized `Model` message.
pub(crate) fn parse_model(data: &[u8]) -> Result<ModelInterface> {
    let mut reader = ProtobufReader::new(data);
    let mut interface = ModelInterface::default();

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (2, wire::LEN) => interface = parse_description(reader.read_bytes()?)?,
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    Ok(interface)
}

#[derive(Debug, Default)]
struct FunctionDescription {
    name: String,
    inputs: Vec<ArtifactSignature>,
    outputs: Vec<ArtifactSignature>,
}

fn parse_description(data: &[u8]) -> Result<ModelInterface> {
    let mut reader = ProtobufReader::new(data);
    let mut interface = ModelInterface::default();
    let mut functions = Vec::new();
    let mut default_function: Option<String> = None;

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, wire::LEN) => interface.inputs.push(parse_feature(reader.read_bytes()?)?),
            (10, wire::LEN) => interface.outputs.push(parse_feature(reader.read_bytes()?)?),
            (20, wire::LEN) => functions.push(parse_function(reader.read_bytes()?)?),
            (21, wire::LEN) => default_function = Some(reader.read_string()?),
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    // Multi-function packages leave the top-level interface empty and
    // declare it per function instead.
    if interface.inputs.is_empty() && interface.outputs.is_empty() && !functions.is_empty() {
        let index = default_function
            .as_ref()
            .and_then(|name| functions.iter().position(|f| &f.name == name))
            .unwrap_or(0);
        interface.inputs = std::mem::take(&mut functions[index].inputs);
        interface.outputs = std::mem::take(&mut functions[index].outputs);
    }

    interface.functions = functions.into_iter().map(|f| f.name).collect();
    Ok(interface)
}

fn parse_function(data: &[u8]) -> Result<FunctionDescription> {
    let mut reader = ProtobufReader::new(data);
    let mut function = FunctionDescription::default();

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, wire::LEN) => function.name = reader.read_string()?,
            (2, wire::LEN) => function.inputs.push(parse_feature(reader.read_bytes()?)?),
            (3, wire::LEN) => function.outputs.push(parse_feature(reader.read_bytes()?)?),
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    Ok(function)
}

fn parse_feature(data: &[u8]) -> Result<ArtifactSignature> {
    let mut reader = ProtobufReader::new(data);
    let mut name = String::new();
    let mut shape = Vec::new();
    let mut data_type = DataType::Unknown;

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, wire::LEN) => name = reader.read_string()?,
            (3, wire::LEN) => {
                if let Some((dims, dtype)) = parse_feature_type(reader.read_bytes()?)? {
                    shape = dims;
                    data_type = dtype;
                }
            }
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    Ok(ArtifactSignature::new(name, shape, data_type))
}

/// Returns the array shape and element type if the feature is a multi-array.
fn parse_feature_type(data: &[u8]) -> Result<Option<(Vec<usize>, DataType)>> {
    let mut reader = ProtobufReader::new(data);
    let mut array = None;

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (5, wire::LEN) => array = Some(parse_array_type(reader.read_bytes()?)?),
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    Ok(array)
}

fn parse_array_type(data: &[u8]) -> Result<(Vec<usize>, DataType)> {
    let mut reader = ProtobufReader::new(data);
    let mut raw_dims = Vec::new();
    let mut data_type = DataType::Unknown;

    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, wire_type) => reader.read_repeated_varint(wire_type, &mut raw_dims)?,
            (2, wire::VARINT) => {
                data_type = match reader.read_varint()? {
                    array_data_type::FLOAT16 => DataType::Float16,
                    array_data_type::FLOAT32 => DataType::Float32,
                    array_data_type::INT32 => DataType::Int32,
                    _ => DataType::Unknown,
                }
            }
            (_, wire_type) => reader.skip_field(wire_type)?,
        }
    }

    // int64 dimensions; negative values mean "unbounded" and record as 0
    let shape = raw_dims
        .into_iter()
        .map(|d| usize::try_from(d as i64).unwrap_or(0))
        .collect();
    Ok((shape, data_type))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Tiny protobuf encoder for building model specs in tests.

    fn varint(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    fn len_field(field: u32, payload: &[u8], out: &mut Vec<u8>) {
        varint(((field as u64) << 3) | 2, out);
        varint(payload.len() as u64, out);
        out.extend_from_slice(payload);
    }

    /// Encode a `FeatureDescription` with a multi-array type.
    pub fn feature(name: &str, shape: &[u64], data_type: u64) -> Vec<u8> {
        let mut packed = Vec::new();
        for dim in shape {
            varint(*dim, &mut packed);
        }
        let mut array = Vec::new();
        len_field(1, &packed, &mut array);
        varint(2 << 3, &mut array);
        varint(data_type, &mut array);

        let mut feature_type = Vec::new();
        len_field(5, &array, &mut feature_type);

        let mut out = Vec::new();
        len_field(1, name.as_bytes(), &mut out);
        len_field(3, &feature_type, &mut out);
        out
    }

    /// Encode a `Model` message with the given top-level interface.
    pub fn model(inputs: &[Vec<u8>], outputs: &[Vec<u8>]) -> Vec<u8> {
        let mut description = Vec::new();
        for input in inputs {
            len_field(1, input, &mut description);
        }
        for output in outputs {
            len_field(10, output, &mut description);
        }
        let mut out = Vec::new();
        // specificationVersion = 8
        varint(1 << 3, &mut out);
        varint(8, &mut out);
        len_field(2, &description, &mut out);
        out
    }

    /// Encode a multi-function `Model` message.
    pub fn multifunction_model(
        functions: &[(&str, Vec<Vec<u8>>, Vec<Vec<u8>>)],
        default_function: &str,
    ) -> Vec<u8> {
        let mut description = Vec::new();
        for (name, inputs, outputs) in functions {
            let mut function = Vec::new();
            len_field(1, name.as_bytes(), &mut function);
            for input in inputs {
                len_field(2, input, &mut function);
            }
            for output in outputs {
                len_field(3, output, &mut function);
            }
            len_field(20, &function, &mut description);
        }
        len_field(21, default_function.as_bytes(), &mut description);
        let mut out = Vec::new();
        len_field(2, &description, &mut out);
        out
    }

    pub const FLOAT16: u64 = 65552;
    pub const FLOAT32: u64 = 65568;
    pub const INT32: u64 = 131104;
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_model_interface() {
        let spec = model(
            &[feature("input_ids", &[1, 64], INT32)],
            &[feature("hidden_states", &[1, 64, 1024], FLOAT16)],
        );

        let interface = parse_model(&spec).unwrap();
        assert_eq!(interface.inputs.len(), 1);
        assert_eq!(interface.inputs[0].name, "input_ids");
        assert_eq!(interface.inputs[0].shape, vec![1, 64]);
        assert_eq!(interface.inputs[0].data_type, DataType::Int32);
        assert_eq!(interface.outputs[0].shape, vec![1, 64, 1024]);
        assert_eq!(interface.outputs[0].data_type, DataType::Float16);
        assert!(interface.functions.is_empty());
    }

    #[test]
    fn test_unrecognized_array_type_is_unknown() {
        // DOUBLE
        let spec = model(&[feature("x", &[2, 2], 65600)], &[]);
        let interface = parse_model(&spec).unwrap();
        assert_eq!(interface.inputs[0].data_type, DataType::Unknown);
        assert_eq!(interface.inputs[0].shape, vec![2, 2]);
    }

    #[test]
    fn test_multifunction_uses_default_function() {
        let spec = multifunction_model(
            &[
                (
                    "infer",
                    vec![feature("causal_mask", &[1, 1, 1, 256], FLOAT16)],
                    vec![feature("output_hidden_states", &[1, 1, 1024], FLOAT16)],
                ),
                (
                    "prefill",
                    vec![feature("causal_mask", &[1, 1, 64, 512], FLOAT16)],
                    vec![feature("output_hidden_states", &[1, 64, 1024], FLOAT16)],
                ),
            ],
            "prefill",
        );

        let interface = parse_model(&spec).unwrap();
        assert_eq!(interface.functions, vec!["infer", "prefill"]);
        assert_eq!(interface.inputs[0].shape, vec![1, 1, 64, 512]);
    }

    #[test]
    fn test_truncated_spec_is_error() {
        let mut spec = model(&[feature("input_ids", &[1, 64], INT32)], &[]);
        spec.truncate(spec.len() - 3);
        assert!(parse_model(&spec).is_err());
    }

    #[test]
    fn test_read_package_via_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let package = temp_dir.path().join("qwen_lm_head.mlpackage");
        let spec_dir = package.join("Data/com.apple.CoreML");
        std::fs::create_dir_all(&spec_dir).unwrap();
        std::fs::write(
            spec_dir.join("head.mlmodel"),
            model(&[], &[feature("logits1", &[1, 1, 75000], FLOAT16)]),
        )
        .unwrap();
        std::fs::write(
            package.join("Manifest.json"),
            r#"{
                "fileFormatVersion": "1.0.0",
                "itemInfoEntries": {
                    "A1": {"author": "com.apple.CoreML", "path": "com.apple.CoreML/head.mlmodel"},
                    "B2": {"author": "com.apple.CoreML", "path": "com.apple.CoreML/weights"}
                },
                "rootModelIdentifier": "A1"
            }"#,
        )
        .unwrap();

        let interface = read_package(&package).unwrap();
        assert_eq!(interface.outputs[0].name, "logits1");
        assert_eq!(interface.outputs[0].shape, vec![1, 1, 75000]);
    }

    #[test]
    fn test_read_package_default_spec_location() {
        let temp_dir = TempDir::new().unwrap();
        let package = temp_dir.path().join("emb.mlpackage");
        let spec_dir = package.join("Data/com.apple.CoreML");
        std::fs::create_dir_all(&spec_dir).unwrap();
        std::fs::write(
            spec_dir.join("model.mlmodel"),
            model(&[feature("input_ids", &[1, 1], INT32)], &[]),
        )
        .unwrap();

        let interface = read_package(&package).unwrap();
        assert_eq!(interface.inputs[0].shape, vec![1, 1]);
    }

    #[test]
    fn test_read_package_without_spec() {
        let temp_dir = TempDir::new().unwrap();
        let package = temp_dir.path().join("empty.mlpackage");
        std::fs::create_dir_all(&package).unwrap();

        let err = read_package(&package).unwrap_err();
        assert!(matches!(err, DiscoveryError::ArtifactRead { .. }));
    }
}
