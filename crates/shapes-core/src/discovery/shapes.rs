//! Global shape inference across the components of one assembly.
//!
//! [`ShapeModel`] is a plain value. Each component's evidence is folded in by
//! [`aggregate`], which returns a new model and never mutates its input.
//!
//! Context length has two update policies that are intentionally different:
//! - embeddings `input_ids`: set when the second dimension is greater than 1
//!   (a dimension of 1 marks a single-token model, not a capacity)
//! - FFN `causal_mask`: set only when larger than the current value

use super::classifier::ComponentRole;
use crate::artifact::SignatureMap;
use crate::config::ShapeDefaults;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The four global structural parameters of an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeModel {
    pub batch_size: usize,
    pub context_length: usize,
    pub hidden_size: usize,
    pub vocab_size: usize,
}

impl Default for ShapeModel {
    fn default() -> Self {
        Self {
            batch_size: ShapeDefaults::BATCH_SIZE,
            context_length: ShapeDefaults::CONTEXT_LENGTH,
            hidden_size: ShapeDefaults::HIDDEN_SIZE,
            vocab_size: ShapeDefaults::VOCAB_SIZE,
        }
    }
}

fn name_contains(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(needle)
}

/// Fold one component's declared signatures into the shape model.
///
/// Roles other than embeddings, FFN and LM head leave the model unchanged.
pub fn aggregate(
    model: ShapeModel,
    role: &ComponentRole,
    inputs: &SignatureMap,
    outputs: &SignatureMap,
) -> ShapeModel {
    match role {
        ComponentRole::Embeddings => from_embeddings(model, inputs, outputs),
        ComponentRole::LmHead => from_lm_head(model, outputs),
        role if role.is_ffn() => from_ffn(model, inputs),
        _ => model,
    }
}

/// Fold a sequence of components, starting from the default seeds.
pub fn fold_components<'a, I>(components: I) -> ShapeModel
where
    I: IntoIterator<Item = (&'a ComponentRole, &'a SignatureMap, &'a SignatureMap)>,
{
    components
        .into_iter()
        .fold(ShapeModel::default(), |model, (role, inputs, outputs)| {
            aggregate(model, role, inputs, outputs)
        })
}

fn from_embeddings(model: ShapeModel, inputs: &SignatureMap, outputs: &SignatureMap) -> ShapeModel {
    let mut next = model;

    for (name, sig) in inputs {
        if !name_contains(name, "input_ids") || sig.shape.len() < 2 {
            continue;
        }
        let batch_size = sig.shape[0];
        let context_hint = sig.shape[1];

        if batch_size > 0 {
            next.batch_size = batch_size;
        }
        if context_hint > 1 {
            next.context_length = context_hint;
        }
        debug!(
            "Updated batch_size: {}, context hint: {}",
            batch_size, context_hint
        );
    }

    for (name, sig) in outputs {
        if !name_contains(name, "hidden") || sig.shape.len() < 3 {
            continue;
        }
        match sig.last_dim() {
            Some(hidden_size) if hidden_size > 0 => {
                next.hidden_size = hidden_size;
                debug!("Updated hidden_size: {}", hidden_size);
            }
            _ => {}
        }
    }

    next
}

fn from_lm_head(model: ShapeModel, outputs: &SignatureMap) -> ShapeModel {
    // Quantized heads split the vocabulary across several logits outputs
    let parts: Vec<usize> = outputs
        .iter()
        .filter(|(name, sig)| name_contains(name, "logits") && sig.shape.len() >= 3)
        .filter_map(|(_, sig)| sig.last_dim())
        .collect();
    let total: usize = parts.iter().sum();

    if total > 0 {
        debug!(
            "Updated vocab_size: {} (from {} parts)",
            total,
            parts.len()
        );
        ShapeModel {
            vocab_size: total,
            ..model
        }
    } else {
        model
    }
}

fn from_ffn(model: ShapeModel, inputs: &SignatureMap) -> ShapeModel {
    let mut next = model;

    for (name, sig) in inputs {
        if !name_contains(name, "causal_mask") || sig.shape.len() < 4 {
            continue;
        }
        if let Some(context_length) = sig.last_dim() {
            if context_length > next.context_length {
                next.context_length = context_length;
                debug!("Updated context_length from causal_mask: {}", context_length);
            }
        }
    }

    next
}
