//! Schema projection capability.
//!
//! After an item is decrypted the projector hands it, with the selection the
//! caller asked for, to a [`ProjectionEngine`] that returns only the
//! requested fields. Applications with a real schema plug in their own
//! engine; [`FieldProjector`] filters purely by field names.

use crate::error::ClientResult;
use crate::query::QueryNode;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Executes a sub-selection against a plaintext value.
#[async_trait]
pub trait ProjectionEngine: Send + Sync {
    async fn project(
        &self,
        root: &Value,
        selection: &QueryNode,
        type_name: Option<&str>,
    ) -> ClientResult<Value>;
}

/// Structural projection: keeps the selected fields, renames aliased ones,
/// and maps nested selections over arrays. Unknown fields become `null`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldProjector;

#[async_trait]
impl ProjectionEngine for FieldProjector {
    async fn project(
        &self,
        root: &Value,
        selection: &QueryNode,
        _type_name: Option<&str>,
    ) -> ClientResult<Value> {
        Ok(select(root, selection))
    }
}

fn select(value: &Value, selection: &QueryNode) -> Value {
    if selection.is_leaf() {
        return value.clone();
    }
    match value {
        Value::Array(elements) => Value::Array(elements.iter().map(|v| select(v, selection)).collect()),
        Value::Object(fields) => {
            let mut out = Map::with_capacity(selection.children.len());
            for child in &selection.children {
                let projected = fields
                    .get(&child.name)
                    .map(|v| select(v, child))
                    .unwrap_or(Value::Null);
                out.insert(child.response_key().to_string(), projected);
            }
            Value::Object(out)
        }
        scalar => scalar.clone(),
    }
}
