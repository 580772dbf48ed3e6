use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::catalog::{ConfigSchema, FieldSchema, FieldType, SchemaProvider};
use crate::model::{GraphModel, Node};

/// A required field left empty on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub node_id: String,
    pub field_key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    pub errors: Vec<FieldError>,
}

impl ConfigReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors grouped by node id, for display next to each node.
    pub fn by_node(&self) -> BTreeMap<&str, Vec<&FieldError>> {
        let mut grouped: BTreeMap<&str, Vec<&FieldError>> = BTreeMap::new();
        for err in &self.errors {
            grouped.entry(err.node_id.as_str()).or_default().push(err);
        }
        grouped
    }
}

/// Checks required configuration fields against the template schemas.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(graph: &GraphModel, schemas: &dyn SchemaProvider) -> ConfigReport {
        let mut errors = Vec::new();
        for node in graph.nodes() {
            match schemas.schema(node.template_id()) {
                Some(schema) => errors.extend(Self::validate_node(node, schema)),
                None => {
                    warn!(node_id = %node.id, template = %node.template_id(), "No schema for template, skipping config check");
                }
            }
        }
        ConfigReport { errors }
    }

    pub fn validate_node(node: &Node, schema: &ConfigSchema) -> Vec<FieldError> {
        schema
            .required_fields()
            .filter(|field| is_missing(field, node.config.get(&field.key)))
            .map(|field| FieldError {
                node_id: node.id.clone(),
                field_key: field.key.clone(),
                message: format!("{} is required", field.display_name()),
            })
            .collect()
    }
}

/// Missing, null and empty strings always count as unset. An empty list only
/// counts for multi-select fields.
fn is_missing(field: &FieldSchema, value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(serde_json::Value::Array(items)) => {
            field.field_type == FieldType::MultiSelect && items.is_empty()
        }
        Some(_) => false,
    }
}
