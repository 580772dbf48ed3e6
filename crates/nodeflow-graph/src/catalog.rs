use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use nodeflow_core::error::{NodeflowError, Result};

use crate::model::{Node, NodeCategory};

/// Kind of value a configuration field holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
    Select,
    #[serde(alias = "multiselect", alias = "multi-select")]
    MultiSelect,
    #[serde(other)]
    Other,
}

/// What happens to an option whose required nodes are absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// The option cannot be selected.
    Disable,
    /// The option stays selectable but carries a warning.
    #[default]
    Warn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
}

/// One selectable value of a select / multi-select field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Templates that must be present upstream for this option to make sense.
    #[serde(default, alias = "requiresNodes")]
    pub requires_nodes: Vec<String>,
    #[serde(default, alias = "lockType")]
    pub lock_type: LockType,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

impl FieldSchema {
    /// Label for messages, falling back to the key.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }
}

/// Per-template description of the node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl ConfigSchema {
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// A soft recommendation: nodes of this template work better when a node of
/// `template_id` is connected to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub template_id: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
}

/// Behavioral definition a node instance is created from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub id: String,
    pub name: String,
    pub category: NodeCategory,
    #[serde(default)]
    pub input_capacity: Option<usize>,
    #[serde(default)]
    pub output_capacity: Option<usize>,
    #[serde(default)]
    pub default_config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub schema: ConfigSchema,
    #[serde(default)]
    pub recommends: Vec<Recommendation>,
}

/// Source of per-template configuration schemas.
pub trait SchemaProvider {
    fn schema(&self, template_id: &str) -> Option<&ConfigSchema>;
}

#[derive(Deserialize)]
struct CatalogFile {
    templates: Vec<NodeTemplate>,
}

/// Set of node templates the editor offers.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, NodeTemplate>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog file (`{"templates": [...]}`).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| NodeflowError::Config(format!("catalog: {}", e)))?;
        let mut catalog = Self::new();
        for template in file.templates {
            catalog.insert(template);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| NodeflowError::ConfigNotFound(path.display().to_string()))?;
        Self::from_json(&content)
    }

    /// Add or replace a template.
    pub fn insert(&mut self, template: NodeTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&NodeTemplate> {
        self.templates.get(template_id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Instantiate a node from a template with its capacities and default config.
    pub fn create_node(&self, template_id: &str, node_id: impl Into<String>) -> Result<Node> {
        let template = self
            .get(template_id)
            .ok_or_else(|| NodeflowError::UnknownTemplate(template_id.to_string()))?;

        let (default_in, default_out) = template.category.default_capacity();
        let mut node = Node::new(node_id, &template.id, template.category)
            .with_capacity(
                template.input_capacity.unwrap_or(default_in),
                template.output_capacity.unwrap_or(default_out),
            )
            .with_label(&template.name);
        node.config = template.default_config.clone();
        Ok(node)
    }
}

impl SchemaProvider for TemplateCatalog {
    fn schema(&self, template_id: &str) -> Option<&ConfigSchema> {
        self.get(template_id).map(|t| &t.schema)
    }
}
