use serde::Serialize;

use crate::catalog::SchemaProvider;
use crate::config_check::{ConfigReport, ConfigValidator};
use crate::model::GraphModel;
use crate::structural::{StructuralReport, StructuralValidator};

/// Combined gate the run action consults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowValidation {
    pub structural: StructuralReport,
    /// Only computed once the structure is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigReport>,
    pub can_execute: bool,
}

/// Structural check first; configuration is only checked on a sound graph.
pub fn validate_workflow(graph: &GraphModel, schemas: &dyn SchemaProvider) -> WorkflowValidation {
    let structural = StructuralValidator::validate(graph);
    if !structural.is_valid {
        return WorkflowValidation {
            structural,
            config: None,
            can_execute: false,
        };
    }

    let config = ConfigValidator::validate(graph, schemas);
    let can_execute = config.is_valid();
    WorkflowValidation {
        structural,
        config: Some(config),
        can_execute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TemplateCatalog;
    use crate::connection::{Connection, ConnectionValidator};
    use crate::structural::StructuralIssue;
    use serde_json::json;

    const CATALOG: &str = r#"{"templates": [
        {"id": "load-reviews", "name": "Load Reviews", "category": "input",
         "default_config": {"dataset": "shoes"},
         "schema": {"fields": [{"key": "dataset", "type": "select", "required": true}]}},
        {"id": "clean-reviews", "name": "Clean Reviews", "category": "processing"},
        {"id": "show-results", "name": "Show Results", "category": "output",
         "schema": {"fields": [{"key": "format", "label": "Format", "type": "select", "required": true}]}}
    ]}"#;

    fn build(catalog: &TemplateCatalog) -> GraphModel {
        let mut g = GraphModel::new();
        g.add_node(catalog.create_node("load-reviews", "load").unwrap()).unwrap();
        g.add_node(catalog.create_node("clean-reviews", "clean").unwrap()).unwrap();
        g.add_node(catalog.create_node("show-results", "show").unwrap()).unwrap();
        let validator = ConnectionValidator::default();
        validator.connect(&mut g, &Connection::new("load", "clean")).unwrap();
        validator.connect(&mut g, &Connection::new("clean", "show")).unwrap();
        g
    }

    #[test]
    fn test_valid_chain_can_execute() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let mut g = build(&catalog);
        g.update_config("show", "format", json!("table")).unwrap();

        let result = validate_workflow(&g, &catalog);
        assert!(result.structural.is_valid);
        assert!(result.config.as_ref().unwrap().is_valid());
        assert!(result.can_execute);
    }

    #[test]
    fn test_config_errors_block_execution() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let g = build(&catalog);

        let result = validate_workflow(&g, &catalog);
        assert!(result.structural.is_valid);
        assert!(!result.can_execute);
        let errors = &result.config.unwrap().errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node_id, "show");
        assert_eq!(errors[0].message, "Format is required");
    }

    #[test]
    fn test_structural_failure_skips_config() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let mut g = GraphModel::new();
        g.add_node(catalog.create_node("load-reviews", "load").unwrap()).unwrap();

        let result = validate_workflow(&g, &catalog);
        assert_eq!(result.structural.reason, Some(StructuralIssue::MissingOutputNode));
        assert!(result.config.is_none());
        assert!(!result.can_execute);
    }
}
