use nodeflow_graph::{Connection, ConnectionValidator, GraphModel, TemplateCatalog};

/// Small review-analysis catalog covering every node category.
pub const TEST_CATALOG: &str = r#"{
    "templates": [
        {
            "id": "load-reviews",
            "name": "Load Reviews",
            "category": "input",
            "default_config": {"dataset": "shoes"},
            "schema": {"fields": [
                {"key": "dataset", "label": "Dataset", "type": "select", "required": true,
                 "options": [{"value": "shoes"}, {"value": "books"}]}
            ]}
        },
        {
            "id": "clean-reviews",
            "name": "Clean Reviews",
            "category": "processing",
            "default_config": {"remove_duplicates": true}
        },
        {
            "id": "filter-reviews",
            "name": "Filter Reviews",
            "category": "processing",
            "recommends": [{"template_id": "clean-reviews", "message": "Clean reviews before filtering them."}]
        },
        {
            "id": "sentiment-analysis",
            "name": "Sentiment Analysis",
            "category": "analysis",
            "schema": {"fields": [
                {"key": "outputs", "label": "Outputs", "type": "multi_select", "required": true,
                 "options": [
                    {"value": "score"},
                    {"value": "aspects", "label": "Aspect breakdown",
                     "requires_nodes": ["clean-reviews"], "lock_type": "disable"}
                 ]}
            ]},
            "recommends": [{"template_id": "clean-reviews", "message": "Sentiment is more accurate on cleaned reviews.", "severity": "info"}]
        },
        {
            "id": "show-results",
            "name": "Show Results",
            "category": "output",
            "default_config": {"format": "table"},
            "schema": {"fields": [
                {"key": "format", "label": "Format", "type": "select", "required": true,
                 "options": [{"value": "table"}, {"value": "chart"}]}
            ]}
        }
    ]
}"#;

pub fn test_catalog() -> TemplateCatalog {
    TemplateCatalog::from_json(TEST_CATALOG).expect("test catalog parses")
}

/// `load -> clean -> show`, fully configured and ready to run.
pub fn linear_graph() -> GraphModel {
    let catalog = test_catalog();
    let mut graph = GraphModel::new();
    for (template, id) in [
        ("load-reviews", "load"),
        ("clean-reviews", "clean"),
        ("show-results", "show"),
    ] {
        let node = catalog.create_node(template, id).expect("template exists");
        graph.add_node(node).expect("unique node id");
    }

    let validator = ConnectionValidator::default();
    for (source, target) in [("load", "clean"), ("clean", "show")] {
        validator
            .connect(&mut graph, &Connection::new(source, target))
            .expect("fixture connection is valid");
    }
    graph
}
