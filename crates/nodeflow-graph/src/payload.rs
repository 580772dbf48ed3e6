use serde::{Deserialize, Serialize};

use crate::model::GraphModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadNodeData {
    pub template_id: String,
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadNode {
    pub id: String,
    pub data: PayloadNodeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadEdge {
    pub source: String,
    pub target: String,
    pub source_handle: String,
    pub target_handle: String,
}

/// The graph as the orchestrator sees it: no layout, no capacities, no
/// categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    pub nodes: Vec<PayloadNode>,
    pub edges: Vec<PayloadEdge>,
}

impl ExecutionPayload {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&GraphModel> for ExecutionPayload {
    fn from(graph: &GraphModel) -> Self {
        Self {
            nodes: graph
                .nodes()
                .iter()
                .map(|n| PayloadNode {
                    id: n.id.clone(),
                    data: PayloadNodeData {
                        template_id: n.template_id().to_string(),
                        config: n.config.clone(),
                        label: n.label.clone(),
                    },
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|e| PayloadEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    source_handle: e.source_handle.clone(),
                    target_handle: e.target_handle.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node, NodeCategory};
    use serde_json::json;

    #[test]
    fn test_payload_shape() {
        let mut g = GraphModel::new();
        g.add_node(
            Node::new("load", "load-reviews", NodeCategory::Input)
                .with_config("dataset", json!("shoes"))
                .at(10.0, 20.0),
        )
        .unwrap();
        g.add_node(Node::new("show", "show-results", NodeCategory::Output).with_label("Results"))
            .unwrap();
        g.insert_edge(Edge::new("load", "show")).unwrap();

        let value = ExecutionPayload::from(&g).to_value();
        assert_eq!(
            value,
            json!({
                "nodes": [
                    {"id": "load", "data": {"template_id": "load-reviews", "config": {"dataset": "shoes"}}},
                    {"id": "show", "data": {"template_id": "show-results", "config": {}, "label": "Results"}}
                ],
                "edges": [
                    {"source": "load", "target": "show", "sourceHandle": "output-0", "targetHandle": "input-0"}
                ]
            })
        );
    }

    #[test]
    fn test_empty_graph_payload() {
        let payload = ExecutionPayload::from(&GraphModel::new());
        assert_eq!(payload.to_value(), json!({"nodes": [], "edges": []}));
    }
}
