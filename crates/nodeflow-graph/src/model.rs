use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use nodeflow_core::error::{NodeflowError, Result};

/// Handle used when an edge does not name its source handle.
pub const DEFAULT_SOURCE_HANDLE: &str = "output-0";
/// Handle used when an edge does not name its target handle.
pub const DEFAULT_TARGET_HANDLE: &str = "input-0";

fn default_source_handle() -> String {
    DEFAULT_SOURCE_HANDLE.to_string()
}

fn default_target_handle() -> String {
    DEFAULT_TARGET_HANDLE.to_string()
}

/// Layout position. Irrelevant to validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Tag used by structural checks and soft-dependency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Input,
    Processing,
    Analysis,
    Output,
    #[serde(other)]
    Other,
}

impl NodeCategory {
    /// Capacities a node of this category gets when none are declared.
    pub fn default_capacity(self) -> (usize, usize) {
        match self {
            Self::Input => (0, 1),
            Self::Output => (1, 0),
            _ => (1, 1),
        }
    }
}

/// Which end of an edge a handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSide {
    /// Outgoing handle on the edge's source node.
    Source,
    /// Incoming handle on the edge's target node.
    Target,
}

/// A typed unit in the workflow graph.
///
/// `template_id` and the capacities are fixed once the node exists, so they
/// are only settable through the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    input_capacity: usize,
    output_capacity: usize,
    pub category: NodeCategory,
}

impl Node {
    /// Create a node with the category's default capacities.
    pub fn new(id: impl Into<String>, template_id: impl Into<String>, category: NodeCategory) -> Self {
        let (input_capacity, output_capacity) = category.default_capacity();
        Self {
            id: id.into(),
            template_id: template_id.into(),
            label: None,
            position: Position::default(),
            config: serde_json::Map::new(),
            input_capacity,
            output_capacity,
            category,
        }
    }

    /// Override the handle capacities.
    pub fn with_capacity(mut self, input: usize, output: usize) -> Self {
        self.input_capacity = input;
        self.output_capacity = output;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn input_capacity(&self) -> usize {
        self.input_capacity
    }

    pub fn output_capacity(&self) -> usize {
        self.output_capacity
    }

    /// Capacity of every handle on the given side.
    pub fn capacity(&self, side: HandleSide) -> usize {
        match side {
            HandleSide::Source => self.output_capacity,
            HandleSide::Target => self.input_capacity,
        }
    }
}

/// A directed connection between two node handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_source_handle")]
    pub source_handle: String,
    #[serde(default = "default_target_handle")]
    pub target_handle: String,
}

impl Edge {
    /// Create an edge between the canonical handles of two nodes.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_handles(source, default_source_handle(), target, default_target_handle())
    }

    pub fn with_handles(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let source_handle = source_handle.into();
        let target_handle = target_handle.into();
        Self {
            id: format!("{}:{}->{}:{}", source, source_handle, target, target_handle),
            source,
            target,
            source_handle,
            target_handle,
        }
    }

    /// Whether this edge occupies `handle` on `node_id` from the given side.
    pub fn occupies(&self, node_id: &str, side: HandleSide, handle: &str) -> bool {
        match side {
            HandleSide::Source => self.source == node_id && self.source_handle == handle,
            HandleSide::Target => self.target == node_id && self.target_handle == handle,
        }
    }
}

/// A (node, handle) pair holding more edges than the node allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleViolation {
    pub node_id: String,
    pub handle: String,
    pub capacity: usize,
    pub occupancy: usize,
}

#[derive(Deserialize)]
struct WorkflowFile {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

/// In-memory workflow graph.
///
/// Nodes keep insertion order. Every edge references two existing, distinct
/// nodes; the mutation methods refuse anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an editor-exported workflow (`{"nodes": [...], "edges": [...]}`).
    ///
    /// Nodes and edges go through the same checks as interactive edits, and
    /// handle occupancy must respect capacity.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: WorkflowFile =
            serde_json::from_str(json).map_err(|e| NodeflowError::Workflow(e.to_string()))?;

        let mut graph = Self::new();
        for node in file.nodes {
            graph.add_node(node)?;
        }
        for edge in file.edges {
            graph.insert_edge(edge)?;
        }

        if let Some(v) = graph.capacity_violations().into_iter().next() {
            return Err(NodeflowError::Workflow(format!(
                "handle '{}' on node '{}' holds {} edges but allows {}",
                v.handle, v.node_id, v.occupancy, v.capacity
            )));
        }
        Ok(graph)
    }

    /// Read a workflow file from disk.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes carrying the given category tag.
    pub fn nodes_in(&self, category: NodeCategory) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.category == category)
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.contains_node(&node.id) {
            return Err(NodeflowError::DuplicateNode(node.id));
        }
        debug!(node_id = %node.id, template = %node.template_id, "Node added");
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>)> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| NodeflowError::NodeNotFound(id.to_string()))?;
        let node = self.nodes.remove(index);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.source == id || e.target == id);
        self.edges = kept;

        debug!(node_id = %id, edges_removed = removed.len(), "Node removed");
        Ok((node, removed))
    }

    /// Add an edge after checking endpoint invariants only. Capacity is the
    /// connection validator's job.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        if edge.source == edge.target {
            return Err(NodeflowError::InvalidEdge {
                edge: edge.id,
                message: "source and target are the same node".into(),
            });
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(NodeflowError::InvalidEdge {
                    edge: edge.id.clone(),
                    message: format!("node '{}' does not exist", endpoint),
                });
            }
        }
        if self.edge(&edge.id).is_some() {
            return Err(NodeflowError::InvalidEdge {
                edge: edge.id,
                message: "duplicate edge id".into(),
            });
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| NodeflowError::EdgeNotFound(id.to_string()))?;
        Ok(self.edges.remove(index))
    }

    /// Set one configuration field on a node.
    pub fn update_config(
        &mut self,
        node_id: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| NodeflowError::NodeNotFound(node_id.to_string()))?;
        node.config.insert(key.into(), value);
        Ok(())
    }

    /// Edges attached to a specific (node, handle) pair.
    pub fn edges_on_handle(&self, node_id: &str, side: HandleSide, handle: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.occupies(node_id, side, handle))
            .collect()
    }

    /// Number of edges attached to a specific (node, handle) pair.
    pub fn occupancy(&self, node_id: &str, side: HandleSide, handle: &str) -> usize {
        self.edges
            .iter()
            .filter(|e| e.occupies(node_id, side, handle))
            .count()
    }

    /// Outgoing adjacency list keyed by node id.
    pub fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
        adjacency
    }

    /// Every (node, handle) pair whose occupancy exceeds capacity.
    pub fn capacity_violations(&self) -> Vec<HandleViolation> {
        let mut seen = HashSet::new();
        let mut violations = Vec::new();

        for edge in &self.edges {
            let ends = [
                (&edge.source, HandleSide::Source, &edge.source_handle),
                (&edge.target, HandleSide::Target, &edge.target_handle),
            ];
            for (node_id, side, handle) in ends {
                if !seen.insert((node_id.as_str(), handle.as_str(), side == HandleSide::Source)) {
                    continue;
                }
                let Some(node) = self.node(node_id) else {
                    continue;
                };
                let capacity = node.capacity(side);
                let occupancy = self.occupancy(node_id, side, handle);
                if occupancy > capacity {
                    violations.push(HandleViolation {
                        node_id: node_id.clone(),
                        handle: handle.clone(),
                        capacity,
                        occupancy,
                    });
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> GraphModel {
        let mut g = GraphModel::new();
        g.add_node(Node::new("load", "load-reviews", NodeCategory::Input)).unwrap();
        g.add_node(Node::new("clean", "clean-reviews", NodeCategory::Processing)).unwrap();
        g.add_node(Node::new("show", "show-results", NodeCategory::Output)).unwrap();
        g.insert_edge(Edge::new("load", "clean")).unwrap();
        g.insert_edge(Edge::new("clean", "show")).unwrap();
        g
    }

    #[test]
    fn test_node_defaults_from_category() {
        let input = Node::new("a", "load-reviews", NodeCategory::Input);
        assert_eq!((input.input_capacity(), input.output_capacity()), (0, 1));

        let output = Node::new("b", "show-results", NodeCategory::Output);
        assert_eq!(output.capacity(HandleSide::Target), 1);
        assert_eq!(output.capacity(HandleSide::Source), 0);

        let wide = Node::new("c", "sort-reviews", NodeCategory::Processing).with_capacity(3, 2);
        assert_eq!(wide.capacity(HandleSide::Target), 3);
        assert_eq!(wide.capacity(HandleSide::Source), 2);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut g = chain();
        let err = g
            .add_node(Node::new("load", "load-reviews", NodeCategory::Input))
            .unwrap_err();
        assert!(matches!(err, NodeflowError::DuplicateNode(id) if id == "load"));
    }

    #[test]
    fn test_edge_endpoint_invariants() {
        let mut g = chain();
        assert!(g.insert_edge(Edge::new("clean", "clean")).is_err());
        assert!(g.insert_edge(Edge::new("clean", "ghost")).is_err());
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut g = chain();
        let (node, removed) = g.remove_node("clean").unwrap();
        assert_eq!(node.id, "clean");
        assert_eq!(removed.len(), 2);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn test_occupancy_counts_specific_handle() {
        let mut g = chain();
        g.add_node(Node::new("sort", "sort-reviews", NodeCategory::Processing).with_capacity(2, 2))
            .unwrap();
        g.insert_edge(Edge::with_handles("sort", "output-1", "show", "input-0"))
            .unwrap();

        assert_eq!(g.occupancy("show", HandleSide::Target, "input-0"), 2);
        assert_eq!(g.occupancy("sort", HandleSide::Source, "output-0"), 0);
        assert_eq!(g.occupancy("sort", HandleSide::Source, "output-1"), 1);
        assert_eq!(g.capacity_violations().len(), 1);
    }

    #[test]
    fn test_update_config() {
        let mut g = chain();
        g.update_config("clean", "remove_duplicates", serde_json::json!(true))
            .unwrap();
        assert_eq!(
            g.node("clean").unwrap().config.get("remove_duplicates"),
            Some(&serde_json::json!(true))
        );
        assert!(g.update_config("nope", "k", serde_json::json!(1)).is_err());
    }

    #[test]
    fn test_from_json_defaults_handles() {
        let json = r#"{
            "nodes": [
                {"id": "a", "templateId": "load-reviews", "inputCapacity": 0, "outputCapacity": 1, "category": "input"},
                {"id": "b", "templateId": "show-results", "inputCapacity": 1, "outputCapacity": 0, "category": "output",
                 "position": {"x": 300, "y": 40}}
            ],
            "edges": [{"id": "e1", "source": "a", "target": "b"}]
        }"#;
        let g = GraphModel::from_json(json).unwrap();
        assert_eq!(g.edges()[0].source_handle, DEFAULT_SOURCE_HANDLE);
        assert_eq!(g.edges()[0].target_handle, DEFAULT_TARGET_HANDLE);
        assert_eq!(g.node("b").unwrap().position.x, 300.0);
    }

    #[test]
    fn test_from_json_rejects_over_capacity() {
        let json = r#"{
            "nodes": [
                {"id": "a", "templateId": "t", "inputCapacity": 0, "outputCapacity": 1, "category": "input"},
                {"id": "b", "templateId": "t", "inputCapacity": 1, "outputCapacity": 0, "category": "output"},
                {"id": "c", "templateId": "t", "inputCapacity": 0, "outputCapacity": 1, "category": "input"}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "c", "target": "b"}
            ]
        }"#;
        let err = GraphModel::from_json(json).unwrap_err();
        assert!(matches!(err, NodeflowError::Workflow(_)));
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            GraphModel::from_json("{not json"),
            Err(NodeflowError::Workflow(_))
        ));
    }
}
