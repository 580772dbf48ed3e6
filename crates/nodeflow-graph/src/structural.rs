use std::collections::HashSet;

use serde::Serialize;

use crate::model::{GraphModel, NodeCategory};

/// Terminal failure states, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralIssue {
    EmptyWorkflow,
    MissingInputNode,
    MissingOutputNode,
    NoConnections,
    NoPathToOutput,
}

impl StructuralIssue {
    pub fn code(self) -> &'static str {
        match self {
            Self::EmptyWorkflow => "empty workflow",
            Self::MissingInputNode => "missing input node",
            Self::MissingOutputNode => "missing output node",
            Self::NoConnections => "no connections",
            Self::NoPathToOutput => "no path to output",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::EmptyWorkflow => "The workflow is empty",
            Self::MissingInputNode => "The workflow has no input node",
            Self::MissingOutputNode => "The workflow has no output node",
            Self::NoConnections => "The nodes are not connected",
            Self::NoPathToOutput => "Data cannot reach an output node",
        }
    }

    pub fn details(self) -> &'static str {
        match self {
            Self::EmptyWorkflow => "Add a data input node and an output node to get started.",
            Self::MissingInputNode => "Add a node that loads data into the workflow.",
            Self::MissingOutputNode => "Add a node that displays the results.",
            Self::NoConnections => "Connect the nodes to define how data flows between them.",
            Self::NoPathToOutput => {
                "Connect an input node to an output node, directly or through processing steps."
            }
        }
    }
}

impl std::fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralReport {
    pub is_valid: bool,
    pub reason: Option<StructuralIssue>,
    pub message: String,
    pub details: String,
}

impl StructuralReport {
    fn failed(issue: StructuralIssue) -> Self {
        Self {
            is_valid: false,
            reason: Some(issue),
            message: issue.message().to_string(),
            details: issue.details().to_string(),
        }
    }
}

/// Checks that a graph can carry data from an input node to an output node.
pub struct StructuralValidator;

impl StructuralValidator {
    /// Validate the graph. Pure: the same graph always yields the same report.
    pub fn validate(graph: &GraphModel) -> StructuralReport {
        if graph.is_empty() {
            return StructuralReport::failed(StructuralIssue::EmptyWorkflow);
        }
        if graph.nodes_in(NodeCategory::Input).next().is_none() {
            return StructuralReport::failed(StructuralIssue::MissingInputNode);
        }
        if graph.nodes_in(NodeCategory::Output).next().is_none() {
            return StructuralReport::failed(StructuralIssue::MissingOutputNode);
        }
        if graph.edge_count() == 0 {
            return StructuralReport::failed(StructuralIssue::NoConnections);
        }
        if !input_reaches_output(graph) {
            return StructuralReport::failed(StructuralIssue::NoPathToOutput);
        }

        StructuralReport {
            is_valid: true,
            reason: None,
            message: "The workflow is ready to run".to_string(),
            details: format!("Workflow has {} nodes", graph.node_count()),
        }
    }
}

/// Depth-first search from every input node; stops at the first output node
/// reached by any of them.
fn input_reaches_output(graph: &GraphModel) -> bool {
    let adjacency = graph.adjacency();
    let outputs: HashSet<&str> = graph
        .nodes_in(NodeCategory::Output)
        .map(|n| n.id.as_str())
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    for input in graph.nodes_in(NodeCategory::Input) {
        let mut stack = vec![input.id.as_str()];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if outputs.contains(id) {
                return true;
            }
            if let Some(next) = adjacency.get(id) {
                stack.extend(next.iter().copied());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};

    fn node(id: &str, category: NodeCategory) -> Node {
        Node::new(id, format!("{}-template", id), category).with_capacity(4, 4)
    }

    fn graph(nodes: &[(&str, NodeCategory)], edges: &[(&str, &str)]) -> GraphModel {
        let mut g = GraphModel::new();
        for (id, category) in nodes {
            g.add_node(node(id, *category)).unwrap();
        }
        for (s, t) in edges {
            g.insert_edge(Edge::new(*s, *t)).unwrap();
        }
        g
    }

    #[test]
    fn test_empty_workflow() {
        let report = StructuralValidator::validate(&GraphModel::new());
        assert!(!report.is_valid);
        assert_eq!(report.reason, Some(StructuralIssue::EmptyWorkflow));
        assert_eq!(report.reason.unwrap().code(), "empty workflow");
    }

    #[test]
    fn test_missing_input() {
        let g = graph(&[("show", NodeCategory::Output)], &[]);
        assert_eq!(
            StructuralValidator::validate(&g).reason,
            Some(StructuralIssue::MissingInputNode)
        );
    }

    #[test]
    fn test_missing_output() {
        let g = graph(&[("load", NodeCategory::Input)], &[]);
        let report = StructuralValidator::validate(&g);
        assert_eq!(report.reason, Some(StructuralIssue::MissingOutputNode));
        assert_eq!(report.reason.unwrap().code(), "missing output node");
    }

    #[test]
    fn test_no_connections() {
        let g = graph(
            &[("load", NodeCategory::Input), ("show", NodeCategory::Output)],
            &[],
        );
        let report = StructuralValidator::validate(&g);
        assert_eq!(report.reason, Some(StructuralIssue::NoConnections));
        assert_eq!(report.reason.unwrap().code(), "no connections");
    }

    #[test]
    fn test_no_path_when_edges_point_away() {
        let g = graph(
            &[
                ("load", NodeCategory::Input),
                ("clean", NodeCategory::Processing),
                ("show", NodeCategory::Output),
            ],
            &[("load", "clean"), ("show", "clean")],
        );
        assert_eq!(
            StructuralValidator::validate(&g).reason,
            Some(StructuralIssue::NoPathToOutput)
        );
    }

    #[test]
    fn test_valid_linear_chain() {
        let g = graph(
            &[
                ("load", NodeCategory::Input),
                ("clean", NodeCategory::Processing),
                ("show", NodeCategory::Output),
            ],
            &[("load", "clean"), ("clean", "show")],
        );
        let report = StructuralValidator::validate(&g);
        assert!(report.is_valid);
        assert_eq!(report.reason, None);
        assert_eq!(report.details, "Workflow has 3 nodes");
    }

    #[test]
    fn test_one_input_reaching_one_output_is_enough() {
        let g = graph(
            &[
                ("load-a", NodeCategory::Input),
                ("load-b", NodeCategory::Input),
                ("show-a", NodeCategory::Output),
                ("show-b", NodeCategory::Output),
                ("sort", NodeCategory::Processing),
            ],
            &[("load-b", "sort"), ("sort", "show-b")],
        );
        assert!(StructuralValidator::validate(&g).is_valid);
    }

    #[test]
    fn test_cycle_does_not_loop_forever() {
        let g = graph(
            &[
                ("load", NodeCategory::Input),
                ("a", NodeCategory::Processing),
                ("b", NodeCategory::Processing),
                ("show", NodeCategory::Output),
            ],
            &[("load", "a"), ("a", "b"), ("b", "a")],
        );
        assert_eq!(
            StructuralValidator::validate(&g).reason,
            Some(StructuralIssue::NoPathToOutput)
        );
    }

    #[test]
    fn test_validation_is_pure() {
        let g = graph(
            &[("load", NodeCategory::Input), ("show", NodeCategory::Output)],
            &[("load", "show")],
        );
        let first = StructuralValidator::validate(&g);
        let second = StructuralValidator::validate(&g.clone());
        assert_eq!(first, second);
    }
}
