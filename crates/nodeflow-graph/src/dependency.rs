use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::catalog::{LockType, Severity, TemplateCatalog};
use crate::model::{GraphModel, Node, NodeCategory};

static EMPTY: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A recommended node kind is absent from the node's neighborhood.
    MissingDependency,
    /// A selected option needs a node kind that is absent.
    OptionDependency,
}

/// Advisory warning. Never blocks execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
    #[serde(rename = "missingNode")]
    pub missing_node: String,
    #[serde(rename = "fieldKey", skip_serializing_if = "Option::is_none")]
    pub field_key: Option<String>,
}

/// Whether one option of a select field can currently be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionAvailability {
    pub value: String,
    pub enabled: bool,
    pub lock_type: LockType,
    pub missing_nodes: Vec<String>,
}

/// Transitive predecessor/successor relations over a graph snapshot.
///
/// Built once per graph; queries are cheap afterwards.
#[derive(Debug, Clone)]
pub struct DependencyAnalyzer {
    predecessors: BTreeMap<String, BTreeSet<String>>,
    successors: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyAnalyzer {
    pub fn new(graph: &GraphModel) -> Self {
        let mut predecessors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut successors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for node in graph.nodes() {
            predecessors.entry(node.id.clone()).or_default();
            successors.entry(node.id.clone()).or_default();
        }
        for edge in graph.edges() {
            predecessors
                .entry(edge.target.clone())
                .or_default()
                .insert(edge.source.clone());
            successors
                .entry(edge.source.clone())
                .or_default()
                .insert(edge.target.clone());
        }

        Self {
            predecessors: transitive_closure(predecessors),
            successors: transitive_closure(successors),
        }
    }

    /// Every node that can reach `node_id`.
    pub fn predecessors(&self, node_id: &str) -> &BTreeSet<String> {
        self.predecessors.get(node_id).unwrap_or(&EMPTY)
    }

    /// Every node reachable from `node_id`.
    pub fn successors(&self, node_id: &str) -> &BTreeSet<String> {
        self.successors.get(node_id).unwrap_or(&EMPTY)
    }

    /// Nodes a recommendation is checked against. Processing steps look both
    /// ways; everything else only looks upstream.
    pub fn related(&self, node: &Node) -> BTreeSet<&str> {
        let mut related: BTreeSet<&str> =
            self.predecessors(&node.id).iter().map(String::as_str).collect();
        if node.category == NodeCategory::Processing {
            related.extend(self.successors(&node.id).iter().map(String::as_str));
        }
        related
    }

    fn related_templates<'g>(&self, graph: &'g GraphModel, node: &Node) -> HashSet<&'g str> {
        self.related(node)
            .into_iter()
            .filter_map(|id| graph.node(id))
            .map(|n| n.template_id())
            .collect()
    }

    /// Warnings for the node currently being edited.
    pub fn warnings_for(
        &self,
        graph: &GraphModel,
        catalog: &TemplateCatalog,
        node_id: &str,
    ) -> Vec<DependencyWarning> {
        let Some(node) = graph.node(node_id) else {
            return vec![];
        };
        let Some(template) = catalog.get(node.template_id()) else {
            return vec![];
        };
        let present = self.related_templates(graph, node);

        let mut warnings: Vec<DependencyWarning> = template
            .recommends
            .iter()
            .filter(|rec| !present.contains(rec.template_id.as_str()))
            .map(|rec| DependencyWarning {
                kind: WarningKind::MissingDependency,
                severity: rec.severity,
                message: rec.message.clone(),
                missing_node: rec.template_id.clone(),
                field_key: None,
            })
            .collect();

        for field in &template.schema.fields {
            let selected = selected_values(node.config.get(&field.key));
            for option in &field.options {
                if !selected.contains(option.value.as_str()) {
                    continue;
                }
                for missing in option
                    .requires_nodes
                    .iter()
                    .filter(|t| !present.contains(t.as_str()))
                {
                    let name = catalog.get(missing).map(|t| t.name.as_str()).unwrap_or(missing.as_str());
                    warnings.push(DependencyWarning {
                        kind: WarningKind::OptionDependency,
                        severity: Severity::Warning,
                        message: option.message.clone().unwrap_or_else(|| {
                            format!(
                                "'{}' works best with a {} node connected",
                                option.label.as_deref().unwrap_or(&option.value),
                                name
                            )
                        }),
                        missing_node: missing.clone(),
                        field_key: Some(field.key.clone()),
                    });
                }
            }
        }

        warnings
    }

    /// Availability of every option of one field on one node.
    pub fn option_availability(
        &self,
        graph: &GraphModel,
        catalog: &TemplateCatalog,
        node_id: &str,
        field_key: &str,
    ) -> Vec<OptionAvailability> {
        let Some(node) = graph.node(node_id) else {
            return vec![];
        };
        let Some(field) = catalog
            .get(node.template_id())
            .and_then(|t| t.schema.field(field_key))
        else {
            return vec![];
        };
        let present = self.related_templates(graph, node);

        field
            .options
            .iter()
            .map(|option| {
                let missing_nodes: Vec<String> = option
                    .requires_nodes
                    .iter()
                    .filter(|t| !present.contains(t.as_str()))
                    .cloned()
                    .collect();
                OptionAvailability {
                    value: option.value.clone(),
                    enabled: missing_nodes.is_empty() || option.lock_type == LockType::Warn,
                    lock_type: option.lock_type,
                    missing_nodes,
                }
            })
            .collect()
    }

    /// Warnings for every node that has any, keyed by node id.
    pub fn analyze(
        &self,
        graph: &GraphModel,
        catalog: &TemplateCatalog,
    ) -> BTreeMap<String, Vec<DependencyWarning>> {
        graph
            .nodes()
            .iter()
            .map(|n| (n.id.clone(), self.warnings_for(graph, catalog, &n.id)))
            .filter(|(_, w)| !w.is_empty())
            .collect()
    }
}

/// Propagate indirect reachability until a pass adds nothing.
fn transitive_closure(
    mut closure: BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    loop {
        let mut changed = false;
        let keys: Vec<String> = closure.keys().cloned().collect();
        for key in &keys {
            let indirect: Vec<String> = closure[key]
                .iter()
                .filter_map(|mid| closure.get(mid))
                .flatten()
                .filter(|id| *id != key)
                .cloned()
                .collect();
            if let Some(entry) = closure.get_mut(key) {
                for id in indirect {
                    changed |= entry.insert(id);
                }
            }
        }
        if !changed {
            return closure;
        }
    }
}

/// Values currently selected in a select (string) or multi-select (array) field.
fn selected_values(value: Option<&serde_json::Value>) -> HashSet<&str> {
    match value {
        Some(serde_json::Value::String(s)) => HashSet::from([s.as_str()]),
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => HashSet::new(),
    }
}
