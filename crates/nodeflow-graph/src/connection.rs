use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use nodeflow_core::config::EditorConfig;
use nodeflow_core::error::{NodeflowError, Result};

use crate::model::{Edge, GraphModel, HandleSide, DEFAULT_SOURCE_HANDLE, DEFAULT_TARGET_HANDLE};

/// A proposed edge, as produced by a drag between two handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }

    /// Parse a connection from an editor drop payload. Malformed payloads
    /// are reported without touching any graph.
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| NodeflowError::InvalidEdge {
            edge: "<drop>".into(),
            message: format!("malformed connection payload: {}", e),
        })
    }

    pub fn source_handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_SOURCE_HANDLE)
    }

    pub fn target_handle(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(DEFAULT_TARGET_HANDLE)
    }

    pub fn to_edge(&self) -> Edge {
        Edge::with_handles(
            &self.source,
            self.source_handle(),
            &self.target,
            self.target_handle(),
        )
    }
}

/// Why a connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConnectionRejection {
    #[error("A node cannot be connected to itself")]
    SelfConnection,

    #[error("Source node '{node_id}' does not exist")]
    MissingSource { node_id: String },

    #[error("Target node '{node_id}' does not exist")]
    MissingTarget { node_id: String },

    #[error("The workflow already has the maximum of {limit} connections")]
    EdgeLimitReached { limit: usize },

    #[error("These handles are already connected")]
    DuplicateConnection,

    #[error("The source handle accepts at most {limit} connection(s)")]
    SourceHandleFull { limit: usize },

    #[error("The target handle accepts at most {limit} connection(s)")]
    TargetHandleFull { limit: usize },

    #[error("Both handles are at capacity")]
    BothHandlesFull,
}

/// Outcome of checking a connection against the current graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub is_valid: bool,
    pub reason: Option<ConnectionRejection>,
    pub source_handle_limit: usize,
    pub target_handle_limit: usize,
    pub source_handle_connections: usize,
    pub target_handle_connections: usize,
}

impl ConnectionCheck {
    fn rejected(reason: ConnectionRejection) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            source_handle_limit: 0,
            target_handle_limit: 0,
            source_handle_connections: 0,
            target_handle_connections: 0,
        }
    }
}

/// What `connect` did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The edge was added alongside the existing ones.
    Added(Edge),
    /// A single-capacity handle was occupied; its edge was swapped out.
    Replaced { added: Edge, removed: Edge },
}

impl ConnectOutcome {
    pub fn edge(&self) -> &Edge {
        match self {
            Self::Added(edge) => edge,
            Self::Replaced { added, .. } => added,
        }
    }
}

/// Decides whether a proposed edge fits the per-handle capacities.
#[derive(Debug, Clone)]
pub struct ConnectionValidator {
    max_edges: usize,
}

impl ConnectionValidator {
    pub fn new(max_edges: usize) -> Self {
        Self { max_edges }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.max_edges)
    }

    pub fn max_edges(&self) -> usize {
        self.max_edges
    }

    /// Check a connection without modifying the graph.
    pub fn check(&self, graph: &GraphModel, conn: &Connection) -> ConnectionCheck {
        if conn.source == conn.target {
            return ConnectionCheck::rejected(ConnectionRejection::SelfConnection);
        }
        let Some(source) = graph.node(&conn.source) else {
            return ConnectionCheck::rejected(ConnectionRejection::MissingSource {
                node_id: conn.source.clone(),
            });
        };
        let Some(target) = graph.node(&conn.target) else {
            return ConnectionCheck::rejected(ConnectionRejection::MissingTarget {
                node_id: conn.target.clone(),
            });
        };
        if graph.edge_count() >= self.max_edges {
            return ConnectionCheck::rejected(ConnectionRejection::EdgeLimitReached {
                limit: self.max_edges,
            });
        }

        let source_limit = source.capacity(HandleSide::Source);
        let target_limit = target.capacity(HandleSide::Target);
        let source_count = graph.occupancy(&conn.source, HandleSide::Source, conn.source_handle());
        let target_count = graph.occupancy(&conn.target, HandleSide::Target, conn.target_handle());

        let duplicate = graph.edges().iter().any(|e| {
            e.occupies(&conn.source, HandleSide::Source, conn.source_handle())
                && e.occupies(&conn.target, HandleSide::Target, conn.target_handle())
        });

        let source_full = source_count >= source_limit;
        let target_full = target_count >= target_limit;
        let reason = if duplicate {
            Some(ConnectionRejection::DuplicateConnection)
        } else {
            match (source_full, target_full) {
                (true, true) => Some(ConnectionRejection::BothHandlesFull),
                (true, false) => Some(ConnectionRejection::SourceHandleFull {
                    limit: source_limit,
                }),
                (false, true) => Some(ConnectionRejection::TargetHandleFull {
                    limit: target_limit,
                }),
                (false, false) => None,
            }
        };

        ConnectionCheck {
            is_valid: reason.is_none(),
            reason,
            source_handle_limit: source_limit,
            target_handle_limit: target_limit,
            source_handle_connections: source_count,
            target_handle_connections: target_count,
        }
    }

    /// Add a connection to the graph, applying the auto-replace policy.
    ///
    /// When exactly one side is full and that handle's limit is 1, the edge
    /// currently on it is removed and the new one takes its place. Any other
    /// blocking reason leaves the graph untouched.
    pub fn connect(
        &self,
        graph: &mut GraphModel,
        conn: &Connection,
    ) -> std::result::Result<ConnectOutcome, ConnectionRejection> {
        let check = self.check(graph, conn);
        let edge = conn.to_edge();

        let replace_on = match check.reason.clone() {
            None => None,
            Some(ConnectionRejection::SourceHandleFull { limit: 1 }) => Some((
                conn.source.as_str(),
                HandleSide::Source,
                conn.source_handle(),
            )),
            Some(ConnectionRejection::TargetHandleFull { limit: 1 }) => Some((
                conn.target.as_str(),
                HandleSide::Target,
                conn.target_handle(),
            )),
            Some(reason) => {
                debug!(source = %conn.source, target = %conn.target, %reason, "Connection rejected");
                return Err(reason);
            }
        };

        let removed = match replace_on {
            None => None,
            Some((node_id, side, handle)) => {
                let occupying: Vec<String> = graph
                    .edges_on_handle(node_id, side, handle)
                    .into_iter()
                    .map(|e| e.id.clone())
                    .collect();
                let [only] = occupying.as_slice() else {
                    return Err(check.reason.unwrap_or(ConnectionRejection::BothHandlesFull));
                };
                let removed = graph.remove_edge(only).map_err(|_| {
                    check.reason.clone().unwrap_or(ConnectionRejection::BothHandlesFull)
                })?;
                Some(removed)
            }
        };

        // Endpoints were verified by `check`, so this only fails on an id clash.
        if graph.insert_edge(edge.clone()).is_err() {
            if let Some(previous) = removed {
                let _ = graph.insert_edge(previous);
            }
            return Err(ConnectionRejection::DuplicateConnection);
        }

        match removed {
            Some(removed) => {
                info!(added = %edge.id, removed = %removed.id, "Connection replaced on single-capacity handle");
                Ok(ConnectOutcome::Replaced {
                    added: edge,
                    removed,
                })
            }
            None => {
                debug!(edge = %edge.id, "Connection added");
                Ok(ConnectOutcome::Added(edge))
            }
        }
    }
}

impl Default for ConnectionValidator {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}
