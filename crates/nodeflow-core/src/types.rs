use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Editing-session identifier. Push subscriptions are keyed by it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the remote orchestrator when a submission is accepted.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one execution.
///
/// `Idle -> Starting -> Running -> {Completed | Failed | Cancelled}`, with
/// `Starting -> Failed` when the submission is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the remote run a progress message talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressTier {
    Execution,
    Node,
    Tool,
    Agent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSubtype {
    Start,
    Progress,
    End,
    Error,
    Decision,
    #[serde(other)]
    Unknown,
}

/// One progress event as received from the push channel.
///
/// Fields that are not part of the common envelope are kept in `extra`
/// so nothing the remote sends is lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMessage {
    #[serde(rename = "type")]
    pub tier: ProgressTier,
    pub subtype: ProgressSubtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(
        default,
        alias = "progress_percentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProgressMessage {
    pub fn new(tier: ProgressTier, subtype: ProgressSubtype) -> Self {
        Self {
            tier,
            subtype,
            execution_id: None,
            timestamp: Some(Utc::now()),
            node_id: None,
            tool_name: None,
            agent_name: None,
            progress: None,
            message: None,
            error: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn for_execution(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(ExecutionId(id.into()));
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Status of a single node or tool inside a running execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub status: StepStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client-side view of one remote execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Option<ExecutionId>,
    pub status: ExecutionStatus,
    pub progress_percentage: f64,
    pub messages: Vec<ProgressMessage>,
    pub node_states: BTreeMap<String, StepState>,
    pub tool_states: BTreeMap<String, StepState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Response to a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub execution_id: ExecutionId,
}

/// Response to a status poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: String,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// Map the remote status string onto the local state machine.
    /// Unknown strings return `None` and are treated as "no news".
    pub fn execution_status(&self) -> Option<ExecutionStatus> {
        match self.status.to_ascii_lowercase().as_str() {
            "pending" | "queued" | "starting" | "running" | "in_progress" => {
                Some(ExecutionStatus::Running)
            }
            "completed" | "complete" | "succeeded" | "success" => Some(ExecutionStatus::Completed),
            "failed" | "error" => Some(ExecutionStatus::Failed),
            "cancelled" | "canceled" => Some(ExecutionStatus::Cancelled),
            _ => None,
        }
    }
}

/// A persisted intermediate result, fetched for post-hoc analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Caller-supplied context for `execute`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub session_id: SessionId,
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            parameters: serde_json::Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Event broadcast to all observers of an execution.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// The execution state machine moved.
    StatusChanged {
        execution_id: Option<ExecutionId>,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
    /// A push message was folded into the record.
    Progress {
        execution_id: ExecutionId,
        message: ProgressMessage,
        percentage: f64,
    },
    /// A poll snapshot was folded into the record.
    Snapshot {
        execution_id: ExecutionId,
        snapshot: StatusSnapshot,
    },
    /// One of the delivery channels failed; the other keeps going.
    TransportDegraded { channel: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_edges() {
        use ExecutionStatus::*;
        assert!(Idle.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Idle.can_transition_to(Running));
        assert!(!Starting.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Starting));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Idle.is_terminal());
    }

    #[test]
    fn test_parse_push_envelope() {
        let raw = r#"{
            "type": "node",
            "subtype": "progress",
            "execution_id": "exec-1",
            "node_id": "sentiment-1",
            "progress_percentage": 40,
            "message": "scoring reviews",
            "timestamp": "2026-01-05T10:00:00Z",
            "batch": 3
        }"#;
        let msg: ProgressMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.tier, ProgressTier::Node);
        assert_eq!(msg.subtype, ProgressSubtype::Progress);
        assert_eq!(msg.execution_id, Some(ExecutionId::from("exec-1")));
        assert_eq!(msg.node_id.as_deref(), Some("sentiment-1"));
        assert_eq!(msg.progress, Some(40.0));
        assert_eq!(msg.extra.get("batch"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_unknown_tier_is_classified_not_rejected() {
        let raw = r#"{"type": "workflow", "subtype": "heartbeat"}"#;
        let msg: ProgressMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.tier, ProgressTier::Unknown);
        assert_eq!(msg.subtype, ProgressSubtype::Unknown);
    }

    #[test]
    fn test_snapshot_status_mapping() {
        let snap = |s: &str| StatusSnapshot {
            status: s.into(),
            ..Default::default()
        };
        assert_eq!(snap("running").execution_status(), Some(ExecutionStatus::Running));
        assert_eq!(snap("COMPLETED").execution_status(), Some(ExecutionStatus::Completed));
        assert_eq!(snap("canceled").execution_status(), Some(ExecutionStatus::Cancelled));
        assert_eq!(snap("error").execution_status(), Some(ExecutionStatus::Failed));
        assert_eq!(snap("paused").execution_status(), None);
    }
}
