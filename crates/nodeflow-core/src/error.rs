use thiserror::Error;

use crate::types::ExecutionStatus;

#[derive(Debug, Error)]
pub enum NodeflowError {
    // Graph errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Invalid edge {edge}: {message}")]
    InvalidEdge { edge: String, message: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Workflow file error: {0}")]
    Workflow(String),

    // Execution errors
    #[error("Invalid execution transition: {from} -> {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Execution already started (status {0})")]
    AlreadyStarted(ExecutionStatus),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    // Transport errors
    #[error("Orchestrator request failed: {0}")]
    Orchestrator(String),

    #[error("Orchestrator returned {status}: {body}")]
    OrchestratorStatus { status: u16, body: String },

    #[error("Push channel error: {channel}: {message}")]
    PushChannel { channel: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeflowError>;
