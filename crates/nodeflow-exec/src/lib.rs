//! Remote execution: submission, progress delivery, and reconciliation.
//!
//! `ExecutionCoordinator` submits a graph to an `OrchestratorApi`, listens on
//! a `PushChannel`, polls as a fallback, and folds both streams through one
//! `ProgressAggregator` into the execution record.

pub mod aggregator;
pub mod coordinator;
pub mod http;
pub mod websocket;

pub use aggregator::{ProgressAggregator, ProgressInput};
pub use coordinator::ExecutionCoordinator;
pub use http::HttpOrchestrator;
pub use websocket::WebSocketPush;
