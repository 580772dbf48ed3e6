//! Workflow graph — the editable node/edge model and everything that judges it.
//!
//! `GraphModel` holds nodes and edges. The validators are pure functions of a
//! graph: `ConnectionValidator` guards each new edge against handle capacity,
//! `StructuralValidator` checks that data can flow from an input node to an
//! output node, and `ConfigValidator` checks required fields against the
//! template schemas. `DependencyAnalyzer` produces advisory warnings only.
//! `ExecutionPayload` is the minimal form a graph is submitted in.

pub mod catalog;
pub mod config_check;
pub mod connection;
pub mod dependency;
pub mod model;
pub mod payload;
pub mod structural;
pub mod workflow;

pub use catalog::{
    ConfigSchema, FieldOption, FieldSchema, FieldType, LockType, NodeTemplate, Recommendation,
    SchemaProvider, Severity, TemplateCatalog,
};
pub use config_check::{ConfigReport, ConfigValidator, FieldError};
pub use connection::{
    ConnectOutcome, Connection, ConnectionCheck, ConnectionRejection, ConnectionValidator,
};
pub use dependency::{DependencyAnalyzer, DependencyWarning, OptionAvailability, WarningKind};
pub use model::{Edge, GraphModel, HandleSide, Node, NodeCategory, Position};
pub use payload::ExecutionPayload;
pub use structural::{StructuralIssue, StructuralReport, StructuralValidator};
pub use workflow::{validate_workflow, WorkflowValidation};
