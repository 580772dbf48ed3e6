use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::*;

/// Remote orchestrator — request/response side.
pub trait OrchestratorApi: Send + Sync + 'static {
    /// Submit a serialized workflow. Returns the assigned execution id.
    fn submit(
        &self,
        workflow: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> BoxFuture<'_, Result<SubmitResponse>>;

    /// Fetch a status snapshot for an execution.
    fn status(&self, id: &ExecutionId) -> BoxFuture<'_, Result<StatusSnapshot>>;

    /// Ask the orchestrator to stop an execution. Fire-and-forget: the
    /// result only reports whether the request was delivered.
    fn cancel(&self, id: &ExecutionId) -> BoxFuture<'_, Result<()>>;

    /// Read stored checkpoints for post-hoc analysis.
    fn checkpoints(
        &self,
        id: &ExecutionId,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Checkpoint>>>;
}

/// Push channel — server-initiated progress delivery.
///
/// One instance backs at most one subscription at a time.
pub trait PushChannel: Send + Sync + 'static {
    /// Channel name for logs (e.g., "websocket").
    fn name(&self) -> &str;

    /// Open a subscription for a session, forwarding parsed messages via `tx`.
    fn open(
        &self,
        session: &SessionId,
        tx: mpsc::Sender<ProgressMessage>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Close the subscription. Must tolerate being called when nothing is open.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}
