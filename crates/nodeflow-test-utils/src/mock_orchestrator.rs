use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::OrchestratorApi;
use nodeflow_core::types::{
    Checkpoint, ExecutionContext, ExecutionId, SessionId, StatusSnapshot, SubmitResponse,
};

/// In-memory orchestrator with scripted status responses.
///
/// Status polls pop from the script; once it is exhausted every poll reports
/// `running`.
pub struct MockOrchestrator {
    submissions: Mutex<Vec<(serde_json::Value, SessionId)>>,
    statuses: Mutex<VecDeque<std::result::Result<StatusSnapshot, String>>>,
    checkpoints: Vec<Checkpoint>,
    submit_error: Option<String>,
    cancel_fails: bool,
    status_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl MockOrchestrator {
    pub const EXECUTION_ID: &'static str = "exec-1";

    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            checkpoints: Vec::new(),
            submit_error: None,
            cancel_fails: false,
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Script the poll responses; `Err` entries become transport errors.
    pub fn with_statuses(self, statuses: Vec<std::result::Result<StatusSnapshot, String>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Vec<Checkpoint>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Reject every submission with this message.
    pub fn failing_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    /// Fail every remote cancel request.
    pub fn failing_cancel(mut self) -> Self {
        self.cancel_fails = true;
        self
    }

    /// Workflow payloads submitted so far.
    pub fn submissions(&self) -> Vec<serde_json::Value> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(workflow, _)| workflow.clone())
            .collect()
    }

    pub fn submitted_sessions(&self) -> Vec<SessionId> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, session)| session.clone())
            .collect()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorApi for MockOrchestrator {
    fn submit(
        &self,
        workflow: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> BoxFuture<'_, Result<SubmitResponse>> {
        self.submissions
            .lock()
            .unwrap()
            .push((workflow, ctx.session_id.clone()));
        let error = self.submit_error.clone();
        Box::pin(async move {
            match error {
                Some(message) => Err(NodeflowError::SubmissionRejected(message)),
                None => Ok(SubmitResponse {
                    execution_id: ExecutionId::from(Self::EXECUTION_ID),
                }),
            }
        })
    }

    fn status(&self, _id: &ExecutionId) -> BoxFuture<'_, Result<StatusSnapshot>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(snapshot)) => Ok(snapshot),
                Some(Err(message)) => Err(NodeflowError::Orchestrator(message)),
                None => Ok(StatusSnapshot {
                    status: "running".into(),
                    ..Default::default()
                }),
            }
        })
    }

    fn cancel(&self, _id: &ExecutionId) -> BoxFuture<'_, Result<()>> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let fails = self.cancel_fails;
        Box::pin(async move {
            if fails {
                Err(NodeflowError::OrchestratorStatus {
                    status: 503,
                    body: "unavailable".into(),
                })
            } else {
                Ok(())
            }
        })
    }

    fn checkpoints(
        &self,
        _id: &ExecutionId,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let mut checkpoints = self.checkpoints.clone();
        if let Some(limit) = limit {
            checkpoints.truncate(limit);
        }
        Box::pin(async move { Ok(checkpoints) })
    }
}
