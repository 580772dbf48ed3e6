use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nodeflow_core::config::ExecutionConfig;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::event::EventBus;
use nodeflow_core::traits::{OrchestratorApi, PushChannel};
use nodeflow_core::types::{
    Checkpoint, ExecutionContext, ExecutionEvent, ExecutionId, ExecutionRecord, ExecutionStatus,
    ProgressMessage, StepState,
};
use nodeflow_graph::{ExecutionPayload, GraphModel};

use crate::aggregator::{ProgressAggregator, ProgressInput};

/// Owns the push subscription and the poll loop of one execution and
/// releases both exactly once.
struct ChannelGuard {
    push: Arc<dyn PushChannel>,
    stop: CancellationToken,
    released: AtomicBool,
}

impl ChannelGuard {
    fn new(push: Arc<dyn PushChannel>) -> Self {
        Self {
            push,
            stop: CancellationToken::new(),
            released: AtomicBool::new(false),
        }
    }

    /// Stop polling and close the push channel. Later calls do nothing.
    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.cancel();
        if let Err(e) = self.push.close().await {
            warn!(channel = %self.push.name(), error = %e, "Failed to close push channel");
        }
        debug!(channel = %self.push.name(), "Execution channels released");
    }
}

#[derive(Default)]
struct Runtime {
    execution_id: Option<ExecutionId>,
    inputs: Option<mpsc::Sender<ProgressInput>>,
    guard: Option<Arc<ChannelGuard>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Drives a single remote execution from submission to a terminal status.
///
/// Push messages and poll snapshots are funnelled into one driver task that
/// owns the [`ProgressAggregator`]; observers read the latest record through
/// [`subscribe`](Self::subscribe) or listen on the event bus. A coordinator
/// runs at most one execution; start a new one with a fresh coordinator.
pub struct ExecutionCoordinator {
    api: Arc<dyn OrchestratorApi>,
    push: Arc<dyn PushChannel>,
    config: ExecutionConfig,
    event_bus: Arc<EventBus>,
    record: Arc<watch::Sender<ExecutionRecord>>,
    runtime: Mutex<Runtime>,
}

impl ExecutionCoordinator {
    pub fn new(
        api: Arc<dyn OrchestratorApi>,
        push: Arc<dyn PushChannel>,
        config: ExecutionConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let (record, _) = watch::channel(ExecutionRecord::default());
        Self {
            api,
            push,
            config,
            event_bus,
            record: Arc::new(record),
            runtime: Mutex::new(Runtime::default()),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.record.borrow().status
    }

    /// Snapshot of the current record.
    pub fn record(&self) -> ExecutionRecord {
        self.record.borrow().clone()
    }

    /// Receiver that always holds the latest record.
    pub fn subscribe(&self) -> watch::Receiver<ExecutionRecord> {
        self.record.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.record.borrow().execution_id.clone()
    }

    /// Submit the graph and start tracking it.
    ///
    /// The graph is not validated here. A push-channel failure only degrades
    /// delivery to polling; a rejected submission fails the execution and is
    /// returned as the error.
    pub async fn execute(&self, graph: &GraphModel, ctx: ExecutionContext) -> Result<ExecutionId> {
        let mut rt = self.runtime.lock().await;

        let current = self.status();
        if current != ExecutionStatus::Idle {
            return Err(NodeflowError::AlreadyStarted(current));
        }
        self.transition(ExecutionStatus::Starting)?;

        let guard = Arc::new(ChannelGuard::new(self.push.clone()));
        rt.guard = Some(guard.clone());

        let (push_tx, push_rx) = mpsc::channel(self.config.push_buffer.max(1));
        let push_rx = match self.push.open(&ctx.session_id, push_tx).await {
            Ok(()) => {
                debug!(channel = %self.push.name(), session = %ctx.session_id, "Push channel open");
                Some(push_rx)
            }
            Err(e) => {
                warn!(channel = %self.push.name(), error = %e, "Push channel unavailable, relying on polling");
                self.event_bus.publish(ExecutionEvent::TransportDegraded {
                    channel: self.push.name().to_string(),
                    error: e.to_string(),
                });
                None
            }
        };

        let payload = ExecutionPayload::from(graph).to_value();
        let response = match self.api.submit(payload, &ctx).await {
            Ok(response) => response,
            Err(e) => {
                error!(session = %ctx.session_id, error = %e, "Submission rejected");
                self.record.send_modify(|r| r.error = Some(e.to_string()));
                self.transition(ExecutionStatus::Failed)?;
                guard.release().await;
                return Err(e);
            }
        };

        let execution_id = response.execution_id;
        self.record.send_modify(|r| {
            r.execution_id = Some(execution_id.clone());
            r.started_at = Some(Utc::now());
            for node in graph.nodes() {
                r.node_states.insert(node.id.clone(), StepState::default());
            }
        });
        self.transition(ExecutionStatus::Running)?;
        info!(execution_id = %execution_id, nodes = graph.node_count(), "Execution running");

        let (input_tx, input_rx) = mpsc::channel(32);
        let driver = Driver {
            execution_id: execution_id.clone(),
            aggregator: ProgressAggregator::new(self.record()),
            record: self.record.clone(),
            event_bus: self.event_bus.clone(),
            guard: guard.clone(),
        };
        rt.tasks.push(tokio::spawn(driver.run(push_rx, input_rx)));
        rt.tasks.push(tokio::spawn(poll_loop(
            self.api.clone(),
            execution_id.clone(),
            input_tx.clone(),
            self.record.subscribe(),
            self.config.clone(),
            guard.stop.clone(),
        )));

        rt.execution_id = Some(execution_id.clone());
        rt.inputs = Some(input_tx);
        Ok(execution_id)
    }

    /// Cancel the running execution.
    ///
    /// Without an execution id this does nothing. The remote cancel is best
    /// effort; the local record ends up cancelled either way.
    pub async fn cancel(&self) -> Result<()> {
        let (execution_id, inputs, guard) = {
            let rt = self.runtime.lock().await;
            let Some(id) = rt.execution_id.clone() else {
                return Ok(());
            };
            (id, rt.inputs.clone(), rt.guard.clone())
        };
        if self.status().is_terminal() {
            return Ok(());
        }

        if let Err(e) = self.api.cancel(&execution_id).await {
            warn!(execution_id = %execution_id, error = %e, "Remote cancel failed");
        }

        let delivered = match inputs {
            Some(tx) => tx.send(ProgressInput::Cancelled).await.is_ok(),
            None => false,
        };
        if delivered {
            let mut rx = self.record.subscribe();
            let stopped = async {
                match &guard {
                    Some(g) => g.stop.cancelled().await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = rx.wait_for(|r| r.status.is_terminal()) => {}
                _ = stopped => {}
            }
        }

        // The driver is gone; settle the record here.
        if !self.status().is_terminal() {
            self.transition(ExecutionStatus::Cancelled)?;
        }
        info!(execution_id = %execution_id, status = %self.status(), "Execution cancel finished");

        self.teardown().await;
        Ok(())
    }

    /// Fetch stored checkpoints of the current execution.
    pub async fn checkpoints(&self, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        let id = self
            .execution_id()
            .ok_or_else(|| NodeflowError::ExecutionFailed("no execution has been submitted".into()))?;
        self.api.checkpoints(&id, limit).await
    }

    /// Release both channels and stop the background tasks. Safe to call
    /// any number of times.
    pub async fn dispose(&self) {
        self.teardown().await;
    }

    async fn teardown(&self) {
        let mut rt = self.runtime.lock().await;
        if let Some(guard) = &rt.guard {
            guard.release().await;
        }
        rt.inputs = None;
        for task in rt.tasks.drain(..) {
            task.abort();
        }
    }

    /// Move the state machine, publishing the change. Only used while no
    /// driver task owns the record.
    fn transition(&self, to: ExecutionStatus) -> Result<()> {
        let (from, execution_id) = {
            let r = self.record.borrow();
            (r.status, r.execution_id.clone())
        };
        if !from.can_transition_to(to) {
            return Err(NodeflowError::InvalidTransition { from, to });
        }
        self.event_bus.publish(ExecutionEvent::StatusChanged {
            execution_id,
            from,
            to,
        });
        self.record.send_modify(|r| {
            r.status = to;
            if to.is_terminal() {
                r.finished_at = Some(Utc::now());
            }
        });
        Ok(())
    }
}

impl Drop for ExecutionCoordinator {
    fn drop(&mut self) {
        let rt = self.runtime.get_mut();
        for task in rt.tasks.drain(..) {
            task.abort();
        }
        if let Some(guard) = rt.guard.take() {
            guard.stop.cancel();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { guard.release().await });
            }
        }
    }
}

/// Single writer of the execution record.
struct Driver {
    execution_id: ExecutionId,
    aggregator: ProgressAggregator,
    record: Arc<watch::Sender<ExecutionRecord>>,
    event_bus: Arc<EventBus>,
    guard: Arc<ChannelGuard>,
}

impl Driver {
    async fn run(
        mut self,
        mut push_rx: Option<mpsc::Receiver<ProgressMessage>>,
        mut input_rx: mpsc::Receiver<ProgressInput>,
    ) {
        loop {
            let input = tokio::select! {
                biased;
                input = input_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
                msg = next_push(&mut push_rx) => match msg {
                    Some(msg) => ProgressInput::Push(msg),
                    None => {
                        warn!(execution_id = %self.execution_id, "Push channel ended, relying on polling");
                        self.event_bus.publish(ExecutionEvent::TransportDegraded {
                            channel: self.guard.push.name().to_string(),
                            error: "subscription ended".into(),
                        });
                        push_rx = None;
                        continue;
                    }
                },
                _ = self.guard.stop.cancelled() => break,
            };

            if self.apply(input) {
                self.guard.release().await;
                break;
            }
        }
        debug!(execution_id = %self.execution_id, "Execution driver stopped");
    }

    /// Fold one input into the record. Returns true once the execution is
    /// finished.
    fn apply(&mut self, input: ProgressInput) -> bool {
        if let ProgressInput::Push(msg) = &input {
            if let Some(id) = &msg.execution_id {
                if *id != self.execution_id {
                    debug!(execution_id = %self.execution_id, other = %id, "Ignoring message for another execution");
                    return false;
                }
            }
        }

        let from = self.aggregator.record().status;
        let pushed = match &input {
            ProgressInput::Push(msg) => Some(msg.clone()),
            _ => None,
        };
        let polled = match &input {
            ProgressInput::Poll(snapshot) => Some(snapshot.clone()),
            _ => None,
        };

        let next = self.aggregator.apply(input);

        if let Some(message) = pushed {
            self.event_bus.publish(ExecutionEvent::Progress {
                execution_id: self.execution_id.clone(),
                message,
                percentage: self.aggregator.record().progress_percentage,
            });
        }
        if let Some(snapshot) = polled {
            self.event_bus.publish(ExecutionEvent::Snapshot {
                execution_id: self.execution_id.clone(),
                snapshot,
            });
        }
        if let Some(to) = next {
            self.event_bus.publish(ExecutionEvent::StatusChanged {
                execution_id: Some(self.execution_id.clone()),
                from,
                to,
            });
        }
        self.record.send_replace(self.aggregator.record().clone());

        match next {
            Some(to) if to.is_terminal() => {
                let record = self.aggregator.record();
                match to {
                    ExecutionStatus::Failed => error!(
                        execution_id = %self.execution_id,
                        error = record.error.as_deref().unwrap_or("unknown"),
                        "Execution failed"
                    ),
                    _ => info!(execution_id = %self.execution_id, status = %to, "Execution finished"),
                }
                true
            }
            _ => false,
        }
    }
}

async fn next_push(rx: &mut Option<mpsc::Receiver<ProgressMessage>>) -> Option<ProgressMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Poll the orchestrator after the grace period until the execution ends.
async fn poll_loop(
    api: Arc<dyn OrchestratorApi>,
    execution_id: ExecutionId,
    tx: mpsc::Sender<ProgressInput>,
    record: watch::Receiver<ExecutionRecord>,
    config: ExecutionConfig,
    stop: CancellationToken,
) {
    tokio::select! {
        _ = tokio::time::sleep(config.poll_grace()) => {}
        _ = stop.cancelled() => return,
    }
    if record.borrow().status != ExecutionStatus::Running {
        return;
    }
    debug!(execution_id = %execution_id, interval_secs = config.poll_interval().as_secs(), "Status polling started");

    let mut failures = 0u32;
    loop {
        let result = tokio::select! {
            result = api.status(&execution_id) => result,
            _ = stop.cancelled() => return,
        };

        let delay = match result {
            Ok(snapshot) => {
                failures = 0;
                if tx.send(ProgressInput::Poll(snapshot)).await.is_err() {
                    return;
                }
                config.poll_interval()
            }
            Err(e) => {
                failures += 1;
                if failures >= config.max_poll_failures {
                    error!(execution_id = %execution_id, failures, error = %e, "Status polling exhausted");
                    let _ = tx
                        .send(ProgressInput::TransportLost(format!(
                            "status polling failed {} times: {}",
                            failures, e
                        )))
                        .await;
                    return;
                }
                let delay = poll_backoff(failures, &config);
                warn!(
                    execution_id = %execution_id,
                    failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Status poll failed, backing off"
                );
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.cancelled() => return,
        }
    }
}

/// Exponential backoff from the poll interval with 0.8x to 1.2x jitter.
fn poll_backoff(failures: u32, config: &ExecutionConfig) -> Duration {
    let base = config.poll_interval().as_millis() as u64;
    let ms = base
        .saturating_mul(2u64.saturating_pow(failures.saturating_sub(1)))
        .min(config.max_poll_backoff_ms);
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::{ProgressSubtype, ProgressTier, SessionId, StatusSnapshot, StepStatus};
    use nodeflow_test_utils::{linear_graph, MockOrchestrator, MockPushChannel};

    fn coordinator(
        api: Arc<MockOrchestrator>,
        push: Arc<MockPushChannel>,
    ) -> ExecutionCoordinator {
        ExecutionCoordinator::new(api, push, ExecutionConfig::default(), Arc::new(EventBus::default()))
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(SessionId::from_string("session-1"))
    }

    fn msg(tier: ProgressTier, subtype: ProgressSubtype) -> ProgressMessage {
        ProgressMessage::new(tier, subtype).for_execution(MockOrchestrator::EXECUTION_ID)
    }

    async fn wait_terminal(coord: &ExecutionCoordinator) -> ExecutionRecord {
        let mut rx = coord.subscribe();
        let record = rx.wait_for(|r| r.status.is_terminal()).await.unwrap().clone();
        record
    }

    fn statuses(rx: &mut tokio::sync::broadcast::Receiver<ExecutionEvent>) -> Vec<ExecutionStatus> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::StatusChanged { to, .. } = event {
                seen.push(to);
            }
        }
        seen
    }

    #[test]
    fn test_poll_backoff_bounds() {
        let config = ExecutionConfig::default();
        let first = poll_backoff(1, &config).as_millis();
        assert!((1600..=2400).contains(&first));
        let capped = poll_backoff(20, &config).as_millis();
        assert!(capped <= 12_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_completed_over_push() {
        let api = Arc::new(MockOrchestrator::new());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api.clone(), push.clone());
        let mut events = coord.event_bus().subscribe();

        let id = coord.execute(&linear_graph(), ctx()).await.unwrap();
        assert_eq!(id.as_str(), MockOrchestrator::EXECUTION_ID);
        assert_eq!(coord.status(), ExecutionStatus::Running);
        assert_eq!(coord.record().node_states.len(), 3);
        assert_eq!(push.sessions(), vec![SessionId::from_string("session-1")]);

        push.push(msg(ProgressTier::Node, ProgressSubtype::Start).with_node("load")).await;
        push.push(msg(ProgressTier::Node, ProgressSubtype::End).with_node("load")).await;
        push.push(msg(ProgressTier::Execution, ProgressSubtype::End)).await;

        let record = wait_terminal(&coord).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.progress_percentage, 100.0);
        assert_eq!(record.messages.len(), 3);
        assert_eq!(record.node_states["load"].status, StepStatus::Completed);

        coord.dispose().await;
        coord.dispose().await;
        assert_eq!(push.close_count(), 1);
        assert_eq!(
            statuses(&mut events),
            vec![
                ExecutionStatus::Starting,
                ExecutionStatus::Running,
                ExecutionStatus::Completed
            ]
        );

        let submitted = api.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0]["nodes"].as_array().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_failed_over_push() {
        let api = Arc::new(MockOrchestrator::new());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api, push.clone());
        let mut events = coord.event_bus().subscribe();

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        push.push(msg(ProgressTier::Execution, ProgressSubtype::Error).with_error("dataset unavailable"))
            .await;

        let record = wait_terminal(&coord).await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("dataset unavailable"));
        coord.dispose().await;
        assert_eq!(
            statuses(&mut events),
            vec![
                ExecutionStatus::Starting,
                ExecutionStatus::Running,
                ExecutionStatus::Failed
            ]
        );
        assert_eq!(push.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_fails_from_starting() {
        let api = Arc::new(MockOrchestrator::new().failing_submit("workflow too large"));
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api, push.clone());
        let mut events = coord.event_bus().subscribe();

        let err = coord.execute(&linear_graph(), ctx()).await.unwrap_err();
        assert!(err.to_string().contains("workflow too large"));
        assert_eq!(coord.status(), ExecutionStatus::Failed);
        assert!(coord.execution_id().is_none());
        assert_eq!(
            statuses(&mut events),
            vec![ExecutionStatus::Starting, ExecutionStatus::Failed]
        );
        assert_eq!(push.close_count(), 1);

        // Cancel without an execution id is a no-op.
        coord.cancel().await.unwrap();
        coord.dispose().await;
        assert_eq!(push.close_count(), 1);

        let again = coord.execute(&linear_graph(), ctx()).await;
        assert!(matches!(again, Err(NodeflowError::AlreadyStarted(ExecutionStatus::Failed))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_execute_is_noop() {
        let api = Arc::new(MockOrchestrator::new());
        let coord = coordinator(api.clone(), Arc::new(MockPushChannel::new()));
        coord.cancel().await.unwrap();
        assert_eq!(coord.status(), ExecutionStatus::Idle);
        assert_eq!(api.cancel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_execution() {
        let api = Arc::new(MockOrchestrator::new());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api.clone(), push.clone());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        coord.cancel().await.unwrap();
        assert_eq!(coord.status(), ExecutionStatus::Cancelled);
        assert_eq!(api.cancel_count(), 1);
        assert_eq!(push.close_count(), 1);

        coord.cancel().await.unwrap();
        coord.dispose().await;
        assert_eq!(api.cancel_count(), 1);
        assert_eq!(push.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_survives_remote_failure() {
        let api = Arc::new(MockOrchestrator::new().failing_cancel());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api.clone(), push.clone());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        coord.cancel().await.unwrap();
        assert_eq!(coord.status(), ExecutionStatus::Cancelled);
        assert_eq!(push.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_takes_over_when_push_fails() {
        let api = Arc::new(MockOrchestrator::new().with_statuses(vec![
            Ok(StatusSnapshot {
                status: "running".into(),
                progress_percentage: Some(40.0),
                current_step: Some("Scoring reviews".into()),
                ..Default::default()
            }),
            Ok(StatusSnapshot {
                status: "completed".into(),
                progress_percentage: Some(100.0),
                ..Default::default()
            }),
        ]));
        let push = Arc::new(MockPushChannel::failing());
        let coord = coordinator(api.clone(), push.clone());
        let mut events = coord.event_bus().subscribe();

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        let record = wait_terminal(&coord).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.current_step.as_deref(), Some("Scoring reviews"));
        assert!(record.messages.is_empty());
        assert_eq!(api.status_calls(), 2);

        let mut degraded = false;
        while let Ok(event) = events.try_recv() {
            if let ExecutionEvent::TransportDegraded { channel, .. } = event {
                assert_eq!(channel, "mock");
                degraded = true;
            }
        }
        assert!(degraded);
        coord.dispose().await;
        assert_eq!(push.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_waits_for_grace_period() {
        let api = Arc::new(MockOrchestrator::new());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api.clone(), push.clone());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.status_calls(), 0);

        push.push(msg(ProgressTier::Execution, ProgressSubtype::End)).await;
        wait_terminal(&coord).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.status_calls(), 0);
        coord.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhaustion_fails_execution() {
        let api = Arc::new(
            MockOrchestrator::new()
                .with_statuses((0..5).map(|_| Err("connection refused".to_string())).collect()),
        );
        let push = Arc::new(MockPushChannel::failing());
        let coord = coordinator(api.clone(), push.clone());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        let record = wait_terminal(&coord).await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.unwrap().contains("status polling failed 5 times"));
        assert_eq!(api.status_calls(), 5);
        coord.dispose().await;
        assert_eq!(push.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_for_other_executions_ignored() {
        let api = Arc::new(MockOrchestrator::new());
        let push = Arc::new(MockPushChannel::new());
        let coord = coordinator(api, push.clone());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        push.push(
            ProgressMessage::new(ProgressTier::Execution, ProgressSubtype::End).for_execution("someone-else"),
        )
        .await;
        push.push(msg(ProgressTier::Node, ProgressSubtype::Start).with_node("clean")).await;
        push.push(msg(ProgressTier::Execution, ProgressSubtype::End)).await;

        let record = wait_terminal(&coord).await;
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.node_states["clean"].status, StepStatus::Running);
        coord.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoints_need_an_execution() {
        let api = Arc::new(MockOrchestrator::new());
        let coord = coordinator(api, Arc::new(MockPushChannel::new()));
        assert!(coord.checkpoints(Some(5)).await.is_err());

        coord.execute(&linear_graph(), ctx()).await.unwrap();
        assert!(coord.checkpoints(Some(5)).await.unwrap().is_empty());
        coord.dispose().await;
    }
}
