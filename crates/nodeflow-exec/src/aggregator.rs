use chrono::Utc;
use tracing::debug;

use nodeflow_core::types::{
    ExecutionRecord, ExecutionStatus, ProgressMessage, ProgressSubtype, ProgressTier,
    StatusSnapshot, StepState, StepStatus,
};

/// Everything that can change an execution record, from either channel.
#[derive(Debug, Clone)]
pub enum ProgressInput {
    /// A message from the push channel.
    Push(ProgressMessage),
    /// A status snapshot from the poll loop.
    Poll(StatusSnapshot),
    /// The caller cancelled the execution.
    Cancelled,
    /// Polling gave up; the execution can no longer be observed.
    TransportLost(String),
}

/// Folds progress inputs into an [`ExecutionRecord`].
///
/// Only one aggregator writes a given record. Terminal statuses are sticky:
/// once the record is completed, failed or cancelled, later inputs may still
/// be appended but never move the status again.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    record: ExecutionRecord,
    execution_reported: bool,
}

impl ProgressAggregator {
    pub fn new(record: ExecutionRecord) -> Self {
        Self {
            record,
            execution_reported: false,
        }
    }

    pub fn record(&self) -> &ExecutionRecord {
        &self.record
    }

    pub fn into_record(self) -> ExecutionRecord {
        self.record
    }

    /// Apply one input. Returns the new status when the input caused a
    /// status transition.
    pub fn apply(&mut self, input: ProgressInput) -> Option<ExecutionStatus> {
        match input {
            ProgressInput::Push(msg) => self.apply_message(msg),
            ProgressInput::Poll(snapshot) => self.apply_snapshot(snapshot),
            ProgressInput::Cancelled => self.transition(ExecutionStatus::Cancelled),
            ProgressInput::TransportLost(reason) => {
                let next = self.transition(ExecutionStatus::Failed);
                if next.is_some() {
                    self.record.error = Some(reason);
                }
                next
            }
        }
    }

    fn apply_message(&mut self, msg: ProgressMessage) -> Option<ExecutionStatus> {
        let mut next = None;
        match msg.tier {
            ProgressTier::Execution => next = self.apply_execution(&msg),
            ProgressTier::Node => {
                if let Some(node_id) = msg.node_id.as_deref() {
                    let key = self.node_key(node_id);
                    apply_step(self.record.node_states.entry(key.clone()).or_default(), &msg);
                    self.record.current_node = Some(key);
                    if !self.execution_reported {
                        self.raise_progress(self.node_fraction());
                    }
                }
            }
            ProgressTier::Tool => {
                if let Some(tool) = msg.tool_name.as_deref() {
                    apply_step(
                        self.record.tool_states.entry(tool.to_string()).or_default(),
                        &msg,
                    );
                }
            }
            ProgressTier::Agent => {
                debug!(
                    agent = msg.agent_name.as_deref().unwrap_or("unknown"),
                    subtype = ?msg.subtype,
                    "Agent progress"
                );
            }
            ProgressTier::Unknown => {
                debug!(subtype = ?msg.subtype, "Progress message with unknown tier");
            }
        }
        self.record.messages.push(msg);
        next
    }

    fn apply_execution(&mut self, msg: &ProgressMessage) -> Option<ExecutionStatus> {
        if let Some(step) = &msg.message {
            self.record.current_step = Some(step.clone());
        }
        match msg.subtype {
            ProgressSubtype::Progress => {
                if let Some(p) = msg.progress {
                    self.execution_reported = true;
                    self.raise_progress(p);
                }
                None
            }
            ProgressSubtype::End => {
                let next = self.transition(ExecutionStatus::Completed);
                if next.is_some() {
                    self.record.progress_percentage = 100.0;
                }
                next
            }
            ProgressSubtype::Error => {
                let next = self.transition(ExecutionStatus::Failed);
                if next.is_some() {
                    self.record.error = Some(
                        msg.error
                            .clone()
                            .or_else(|| msg.message.clone())
                            .unwrap_or_else(|| "Execution failed".to_string()),
                    );
                }
                next
            }
            _ => None,
        }
    }

    fn apply_snapshot(&mut self, snapshot: StatusSnapshot) -> Option<ExecutionStatus> {
        if self.record.status.is_terminal() {
            debug!(status = %snapshot.status, "Ignoring snapshot for finished execution");
            return None;
        }

        if let Some(p) = snapshot.progress_percentage {
            self.execution_reported = true;
            self.raise_progress(p);
        }
        if snapshot.current_step.is_some() {
            self.record.current_step = snapshot.current_step.clone();
        }
        if snapshot.current_node.is_some() {
            self.record.current_node = snapshot.current_node.clone();
        }

        match snapshot.execution_status() {
            Some(ExecutionStatus::Completed) => {
                let next = self.transition(ExecutionStatus::Completed);
                if next.is_some() {
                    self.record.progress_percentage = 100.0;
                }
                next
            }
            Some(ExecutionStatus::Failed) => {
                let next = self.transition(ExecutionStatus::Failed);
                if next.is_some() {
                    self.record.error = Some(
                        snapshot
                            .error
                            .unwrap_or_else(|| "Execution failed".to_string()),
                    );
                }
                next
            }
            Some(ExecutionStatus::Cancelled) => self.transition(ExecutionStatus::Cancelled),
            Some(_) => None,
            None => {
                debug!(status = %snapshot.status, "Unrecognised remote status");
                None
            }
        }
    }

    fn transition(&mut self, to: ExecutionStatus) -> Option<ExecutionStatus> {
        if !self.record.status.can_transition_to(to) {
            return None;
        }
        self.record.status = to;
        if to.is_terminal() {
            self.record.finished_at = Some(Utc::now());
        }
        Some(to)
    }

    /// Progress never moves backwards while running.
    fn raise_progress(&mut self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        if value > self.record.progress_percentage {
            self.record.progress_percentage = value;
        }
    }

    /// Percentage of known nodes that have finished.
    fn node_fraction(&self) -> f64 {
        let total = self.record.node_states.len();
        if total == 0 {
            return 0.0;
        }
        let done = self
            .record
            .node_states
            .values()
            .filter(|s| s.status.is_terminal())
            .count();
        done as f64 / total as f64 * 100.0
    }

    /// Remote ids sometimes swap `-` and `_`; prefer whichever form is
    /// already tracked.
    fn node_key(&self, node_id: &str) -> String {
        if self.record.node_states.contains_key(node_id) {
            return node_id.to_string();
        }
        let swapped: String = node_id
            .chars()
            .map(|c| match c {
                '-' => '_',
                '_' => '-',
                c => c,
            })
            .collect();
        if self.record.node_states.contains_key(&swapped) {
            swapped
        } else {
            node_id.to_string()
        }
    }
}

fn apply_step(state: &mut StepState, msg: &ProgressMessage) {
    match msg.subtype {
        ProgressSubtype::Start => state.status = StepStatus::Running,
        ProgressSubtype::Progress => {
            state.status = StepStatus::Running;
            if let Some(p) = msg.progress {
                state.progress = p.clamp(0.0, 100.0);
            }
        }
        ProgressSubtype::End => {
            state.status = StepStatus::Completed;
            state.progress = 100.0;
        }
        ProgressSubtype::Error => {
            state.status = StepStatus::Failed;
            state.error = msg.error.clone().or_else(|| msg.message.clone());
        }
        ProgressSubtype::Decision | ProgressSubtype::Unknown => {}
    }
    if msg.message.is_some() {
        state.message = msg.message.clone();
    }
}
