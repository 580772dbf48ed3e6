use tokio::sync::broadcast;

use crate::types::ExecutionEvent;

/// Fan-out of execution events to every observer, in publish order.
///
/// Slow observers lag and lose the oldest events rather than block the
/// coordinator.
pub struct EventBus {
    tx: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishing with nobody listening is fine.
    pub fn publish(&self, event: ExecutionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionStatus;

    fn changed(to: ExecutionStatus) -> ExecutionEvent {
        ExecutionEvent::StatusChanged {
            execution_id: None,
            from: ExecutionStatus::Idle,
            to,
        }
    }

    #[tokio::test]
    async fn test_every_observer_sees_events_in_order() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.observer_count(), 2);

        bus.publish(changed(ExecutionStatus::Starting));
        bus.publish(changed(ExecutionStatus::Running));

        for rx in [&mut a, &mut b] {
            for expected in [ExecutionStatus::Starting, ExecutionStatus::Running] {
                match rx.recv().await.unwrap() {
                    ExecutionEvent::StatusChanged { to, .. } => assert_eq!(to, expected),
                    other => panic!("unexpected event: {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_publish_without_observers() {
        let bus = EventBus::new(0);
        bus.publish(changed(ExecutionStatus::Starting));
        assert_eq!(bus.observer_count(), 0);
    }
}
