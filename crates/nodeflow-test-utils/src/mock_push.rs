use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::PushChannel;
use nodeflow_core::types::{ProgressMessage, SessionId};

/// Push channel the test drives by hand through [`push`](Self::push).
pub struct MockPushChannel {
    sender: Mutex<Option<mpsc::Sender<ProgressMessage>>>,
    sessions: Mutex<Vec<SessionId>>,
    fail_open: bool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl MockPushChannel {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            sessions: Mutex::new(Vec::new()),
            fail_open: false,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// A channel whose `open` always fails.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    /// Deliver a message as if the server had pushed it. Returns false when
    /// no subscription is open.
    pub async fn push(&self, msg: ProgressMessage) -> bool {
        let tx = self.sender.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => false,
        }
    }

    /// End the subscription from the server side.
    pub fn disconnect(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockPushChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PushChannel for MockPushChannel {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(
        &self,
        session: &SessionId,
        tx: mpsc::Sender<ProgressMessage>,
    ) -> BoxFuture<'_, Result<()>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(session.clone());
        let result = if self.fail_open {
            Err(NodeflowError::PushChannel {
                channel: "mock".into(),
                message: "connection refused".into(),
            })
        } else {
            *self.sender.lock().unwrap() = Some(tx);
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
        Box::pin(async { Ok(()) })
    }
}
