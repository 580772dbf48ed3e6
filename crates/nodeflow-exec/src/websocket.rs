use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use nodeflow_core::config::OrchestratorConfig;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::PushChannel;
use nodeflow_core::types::{ProgressMessage, SessionId};

/// Push channel over the orchestrator's per-session WebSocket.
///
/// The socket is not reconnected when it drops; the coordinator's poll
/// loop covers the gap.
pub struct WebSocketPush {
    base_url: String,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl WebSocketPush {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            base_url: config.push_url(),
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    fn session_url(&self, session: &SessionId) -> String {
        format!("{}/ws/{}", self.base_url, urlencoding::encode(&session.0))
    }
}

/// Parse one text frame. Frames that are not progress envelopes yield `None`.
fn parse_frame(text: &str) -> Option<ProgressMessage> {
    match serde_json::from_str::<ProgressMessage>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!(error = %e, "Ignoring non-progress frame");
            None
        }
    }
}

impl PushChannel for WebSocketPush {
    fn name(&self) -> &str {
        "websocket"
    }

    fn open(
        &self,
        session: &SessionId,
        tx: mpsc::Sender<ProgressMessage>,
    ) -> BoxFuture<'_, Result<()>> {
        let url = self.session_url(session);
        let shutdown_tx_arc = self.shutdown_tx.clone();

        Box::pin(async move {
            let mut shutdown = shutdown_tx_arc.lock().await;
            if shutdown.is_some() {
                return Err(NodeflowError::PushChannel {
                    channel: "websocket".into(),
                    message: "a subscription is already open".into(),
                });
            }

            let ws_stream = match tokio_tungstenite::connect_async(&url).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    return Err(NodeflowError::PushChannel {
                        channel: "websocket".into(),
                        message: format!("Failed to connect to {url}: {e}"),
                    });
                }
            };

            let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
            *shutdown = Some(stop_tx);
            drop(shutdown);
            info!(url = %url, "Progress WebSocket connected");

            tokio::spawn(async move {
                let (mut ws_tx, mut ws_rx) = ws_stream.split();
                loop {
                    tokio::select! {
                        _ = &mut stop_rx => {
                            let _ = ws_tx.send(WsMessage::Close(None)).await;
                            debug!("Progress WebSocket closing");
                            break;
                        }
                        msg = ws_rx.next() => {
                            let msg = match msg {
                                Some(Ok(m)) => m,
                                Some(Err(e)) => {
                                    warn!(error = %e, "Progress WebSocket error");
                                    break;
                                }
                                None => {
                                    warn!("Progress WebSocket closed by server");
                                    break;
                                }
                            };

                            let text = match msg {
                                WsMessage::Text(t) => t.to_string(),
                                WsMessage::Ping(data) => {
                                    let _ = ws_tx.send(WsMessage::Pong(data)).await;
                                    continue;
                                }
                                WsMessage::Close(_) => {
                                    warn!("Progress WebSocket close frame");
                                    break;
                                }
                                _ => continue,
                            };

                            let Some(progress) = parse_frame(&text) else {
                                continue;
                            };
                            if let Err(e) = tx.send(progress).await {
                                error!(error = %e, "Progress receiver dropped");
                                break;
                            }
                        }
                    }
                }
            });

            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        let shutdown_tx = self.shutdown_tx.clone();

        Box::pin(async move {
            if let Some(tx) = shutdown_tx.lock().await.take() {
                let _ = tx.send(());
                info!("Progress WebSocket stopped");
            }
            Ok(())
        })
    }
}
