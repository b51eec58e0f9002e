//! WebSocket Push Channel - Persistent Connection Adapter
//!
//! Implements the `PushChannel` port over tokio-tungstenite. A session
//! is a dumb pipe: split read/write tasks bridge the socket to the
//! envelope channel pair, and any socket error or close simply closes
//! the inbound channel. The connector owns all envelope semantics
//! (pings, resubscription, failover); this adapter never retries.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::domain::error::FeedError;
use crate::ports::envelope::Envelope;
use crate::ports::transport::{PushChannel, PushSession};

/// Depth of the session's bridge channels.
const SESSION_QUEUE: usize = 64;

/// WebSocket-backed push channel.
pub struct WsPushChannel {
    url: String,
}

impl WsPushChannel {
    /// Create a channel targeting the given WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushChannel for WsPushChannel {
    async fn open(&self) -> Result<PushSession, FeedError> {
        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| FeedError::Transport(format!("WebSocket connect failed: {e}")))?;

        info!(url = %self.url, "WebSocket connected");

        let (mut sink, mut source) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(SESSION_QUEUE);
        let (in_tx, in_rx) = mpsc::channel::<Envelope>(SESSION_QUEUE);

        // Write side: envelopes out to the socket.
        tokio::spawn(async move {
            while let Some(envelope) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&envelope) else {
                    continue;
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        // Read side: socket frames in as envelopes. Dropping `in_tx`
        // on exit is the close signal the connector reacts to.
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => {
                            if in_tx.send(envelope).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "Dropping unparseable frame");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
        });

        Ok(PushSession {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
