//! Broadcast Hub - WebSocket Fan-out with Heartbeat Eviction
//!
//! Owns the set of subscriber sessions over the persistent channel.
//! Each generator batch is filtered per session's subscription set
//! (empty set = receive everything) and pushed through a bounded
//! per-session queue, so one slow or broken socket can never stall
//! delivery to the others: a session whose queue rejects a push is
//! evicted on the spot.
//!
//! Session lifecycle: Connected (default on accept) -> Evicted
//! (terminal, on missed heartbeat, dead socket or explicit
//! disconnect).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::metrics::FeedMetrics;
use crate::domain::oracle::{now_ms, AssetId, PriceUpdate};
use crate::ports::envelope::{
    Envelope, ErrorPayload, MessageKind, MetricsPayload, NodesPayload, PricesPayload,
    SubscriptionRequest, WelcomePayload,
};
use crate::ports::events::FeedSignal;
use crate::usecases::OracleService;

/// Server-side view of one connected client.
struct SessionHandle {
    /// Asset filter; empty means "all assets".
    subscriptions: HashSet<AssetId>,
    /// Cleared before each probe, set by any ping/pong from the peer.
    alive: bool,
    /// Timestamp of the last liveness acknowledgment (Unix ms).
    last_pong_ms: u64,
    /// Bounded outbound queue drained by the session's write task.
    outbound: mpsc::Sender<Envelope>,
}

/// WebSocket broadcast hub over the oracle service.
pub struct BroadcastHub {
    service: Arc<OracleService>,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    heartbeat_interval: Duration,
    queue_depth: usize,
    gauges: Option<Arc<FeedMetrics>>,
}

impl BroadcastHub {
    /// Create a hub over the given service.
    pub fn new(
        service: Arc<OracleService>,
        heartbeat_interval: Duration,
        queue_depth: usize,
        gauges: Option<Arc<FeedMetrics>>,
    ) -> Self {
        Self {
            service,
            sessions: RwLock::new(HashMap::new()),
            heartbeat_interval,
            queue_depth,
            gauges,
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Run the hub: accept loop, fan-out task and heartbeat task.
    ///
    /// All three stop deterministically on the shutdown broadcast;
    /// every session is closed on the way out.
    #[instrument(skip_all, name = "broadcast_hub")]
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(address = %addr, "WebSocket hub listening");

        let fanout_hub = Arc::clone(&self);
        let fanout_shutdown = shutdown_tx.subscribe();
        let fanout_task = tokio::spawn(async move {
            fanout_hub.fanout_loop(fanout_shutdown).await;
        });

        let heartbeat_hub = Arc::clone(&self);
        let heartbeat_shutdown = shutdown_tx.subscribe();
        let heartbeat_task = tokio::spawn(async move {
            heartbeat_hub.heartbeat_loop(heartbeat_shutdown).await;
        });

        let mut shutdown_rx = shutdown_tx.subscribe();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Hub received shutdown signal");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let hub = Arc::clone(&self);
                            tokio::spawn(async move {
                                hub.handle_connection(stream, peer.to_string()).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "Accept failed"),
                    }
                }
            }
        }

        // Dropping every outbound sender closes the write tasks, which
        // close their sockets.
        self.sessions.write().await.clear();
        let _ = tokio::join!(fanout_task, heartbeat_task);
        info!("Hub stopped");
        Ok(())
    }

    /// One client connection: handshake, register, read until close.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: String) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(peer = %peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };

        let (mut sink, mut source) = ws_stream.split();
        let session_id = Uuid::new_v4();
        let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(self.queue_depth);

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                session_id,
                SessionHandle {
                    subscriptions: HashSet::new(),
                    alive: true,
                    last_pong_ms: now_ms(),
                    outbound: out_tx.clone(),
                },
            );
        }
        if let Some(gauges) = &self.gauges {
            gauges.connected_sessions.inc();
        }
        info!(session = %session_id, peer = %peer, "Client connected");

        // Welcome handshake carrying the assigned session id.
        let welcome = Envelope::with_data(
            MessageKind::Ping,
            &WelcomePayload {
                client_id: session_id.to_string(),
                message: "Connected to oracle price feed".to_string(),
            },
        )
        .with_id(Uuid::new_v4().to_string());
        let _ = out_tx.send(welcome).await;
        // The registry entry must hold the only sender: eviction drops
        // it, which closes the write task and with it the socket.
        drop(out_tx);

        // Write task: drains the session queue into the socket.
        let writer = tokio::spawn(async move {
            while let Some(env) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&env) else {
                    continue;
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        // Read loop: runs until the peer goes away or is evicted.
        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => self.handle_text(session_id, &text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(session = %session_id, error = %e, "Socket error");
                    break;
                }
            }
        }

        self.remove_session(session_id, "disconnect").await;
        writer.abort();
    }

    /// Parse one inbound frame; malformed JSON is answered with an
    /// `error` envelope and the connection stays open.
    async fn handle_text(&self, session_id: Uuid, text: &str) {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => self.handle_envelope(session_id, envelope).await,
            Err(e) => {
                debug!(session = %session_id, error = %e, "Malformed message");
                self.send_error(session_id, "Invalid message format").await;
            }
        }
    }

    /// Dispatch one inbound envelope.
    async fn handle_envelope(&self, session_id: Uuid, envelope: Envelope) {
        match envelope.kind {
            MessageKind::Subscribe => {
                let Some(request) = envelope.payload::<SubscriptionRequest>() else {
                    self.send_error(session_id, "Subscribe payload must carry assets")
                        .await;
                    return;
                };
                let mut sessions = self.sessions.write().await;
                if let Some(session) = sessions.get_mut(&session_id) {
                    session.subscriptions.extend(request.assets);
                    info!(
                        session = %session_id,
                        assets = session.subscriptions.len(),
                        "Subscription updated"
                    );
                }
            }
            MessageKind::Unsubscribe => {
                let Some(request) = envelope.payload::<SubscriptionRequest>() else {
                    self.send_error(session_id, "Unsubscribe payload must carry assets")
                        .await;
                    return;
                };
                let mut sessions = self.sessions.write().await;
                if let Some(session) = sessions.get_mut(&session_id) {
                    for asset in &request.assets {
                        session.subscriptions.remove(asset);
                    }
                    info!(
                        session = %session_id,
                        assets = session.subscriptions.len(),
                        "Subscription updated"
                    );
                }
            }
            MessageKind::Ping => {
                self.mark_alive(session_id).await;
                let mut reply = Envelope::new(MessageKind::Pong);
                reply.id = envelope.id;
                self.send_to(session_id, reply).await;
            }
            MessageKind::Pong => {
                self.mark_alive(session_id).await;
            }
            MessageKind::GetLatestPrices => {
                let updates: Vec<PriceUpdate> =
                    self.service.latest_prices().await.into_values().collect();
                self.send_to(
                    session_id,
                    Envelope::with_data(MessageKind::PriceUpdate, &PricesPayload { updates }),
                )
                .await;
            }
            MessageKind::GetMetrics => {
                let metrics = self.service.metrics().await;
                self.send_to(
                    session_id,
                    Envelope::with_data(MessageKind::MetricsUpdate, &MetricsPayload { metrics }),
                )
                .await;
            }
            MessageKind::GetNodeStatus => {
                let nodes = self.service.nodes().await;
                self.send_to(
                    session_id,
                    Envelope::with_data(MessageKind::NodeStatus, &NodesPayload { nodes }),
                )
                .await;
            }
            MessageKind::PriceUpdate
            | MessageKind::MetricsUpdate
            | MessageKind::NodeStatus
            | MessageKind::Error
            | MessageKind::Unknown => {
                self.send_error(session_id, "Unsupported message type").await;
            }
        }
    }

    /// Fan generator signals out to sessions until shutdown.
    async fn fanout_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut signals = self.service.subscribe_signals();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return,
                signal = signals.recv() => match signal {
                    Ok(FeedSignal::Prices(batch)) => {
                        if let Some(gauges) = &self.gauges {
                            gauges.updates_generated.inc_by(batch.len() as u64);
                        }
                        self.fanout_prices(&batch).await;
                    }
                    Ok(FeedSignal::Metrics(metrics)) => {
                        if let Some(gauges) = &self.gauges {
                            gauges.active_nodes.set(metrics.active_nodes as i64);
                        }
                        self.broadcast(Envelope::with_data(
                            MessageKind::MetricsUpdate,
                            &MetricsPayload { metrics },
                        ))
                        .await;
                    }
                    Ok(FeedSignal::Nodes(nodes)) => {
                        self.broadcast(Envelope::with_data(
                            MessageKind::NodeStatus,
                            &NodesPayload { nodes },
                        ))
                        .await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "Fan-out lagged behind the generator");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    /// Deliver one batch, filtered per session subscription set.
    async fn fanout_prices(&self, batch: &[PriceUpdate]) {
        let mut dead = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                let relevant: Vec<PriceUpdate> = if session.subscriptions.is_empty() {
                    batch.to_vec()
                } else {
                    batch
                        .iter()
                        .filter(|u| session.subscriptions.contains(&u.asset_id))
                        .cloned()
                        .collect()
                };
                if relevant.is_empty() {
                    continue;
                }
                let envelope = Envelope::with_data(
                    MessageKind::PriceUpdate,
                    &PricesPayload { updates: relevant },
                );
                if session.outbound.try_send(envelope).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.remove_session(id, "push failed").await;
        }
    }

    /// Deliver one envelope to every session, unfiltered.
    async fn broadcast(&self, envelope: Envelope) {
        let mut dead = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.outbound.try_send(envelope.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.remove_session(id, "push failed").await;
        }
    }

    /// Probe sessions; evict any that missed the previous cycle.
    async fn heartbeat_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        // The first tick fires immediately; sessions get a full
        // interval before their first probe.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return,
                _ = ticker.tick() => {
                    let mut dead = Vec::new();
                    {
                        let mut sessions = self.sessions.write().await;
                        for (id, session) in sessions.iter_mut() {
                            if !session.alive {
                                dead.push(*id);
                                continue;
                            }
                            session.alive = false;
                            if session.outbound.try_send(Envelope::new(MessageKind::Ping)).is_err() {
                                dead.push(*id);
                            }
                        }
                    }
                    for id in dead {
                        self.remove_session(id, "missed heartbeat").await;
                    }
                }
            }
        }
    }

    /// Record a liveness acknowledgment from the peer.
    async fn mark_alive(&self, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&session_id) {
            session.alive = true;
            session.last_pong_ms = now_ms();
        }
    }

    /// Send one envelope to one session; a rejected send evicts it.
    async fn send_to(&self, session_id: Uuid, envelope: Envelope) {
        let failed = {
            let sessions = self.sessions.read().await;
            match sessions.get(&session_id) {
                Some(session) => session.outbound.try_send(envelope).is_err(),
                None => false,
            }
        };
        if failed {
            self.remove_session(session_id, "push failed").await;
        }
    }

    /// Send an `error` envelope; the connection stays open.
    async fn send_error(&self, session_id: Uuid, message: &str) {
        self.send_to(
            session_id,
            Envelope::with_data(
                MessageKind::Error,
                &ErrorPayload {
                    error: message.to_string(),
                },
            ),
        )
        .await;
    }

    /// Evicted is terminal: drop the session and its outbound queue.
    async fn remove_session(&self, session_id: Uuid, reason: &str) {
        let removed = self.sessions.write().await.remove(&session_id);
        if let Some(session) = removed {
            if let Some(gauges) = &self.gauges {
                gauges.connected_sessions.dec();
                if reason != "disconnect" {
                    gauges.sessions_evicted.inc();
                }
            }
            info!(
                session = %session_id,
                reason,
                last_ack_ms = session.last_pong_ms,
                "Session removed"
            );
        }
    }
}
