//! Hybrid Connector - Push/Pull Failover State Machine
//!
//! Consumer-facing facade over the push channel and the polling
//! transport. One supervisor task owns the state machine:
//!
//! `Offline` -> `ConnectingPush` -> `ConnectedPush`, and on repeated
//! push failures (or a manual switch) -> `ConnectedPull`. `Offline`
//! is terminal again after `disconnect()`.
//!
//! The supervisor owns whichever transport session is live and drops
//! it before starting another, so at most one transport runs at any
//! time by construction. Commands (subscriptions, switches,
//! disconnect) arrive on an mpsc channel and are honored in every
//! state, including mid-retry-delay.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::poller::PricePoller;
use crate::domain::oracle::AssetId;
use crate::ports::envelope::{
    Envelope, ErrorPayload, MessageKind, MetricsPayload, NodesPayload, PricesPayload,
    SubscriptionRequest,
};
use crate::ports::events::{ClientEvent, ConnectionMode};
use crate::ports::transport::{PushChannel, PushSession, SnapshotApi};

/// Event fan-out capacity towards connector consumers.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Connector tuning knobs.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Reconnect attempts before falling back to polling.
    pub max_retries: u32,
    /// Delay between reconnect attempts.
    pub retry_delay: Duration,
    /// Polling cadence in pull mode.
    pub poll_interval: Duration,
    /// Liveness ping cadence in push mode. No inbound traffic for
    /// twice this duration is treated as a dead connection.
    pub ping_interval: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::ClientConfig> for ConnectorConfig {
    fn from(config: &crate::config::ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            ping_interval: Duration::from_secs(config.ping_interval_secs),
        }
    }
}

/// Control messages into the supervisor task.
enum Command {
    Subscribe(Vec<AssetId>),
    Unsubscribe(Vec<AssetId>),
    SwitchToPush,
    SwitchToPull,
    RequestLatestPrices,
    RequestMetrics,
    RequestNodeStatus,
    Disconnect,
}

/// Where the supervisor goes next.
enum Flow {
    ToPush,
    ToPull,
    Stop,
}

/// Why a push session ended.
enum SessionEnd {
    /// A command decided the next state.
    Flow(Flow),
    /// The transport failed; the retry/fallback path decides.
    Failed(String),
}

/// Hybrid feed connector handle.
///
/// An explicit context object owning its own lifecycle: construct,
/// `connect()`, `disconnect()`. Cheap to share behind an `Arc`.
pub struct HybridConnector {
    push: Arc<dyn PushChannel>,
    api: Arc<dyn SnapshotApi>,
    config: ConnectorConfig,
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<ClientEvent>,
    mode_rx: watch::Receiver<ConnectionMode>,
    pending: std::sync::Mutex<Option<SupervisorParts>>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Pieces handed to the supervisor on `connect()`.
struct SupervisorParts {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    mode_tx: watch::Sender<ConnectionMode>,
}

impl HybridConnector {
    /// Build a connector over the two transports. No I/O happens
    /// until `connect()`.
    pub fn new(
        push: Arc<dyn PushChannel>,
        api: Arc<dyn SnapshotApi>,
        config: ConnectorConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (mode_tx, mode_rx) = watch::channel(ConnectionMode::Offline);
        Self {
            push,
            api,
            config,
            cmd_tx,
            event_tx,
            mode_rx,
            pending: std::sync::Mutex::new(Some(SupervisorParts { cmd_rx, mode_tx })),
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Start the supervisor. Calling again is a no-op.
    pub fn connect(&self) {
        let Some(parts) = self.pending.lock().expect("connector lock").take() else {
            debug!("Connector already started");
            return;
        };

        let supervisor = Supervisor {
            push: Arc::clone(&self.push),
            poller: PricePoller::new(Arc::clone(&self.api)),
            config: self.config.clone(),
            cmd_rx: parts.cmd_rx,
            event_tx: self.event_tx.clone(),
            mode_tx: parts.mode_tx,
            subscriptions: HashSet::new(),
            retries: 0,
        };
        let handle = tokio::spawn(supervisor.run());
        *self.handle.lock().expect("connector lock") = Some(handle);
    }

    /// Tear down the active transport and go `Offline`.
    ///
    /// Idempotent: calling on an already-offline connector does
    /// nothing.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Subscribe to the typed event stream.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Current connection mode.
    pub fn mode(&self) -> ConnectionMode {
        *self.mode_rx.borrow()
    }

    /// Watch channel over mode transitions.
    pub fn mode_watch(&self) -> watch::Receiver<ConnectionMode> {
        self.mode_rx.clone()
    }

    /// Add assets to the requested subscription set.
    ///
    /// The set is re-issued automatically on every reconnection or
    /// mode switch, so callers never resubscribe manually.
    pub fn subscribe_assets(&self, assets: Vec<AssetId>) {
        let _ = self.cmd_tx.send(Command::Subscribe(assets));
    }

    /// Remove assets from the requested subscription set.
    pub fn unsubscribe_assets(&self, assets: Vec<AssetId>) {
        let _ = self.cmd_tx.send(Command::Unsubscribe(assets));
    }

    /// Force pull mode, tearing down the push session if live.
    pub fn switch_to_http(&self) {
        let _ = self.cmd_tx.send(Command::SwitchToPull);
    }

    /// Force push mode, stopping the poller if live.
    pub fn switch_to_websocket(&self) {
        let _ = self.cmd_tx.send(Command::SwitchToPush);
    }

    /// Ask for a one-off latest-prices snapshot.
    pub fn request_latest_prices(&self) {
        let _ = self.cmd_tx.send(Command::RequestLatestPrices);
    }

    /// Ask for a one-off metrics snapshot.
    pub fn request_metrics(&self) {
        let _ = self.cmd_tx.send(Command::RequestMetrics);
    }

    /// Ask for a one-off node-status snapshot.
    pub fn request_node_status(&self) {
        let _ = self.cmd_tx.send(Command::RequestNodeStatus);
    }

    /// Whether the supervisor task is currently running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for HybridConnector {
    fn drop(&mut self) {
        // A dropped handle must not leave a headless supervisor
        // holding sockets or timers.
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// The task that owns the state machine and the live transport.
struct Supervisor {
    push: Arc<dyn PushChannel>,
    poller: PricePoller,
    config: ConnectorConfig,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<ClientEvent>,
    mode_tx: watch::Sender<ConnectionMode>,
    subscriptions: HashSet<AssetId>,
    retries: u32,
}

impl Supervisor {
    #[instrument(skip(self), name = "connector")]
    async fn run(mut self) {
        let mut flow = Flow::ToPush;
        loop {
            flow = match flow {
                Flow::ToPush => self.push_cycle().await,
                Flow::ToPull => self.pull_cycle().await,
                Flow::Stop => break,
            };
        }
        self.set_mode(ConnectionMode::Offline);
        info!("Connector offline");
    }

    /// One push attempt: connect, resubscribe, run the session.
    async fn push_cycle(&mut self) -> Flow {
        self.set_mode(ConnectionMode::ConnectingPush);

        let push = Arc::clone(&self.push);
        let open = push.open();
        tokio::pin!(open);

        // Stay responsive to commands while the connect is in flight.
        let session = loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => return Flow::Stop,
                    Some(Command::SwitchToPull) => return Flow::ToPull,
                    Some(cmd) => self.absorb_idle_command(cmd),
                },
                result = &mut open => match result {
                    Ok(session) => break session,
                    Err(e) => return self.push_failure(&e.to_string()).await,
                },
            }
        };

        self.set_mode(ConnectionMode::ConnectedPush);
        self.retries = 0;

        if !self.subscriptions.is_empty() {
            let request = SubscriptionRequest {
                assets: self.subscriptions.iter().cloned().collect(),
            };
            let envelope = Envelope::with_data(MessageKind::Subscribe, &request);
            if session.outbound.send(envelope).await.is_err() {
                return self.push_failure("resubscribe send failed").await;
            }
        }

        match self.push_session(session).await {
            SessionEnd::Flow(flow) => flow,
            SessionEnd::Failed(message) => self.push_failure(&message).await,
        }
    }

    /// Drive one live push session until it dies or a command ends it.
    async fn push_session(&mut self, mut session: PushSession) -> SessionEnd {
        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping.tick().await;

        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => return SessionEnd::Flow(Flow::Stop),
                    Some(Command::SwitchToPull) => {
                        info!("Manual switch to polling transport");
                        return SessionEnd::Flow(Flow::ToPull);
                    }
                    Some(Command::SwitchToPush) => {}
                    Some(Command::Subscribe(assets)) => {
                        self.subscriptions.extend(assets.iter().cloned());
                        let envelope = Envelope::with_data(
                            MessageKind::Subscribe,
                            &SubscriptionRequest { assets },
                        );
                        if session.outbound.send(envelope).await.is_err() {
                            return SessionEnd::Failed("subscribe send failed".into());
                        }
                    }
                    Some(Command::Unsubscribe(assets)) => {
                        for asset in &assets {
                            self.subscriptions.remove(asset);
                        }
                        let envelope = Envelope::with_data(
                            MessageKind::Unsubscribe,
                            &SubscriptionRequest { assets },
                        );
                        if session.outbound.send(envelope).await.is_err() {
                            return SessionEnd::Failed("unsubscribe send failed".into());
                        }
                    }
                    Some(Command::RequestLatestPrices) => {
                        if session.outbound.send(Envelope::new(MessageKind::GetLatestPrices)).await.is_err() {
                            return SessionEnd::Failed("request send failed".into());
                        }
                    }
                    Some(Command::RequestMetrics) => {
                        if session.outbound.send(Envelope::new(MessageKind::GetMetrics)).await.is_err() {
                            return SessionEnd::Failed("request send failed".into());
                        }
                    }
                    Some(Command::RequestNodeStatus) => {
                        if session.outbound.send(Envelope::new(MessageKind::GetNodeStatus)).await.is_err() {
                            return SessionEnd::Failed("request send failed".into());
                        }
                    }
                },
                inbound = session.inbound.recv() => match inbound {
                    Some(envelope) => {
                        last_inbound = Instant::now();
                        if let Err(message) = self.handle_push_envelope(envelope, &session).await {
                            return SessionEnd::Failed(message);
                        }
                    }
                    None => return SessionEnd::Failed("connection closed".into()),
                },
                _ = ping.tick() => {
                    // No traffic for two probe intervals means the peer
                    // is gone even if the socket looks open.
                    if last_inbound.elapsed() >= self.config.ping_interval * 2 {
                        return SessionEnd::Failed("heartbeat timeout".into());
                    }
                    if session.outbound.send(Envelope::new(MessageKind::Ping)).await.is_err() {
                        return SessionEnd::Failed("ping send failed".into());
                    }
                }
            }
        }
    }

    /// Normalize one inbound envelope into client events.
    ///
    /// Only a failed reply send is fatal; anything malformed is
    /// dropped with a debug log and the session stays up.
    async fn handle_push_envelope(
        &mut self,
        envelope: Envelope,
        session: &PushSession,
    ) -> Result<(), String> {
        match envelope.kind {
            MessageKind::PriceUpdate => {
                if let Some(payload) = envelope.payload::<PricesPayload>() {
                    self.emit(ClientEvent::Prices(payload.updates));
                }
            }
            MessageKind::MetricsUpdate => {
                if let Some(payload) = envelope.payload::<MetricsPayload>() {
                    self.emit(ClientEvent::Metrics(payload.metrics));
                }
            }
            MessageKind::NodeStatus => {
                if let Some(payload) = envelope.payload::<NodesPayload>() {
                    self.emit(ClientEvent::Nodes(payload.nodes));
                }
            }
            MessageKind::Error => {
                if let Some(payload) = envelope.payload::<ErrorPayload>() {
                    self.emit(ClientEvent::Error {
                        mode: ConnectionMode::ConnectedPush,
                        message: payload.error,
                    });
                }
            }
            MessageKind::Ping => {
                let mut reply = Envelope::new(MessageKind::Pong);
                reply.id = envelope.id;
                if session.outbound.send(reply).await.is_err() {
                    return Err("pong send failed".into());
                }
            }
            MessageKind::Pong => {}
            other => debug!(kind = ?other, "Unexpected envelope kind from feed"),
        }
        Ok(())
    }

    /// Retry/fallback path shared by connect and session failures.
    async fn push_failure(&mut self, message: &str) -> Flow {
        self.emit(ClientEvent::Error {
            mode: *self.mode_tx.borrow(),
            message: message.to_string(),
        });

        self.retries += 1;
        if self.retries > self.config.max_retries {
            warn!(
                attempts = self.retries - 1,
                "Push retries exhausted, falling back to polling"
            );
            return Flow::ToPull;
        }

        info!(
            attempt = self.retries,
            max = self.config.max_retries,
            "Retrying push connect after delay"
        );

        let delay = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => return Flow::Stop,
                    Some(Command::SwitchToPull) => return Flow::ToPull,
                    Some(Command::SwitchToPush) => {
                        // A manual switch is an explicit restart.
                        self.retries = 0;
                        return Flow::ToPush;
                    }
                    Some(cmd) => self.absorb_idle_command(cmd),
                },
                _ = &mut delay => return Flow::ToPush,
            }
        }
    }

    /// Run the polling transport until a command ends it.
    async fn pull_cycle(&mut self) -> Flow {
        self.set_mode(ConnectionMode::ConnectedPull);
        self.retries = 0;
        self.poller.reset();

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => return Flow::Stop,
                    Some(Command::SwitchToPush) => {
                        info!("Manual switch to push transport");
                        return Flow::ToPush;
                    }
                    Some(Command::SwitchToPull) => {}
                    Some(Command::Subscribe(assets)) => {
                        self.subscriptions.extend(assets);
                    }
                    Some(Command::Unsubscribe(assets)) => {
                        for asset in &assets {
                            self.subscriptions.remove(asset);
                        }
                    }
                    Some(Command::RequestLatestPrices
                        | Command::RequestMetrics
                        | Command::RequestNodeStatus) => {
                        self.poll_and_emit().await;
                    }
                },
                _ = ticker.tick() => {
                    self.poll_and_emit().await;
                }
            }
        }
    }

    /// One polling round; fetch errors surface as error events.
    async fn poll_and_emit(&mut self) {
        let events = self.poller.poll(&self.subscriptions).await;
        for event in events {
            self.emit(event);
        }
    }

    /// Apply a command that needs no live transport.
    fn absorb_idle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe(assets) => self.subscriptions.extend(assets),
            Command::Unsubscribe(assets) => {
                for asset in &assets {
                    self.subscriptions.remove(asset);
                }
            }
            Command::SwitchToPush => {}
            _ => debug!("Dropping request while no transport is live"),
        }
    }

    /// Publish a mode transition (watch + event stream).
    fn set_mode(&self, mode: ConnectionMode) {
        let previous = *self.mode_tx.borrow();
        if previous == mode {
            return;
        }
        self.mode_tx.send_replace(mode);
        info!(from = %previous, to = %mode, "Connection mode changed");
        let _ = self.event_tx.send(ClientEvent::ModeChanged {
            from: previous,
            to: mode,
        });
    }

    /// Fan one event out to consumers; no receivers is fine.
    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_config_conversion() {
        let client = ClientConfig {
            ws_url: "ws://localhost:9001".into(),
            http_url: "http://localhost:8080".into(),
            max_retries: 5,
            retry_delay_ms: 1500,
            poll_interval_ms: 2500,
            ping_interval_secs: 10,
            request_timeout_ms: 1000,
        };
        let config = ConnectorConfig::from(&client);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.ping_interval, Duration::from_secs(10));
    }
}
