//! Integration Tests - Feed Server over Real Sockets
//!
//! Boots the oracle service, broadcast hub and HTTP API on ephemeral
//! localhost ports and exercises them with real WebSocket clients and
//! the hybrid connector.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use oracle_price_feed::adapters::client::{
    ConnectorConfig, HttpSnapshotApi, HybridConnector, WsPushChannel,
};
use oracle_price_feed::adapters::server::{http_api, BroadcastHub};
use oracle_price_feed::config::AppConfig;
use oracle_price_feed::ports::envelope::{
    Envelope, MessageKind, MetricsPayload, PricesPayload, SubscriptionRequest,
};
use oracle_price_feed::ports::events::{ClientEvent, ConnectionMode};
use oracle_price_feed::usecases::OracleService;

const CONFIG: &str = r#"
    [service]
    name = "feed-it"

    [feed]
    tick_interval_ms = 60000
    history_cap = 1000
    seed = 42

    [server]

    [client]
    ws_url = "ws://unused"
    http_url = "http://unused"

    [metrics]

    [[assets]]
    id = "BTC"
    symbol = "BTC"
    name = "Bitcoin"
    base_price = 45000.0
    volatility = 0.12

    [[assets]]
    id = "ETH"
    symbol = "ETH"
    name = "Ethereum"
    base_price = 3200.0
    volatility = 0.10

    [[assets]]
    id = "XLM"
    symbol = "XLM"
    name = "Stellar Lumens"
    base_price = 0.12
    volatility = 0.08

    [[nodes]]
    id = "node-x"
    name = "Alpha"
    address = "GNODEX"
    reliability = 0.98

    [[nodes]]
    id = "node-y"
    name = "Beta"
    address = "GNODEY"
    reliability = 0.95

    [[nodes]]
    id = "node-z"
    name = "Gamma"
    address = "GNODEZ"
    reliability = 0.92
"#;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Feed {
    service: Arc<OracleService>,
    shutdown_tx: broadcast::Sender<()>,
    _ready_tx: watch::Sender<bool>,
    ws_url: String,
    http_url: String,
}

/// Boot the full server half on ephemeral ports. The generation loop
/// is NOT started; tests drive ticks via `force_update` for
/// deterministic batches.
async fn start_feed(heartbeat: Duration) -> Feed {
    let config: AppConfig = toml::from_str(CONFIG).unwrap();
    let service = Arc::new(OracleService::new(&config));
    let (shutdown_tx, _) = broadcast::channel(1);
    let (ready_tx, ready_rx) = watch::channel(true);

    let hub = Arc::new(BroadcastHub::new(Arc::clone(&service), heartbeat, 64, None));
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();
    tokio::spawn(hub.run(ws_listener, shutdown_tx.clone()));

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(http_api::serve(
        Arc::clone(&service),
        http_listener,
        ready_rx,
        shutdown_tx.subscribe(),
    ));

    Feed {
        service,
        shutdown_tx,
        _ready_tx: ready_tx,
        ws_url: format!("ws://{ws_addr}"),
        http_url: format!("http://{http_addr}"),
    }
}

async fn ws_connect(url: &str) -> WsClient {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send_env(ws: &mut WsClient, envelope: &Envelope) {
    let text = serde_json::to_string(envelope).unwrap();
    ws.send(Message::Text(text)).await.unwrap();
}

/// Read frames until one of the wanted kind arrives.
async fn recv_kind(ws: &mut WsClient, kind: MessageKind) -> Envelope {
    timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws
                .next()
                .await
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                let envelope: Envelope = serde_json::from_str(&text).unwrap();
                if envelope.kind == kind {
                    return envelope;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

/// Ping/pong round trip. Because the hub handles frames in order,
/// the pong proves every previously sent message has been applied.
async fn sync(ws: &mut WsClient, id: &str) {
    send_env(ws, &Envelope::new(MessageKind::Ping).with_id(id)).await;
    let pong = recv_kind(ws, MessageKind::Pong).await;
    assert_eq!(pong.id.as_deref(), Some(id));
}

fn asset_ids(payload: &PricesPayload) -> HashSet<String> {
    payload.updates.iter().map(|u| u.asset_id.clone()).collect()
}

#[tokio::test]
async fn test_subscription_filtering_and_isolation() {
    let feed = start_feed(Duration::from_secs(30)).await;
    let mut a = ws_connect(&feed.ws_url).await;
    let mut b = ws_connect(&feed.ws_url).await;

    // A filters to {BTC, ETH}; B keeps the empty set (= everything).
    send_env(
        &mut a,
        &Envelope::with_data(
            MessageKind::Subscribe,
            &SubscriptionRequest {
                assets: vec!["BTC".into(), "ETH".into()],
            },
        ),
    )
    .await;
    sync(&mut a, "sub-applied").await;
    // B sends nothing, but the round trip proves the hub has
    // registered the session before the first batch fires.
    sync(&mut b, "b-registered").await;

    feed.service.force_update().await.unwrap();

    let payload: PricesPayload = recv_kind(&mut a, MessageKind::PriceUpdate)
        .await
        .payload()
        .unwrap();
    assert_eq!(
        asset_ids(&payload),
        HashSet::from(["BTC".to_string(), "ETH".to_string()])
    );

    let payload: PricesPayload = recv_kind(&mut b, MessageKind::PriceUpdate)
        .await
        .payload()
        .unwrap();
    assert_eq!(payload.updates.len(), 3);

    // Unsubscribing ETH affects only session A.
    send_env(
        &mut a,
        &Envelope::with_data(
            MessageKind::Unsubscribe,
            &SubscriptionRequest {
                assets: vec!["ETH".into()],
            },
        ),
    )
    .await;
    sync(&mut a, "unsub-applied").await;

    feed.service.force_update().await.unwrap();

    let payload: PricesPayload = recv_kind(&mut a, MessageKind::PriceUpdate)
        .await
        .payload()
        .unwrap();
    assert_eq!(asset_ids(&payload), HashSet::from(["BTC".to_string()]));

    let payload: PricesPayload = recv_kind(&mut b, MessageKind::PriceUpdate)
        .await
        .payload()
        .unwrap();
    assert_eq!(payload.updates.len(), 3);

    let _ = feed.shutdown_tx.send(());
}

#[tokio::test]
async fn test_protocol_errors_keep_connection_open() {
    let feed = start_feed(Duration::from_secs(30)).await;
    let mut ws = ws_connect(&feed.ws_url).await;

    // Unknown message type: error envelope, connection survives.
    ws.send(Message::Text(
        r#"{"type":"selfDestruct","timestamp":1}"#.to_string(),
    ))
    .await
    .unwrap();
    let error = recv_kind(&mut ws, MessageKind::Error).await;
    assert!(error.data.is_some());

    // Malformed JSON: same deal.
    ws.send(Message::Text("not json".to_string())).await.unwrap();
    recv_kind(&mut ws, MessageKind::Error).await;

    // The session still answers queries.
    send_env(&mut ws, &Envelope::new(MessageKind::GetMetrics)).await;
    let reply = recv_kind(&mut ws, MessageKind::MetricsUpdate).await;
    let payload: MetricsPayload = reply.payload().unwrap();
    assert_eq!(payload.metrics.active_nodes, 3);

    let _ = feed.shutdown_tx.send(());
}

#[tokio::test]
async fn test_snapshot_queries_ignore_subscriptions() {
    let feed = start_feed(Duration::from_secs(30)).await;
    feed.service.force_update().await.unwrap();

    let mut ws = ws_connect(&feed.ws_url).await;
    send_env(
        &mut ws,
        &Envelope::with_data(
            MessageKind::Subscribe,
            &SubscriptionRequest {
                assets: vec!["BTC".into()],
            },
        ),
    )
    .await;
    sync(&mut ws, "sub").await;

    // getLatestPrices returns every asset regardless of the filter.
    send_env(&mut ws, &Envelope::new(MessageKind::GetLatestPrices)).await;
    let payload: PricesPayload = recv_kind(&mut ws, MessageKind::PriceUpdate)
        .await
        .payload()
        .unwrap();
    assert_eq!(payload.updates.len(), 3);

    send_env(&mut ws, &Envelope::new(MessageKind::GetNodeStatus)).await;
    let nodes = recv_kind(&mut ws, MessageKind::NodeStatus).await;
    assert!(nodes.data.is_some());

    let _ = feed.shutdown_tx.send(());
}

#[tokio::test]
async fn test_heartbeat_evicts_silent_sessions_only() {
    let feed = start_feed(Duration::from_millis(200)).await;
    let mut responsive = ws_connect(&feed.ws_url).await;
    let mut silent = ws_connect(&feed.ws_url).await;

    // Responsive peer answers every ping envelope for two seconds.
    let responsive_task = tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                msg = responsive.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(envelope) = serde_json::from_str::<Envelope>(&text) {
                            if envelope.kind == MessageKind::Ping {
                                let mut pong = Envelope::new(MessageKind::Pong);
                                pong.id = envelope.id;
                                let text = serde_json::to_string(&pong).unwrap();
                                if responsive.send(Message::Text(text)).await.is_err() {
                                    return false;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return false,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    // The silent peer never acknowledges and must be evicted within
    // two heartbeat cycles.
    let evicted = timeout(Duration::from_secs(3), async {
        loop {
            match silent.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("silent session was not evicted");
    assert!(evicted);

    assert!(
        responsive_task.await.unwrap(),
        "responsive session must survive heartbeat cycles"
    );

    let _ = feed.shutdown_tx.send(());
}

#[tokio::test]
async fn test_hybrid_connector_end_to_end() {
    let feed = start_feed(Duration::from_secs(30)).await;
    feed.service.force_update().await.unwrap();

    let push = Arc::new(WsPushChannel::new(feed.ws_url.clone()));
    let api = Arc::new(
        HttpSnapshotApi::new(feed.http_url.clone(), Duration::from_secs(5)).unwrap(),
    );
    let config = ConnectorConfig {
        max_retries: 3,
        retry_delay: Duration::from_millis(200),
        poll_interval: Duration::from_millis(200),
        ping_interval: Duration::from_secs(30),
    };
    let connector = HybridConnector::new(push, api, config);
    let mut events = connector.events();
    let mut mode = connector.mode_watch();

    connector.connect();
    mode.wait_for(|m| *m == ConnectionMode::ConnectedPush)
        .await
        .unwrap();

    connector.subscribe_assets(vec!["BTC".into()]);
    tokio::time::sleep(Duration::from_millis(200)).await;
    feed.service.force_update().await.unwrap();

    let updates = wait_for_prices(&mut events).await;
    assert!(updates.iter().any(|u| u.asset_id == "BTC"));

    // Forced fallback to polling keeps the same event surface, with
    // the recorded subscription applied client-side.
    connector.switch_to_http();
    mode.wait_for(|m| *m == ConnectionMode::ConnectedPull)
        .await
        .unwrap();

    let updates = wait_for_prices(&mut events).await;
    assert!(!updates.is_empty());
    assert!(updates.iter().all(|u| u.asset_id == "BTC"));

    connector.disconnect();
    mode.wait_for(|m| *m == ConnectionMode::Offline)
        .await
        .unwrap();

    let _ = feed.shutdown_tx.send(());
}

async fn wait_for_prices(
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Vec<oracle_price_feed::domain::oracle::PriceUpdate> {
    timeout(Duration::from_secs(5), async {
        loop {
            if let ClientEvent::Prices(updates) = events.recv().await.unwrap() {
                return updates;
            }
        }
    })
    .await
    .expect("no price event arrived")
}
