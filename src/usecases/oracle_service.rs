//! Oracle Service - Single In-memory Feed Authority
//!
//! Owns the registry, per-asset histories, metrics aggregator and the
//! price walk behind one lock, and drives generation from a single
//! periodic timer. Ticks are sequential and non-overlapping by
//! construction: one timer, one write lock, no awaits inside a tick.
//!
//! Each tick emits `FeedSignal::Prices` then `FeedSignal::Metrics` on
//! a broadcast channel consumed by the hub; node toggles additionally
//! emit `FeedSignal::Nodes`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::error::FeedError;
use crate::domain::history::PriceHistory;
use crate::domain::metrics::MetricsAggregator;
use crate::domain::oracle::{
    now_ms, Asset, AssetId, MetricsSnapshot, NodeId, OracleNode, PriceUpdate,
};
use crate::domain::registry::NodeRegistry;
use crate::domain::walk::PriceWalk;
use crate::ports::events::FeedSignal;

/// Window for the `update_frequency` metric.
const FREQUENCY_WINDOW_MS: u64 = 60_000;

/// Mutable feed state guarded by one lock.
struct FeedState {
    registry: NodeRegistry,
    histories: HashMap<AssetId, PriceHistory>,
    metrics: MetricsAggregator,
    walk: PriceWalk,
}

/// The feed's single in-memory authority.
pub struct OracleService {
    assets: Vec<Asset>,
    state: RwLock<FeedState>,
    signal_tx: broadcast::Sender<FeedSignal>,
    tick_interval: Duration,
    history_cap: usize,
    source_label: String,
}

impl OracleService {
    /// Build the service from validated configuration.
    pub fn new(config: &AppConfig) -> Self {
        let assets: Vec<Asset> = config
            .assets
            .iter()
            .map(|a| Asset {
                id: a.id.clone(),
                symbol: a.symbol.clone(),
                name: a.name.clone(),
                base_price: a.base_price,
                volatility: a.volatility,
            })
            .collect();

        let nodes: Vec<OracleNode> = config
            .nodes
            .iter()
            .map(|n| OracleNode::new(&n.id, &n.name, &n.address, n.reliability))
            .collect();

        let (signal_tx, _) = broadcast::channel(256);

        Self {
            state: RwLock::new(FeedState {
                registry: NodeRegistry::new(nodes),
                histories: HashMap::new(),
                metrics: MetricsAggregator::new(),
                walk: PriceWalk::new(config.feed.seed),
            }),
            assets,
            signal_tx,
            tick_interval: Duration::from_millis(config.feed.tick_interval_ms),
            history_cap: config.feed.history_cap,
            source_label: config.feed.source_label.clone(),
        }
    }

    /// Receiver for per-tick signals.
    pub fn subscribe_signals(&self) -> broadcast::Receiver<FeedSignal> {
        self.signal_tx.subscribe()
    }

    /// Static asset catalog.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Run the generation loop until shutdown.
    ///
    /// One `tokio::time::interval` drives ticks; a missed tick is
    /// skipped, never replayed, so a stalled runtime can't produce
    /// a burst of back-to-back batches.
    #[instrument(skip(self, shutdown_rx), name = "generation_loop")]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            assets = self.assets.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "Price generation started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Generation loop received shutdown signal");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Tick skipped");
                    }
                }
            }
        }
    }

    /// Run one generation tick immediately, out of band.
    ///
    /// Serialized behind the same state lock as timed ticks, so the
    /// two can never interleave.
    pub async fn force_update(&self) -> Result<(), FeedError> {
        self.tick().await
    }

    /// Generate one batch: one update per asset, attributed to a
    /// randomly chosen active node.
    async fn tick(&self) -> Result<(), FeedError> {
        let (batch, snapshot) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;

            let pool = state.registry.active_nodes();
            if pool.is_empty() {
                warn!("No active oracle nodes available, skipping tick");
                return Ok(());
            }

            let now = now_ms();
            let mut batch = Vec::with_capacity(self.assets.len());

            for asset in &self.assets {
                let node = state
                    .walk
                    .pick(&pool)
                    .ok_or_else(|| FeedError::Generation("empty node pool".into()))?;

                let last_price = state
                    .histories
                    .get(&asset.id)
                    .and_then(|h| h.latest())
                    .and_then(PriceUpdate::price);

                let price = state
                    .walk
                    .next_price(asset.base_price, asset.volatility, last_price);

                let update = PriceUpdate {
                    id: Uuid::new_v4(),
                    asset_id: asset.id.clone(),
                    symbol: asset.symbol.clone(),
                    raw_price: PriceUpdate::raw_price_string(price),
                    formatted_price: PriceUpdate::format_price(price),
                    timestamp_ms: now,
                    confidence: state.walk.confidence(node.reliability),
                    source: self.source_label.clone(),
                    change_24h: state.walk.change_24h(),
                    volume_24h: state.walk.volume_24h(),
                    source_node_id: node.id.clone(),
                    correlation_hash: Some(state.walk.correlation_hash(now)),
                };

                state
                    .histories
                    .entry(asset.id.clone())
                    .or_insert_with(|| PriceHistory::new(self.history_cap))
                    .push(update.clone());
                state.registry.record_update(&node.id, now);

                batch.push(update);
            }

            refresh_node_confidences(state);

            let recent = state
                .histories
                .values()
                .map(|h| h.count_since(now.saturating_sub(FREQUENCY_WINDOW_MS)))
                .sum();
            let snapshot = state.metrics.record_batch(
                &batch,
                state.registry.active_count(),
                state.registry.total_count(),
                recent,
                now,
            );

            (batch, snapshot)
        };

        debug!(
            batch = batch.len(),
            total = snapshot.total_updates,
            "Generated price batch"
        );

        // Ignore send errors: no subscribers is a valid state.
        let _ = self.signal_tx.send(FeedSignal::Prices(batch));
        let _ = self.signal_tx.send(FeedSignal::Metrics(snapshot));

        Ok(())
    }

    /// Most recent update per asset.
    pub async fn latest_prices(&self) -> HashMap<AssetId, PriceUpdate> {
        let state = self.state.read().await;
        state
            .histories
            .iter()
            .filter_map(|(id, h)| h.latest().map(|u| (id.clone(), u.clone())))
            .collect()
    }

    /// Updates for one asset within the trailing `hours` window.
    pub async fn price_history(
        &self,
        asset_id: &str,
        hours: u32,
    ) -> Result<Vec<PriceUpdate>, FeedError> {
        if !self.assets.iter().any(|a| a.id == asset_id) {
            return Err(FeedError::not_found("asset", asset_id));
        }
        let cutoff = now_ms().saturating_sub(u64::from(hours) * 3_600_000);
        let state = self.state.read().await;
        Ok(state
            .histories
            .get(asset_id)
            .map(|h| h.since(cutoff))
            .unwrap_or_default())
    }

    /// Current metrics snapshot copy.
    pub async fn metrics(&self) -> MetricsSnapshot {
        self.state.read().await.metrics.snapshot()
    }

    /// Node population snapshot.
    pub async fn nodes(&self) -> Vec<OracleNode> {
        self.state.read().await.registry.nodes()
    }

    /// Toggle a node's active flag and broadcast the new population.
    ///
    /// Idempotent; unknown ids yield `FeedError::NotFound`.
    pub async fn set_node_active(
        &self,
        node_id: &NodeId,
        active: bool,
    ) -> Result<OracleNode, FeedError> {
        let (node, nodes) = {
            let mut state = self.state.write().await;
            let node = state.registry.set_node_active(node_id, active)?;
            (node, state.registry.nodes())
        };
        let _ = self.signal_tx.send(FeedSignal::Nodes(nodes));
        Ok(node)
    }
}

/// Recompute every node's mean confidence over the retained history.
fn refresh_node_confidences(state: &mut FeedState) {
    let mut sums: HashMap<NodeId, (f64, u64)> = HashMap::new();
    for history in state.histories.values() {
        for update in history.iter() {
            let entry = sums.entry(update.source_node_id.clone()).or_insert((0.0, 0));
            entry.0 += f64::from(update.confidence);
            entry.1 += 1;
        }
    }
    for (node_id, (total, count)) in sums {
        state
            .registry
            .set_average_confidence(&node_id, total / count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_config() -> AppConfig {
        let toml = r#"
            [service]
            name = "feed-test"

            [feed]
            tick_interval_ms = 1000
            history_cap = 1000
            seed = 42

            [server]

            [client]
            ws_url = "ws://localhost:9001"
            http_url = "http://localhost:8080"

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
        toml::from_str(toml).unwrap()
    }

    #[tokio::test]
    async fn test_tick_produces_one_update_per_asset() {
        let service = OracleService::new(&test_config());
        service.force_update().await.unwrap();

        let latest = service.latest_prices().await;
        assert_eq!(latest.len(), 2);
        assert!(latest.contains_key("BTC"));
        assert!(latest.contains_key("ETH"));

        let metrics = service.metrics().await;
        assert_eq!(metrics.total_updates, 2);
        assert!((80.0..=100.0).contains(&metrics.average_confidence));
    }

    #[tokio::test]
    async fn test_no_active_nodes_skips_tick() {
        let service = OracleService::new(&test_config());
        for id in ["node-x", "node-y", "node-z"] {
            service.set_node_active(&id.to_string(), false).await.unwrap();
        }

        service.force_update().await.unwrap();
        assert!(service.latest_prices().await.is_empty());
        assert_eq!(service.metrics().await.total_updates, 0);
    }

    #[tokio::test]
    async fn test_deactivated_node_excluded_from_attribution() {
        let service = OracleService::new(&test_config());
        service
            .set_node_active(&"node-x".to_string(), false)
            .await
            .unwrap();

        for _ in 0..20 {
            service.force_update().await.unwrap();
        }

        let history = service.price_history("BTC", 24).await.unwrap();
        assert!(!history.is_empty());
        for update in service
            .price_history("ETH", 24)
            .await
            .unwrap()
            .iter()
            .chain(history.iter())
        {
            assert_ne!(update.source_node_id, "node-x");
        }

        // Uptime reflects the shrunken pool after the next batch.
        let metrics = service.metrics().await;
        assert!((metrics.uptime_percent - 66.666_666_666_666_67).abs() < 1e-9);

        // Recovery restores eligibility and full uptime.
        service
            .set_node_active(&"node-x".to_string(), true)
            .await
            .unwrap();
        service.force_update().await.unwrap();
        assert!((service.metrics().await.uptime_percent - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_prices_respect_floor() {
        let service = OracleService::new(&test_config());
        for _ in 0..200 {
            service.force_update().await.unwrap();
        }

        for update in service.price_history("BTC", 24).await.unwrap() {
            assert!(update.price().unwrap() >= 4_500.0);
        }
    }

    #[tokio::test]
    async fn test_unknown_asset_history_is_not_found() {
        let service = OracleService::new(&test_config());
        let err = service.price_history("DOGE", 24).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_node_toggle_is_not_found() {
        let service = OracleService::new(&test_config());
        let err = service
            .set_node_active(&"node-missing".to_string(), false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_signals_emitted_per_tick() {
        let service = OracleService::new(&test_config());
        let mut rx = service.subscribe_signals();

        service.force_update().await.unwrap();

        match rx.recv().await.unwrap() {
            FeedSignal::Prices(batch) => assert_eq!(batch.len(), 2),
            other => panic!("expected prices signal, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            FeedSignal::Metrics(snapshot) => assert_eq!(snapshot.total_updates, 2),
            other => panic!("expected metrics signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_node_confidence_tracks_history() {
        let service = OracleService::new(&test_config());
        for _ in 0..10 {
            service.force_update().await.unwrap();
        }

        let nodes = service.nodes().await;
        let attributed: Vec<_> = nodes.iter().filter(|n| n.update_count > 0).collect();
        assert!(!attributed.is_empty());
        for node in attributed {
            assert!((80.0..=100.0).contains(&node.average_confidence));
            assert!(node.last_update_ms > 0);
        }
    }
}
