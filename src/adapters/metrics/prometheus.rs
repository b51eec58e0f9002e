//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers generation throughput, session population and eviction
//! counts.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Centralized Prometheus metrics for the feed.
///
/// All metrics follow the naming convention `oracle_feed_*`.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Total price updates generated.
    pub updates_generated: IntCounter,
    /// Currently connected WebSocket sessions.
    pub connected_sessions: IntGauge,
    /// Sessions evicted (heartbeat misses and dead sockets).
    pub sessions_evicted: IntCounter,
    /// Currently active oracle nodes.
    pub active_nodes: IntGauge,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let updates_generated = IntCounter::new(
            "oracle_feed_updates_generated_total",
            "Total synthetic price updates generated",
        )?;
        let connected_sessions = IntGauge::new(
            "oracle_feed_connected_sessions",
            "Currently connected WebSocket sessions",
        )?;
        let sessions_evicted = IntCounter::new(
            "oracle_feed_sessions_evicted_total",
            "Sessions evicted on missed heartbeat or dead socket",
        )?;
        let active_nodes = IntGauge::new(
            "oracle_feed_active_nodes",
            "Currently active oracle nodes",
        )?;

        registry.register(Box::new(updates_generated.clone()))?;
        registry.register(Box::new(connected_sessions.clone()))?;
        registry.register(Box::new(sessions_evicted.clone()))?;
        registry.register(Box::new(active_nodes.clone()))?;

        Ok(Self {
            registry,
            updates_generated,
            connected_sessions,
            sessions_evicted,
            active_nodes,
        })
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = metrics_self.registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    if encoder.encode(&metric_families, &mut buffer).is_err() {
                        return String::new();
                    }
                    String::from_utf8(buffer).unwrap_or_default()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
