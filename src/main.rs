//! Oracle Price Feed — Entry Point
//!
//! Initializes configuration, logging, the in-memory feed authority
//! and the distribution surface. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create OracleService (registry + histories + metrics + walk)
//! 4. Spawn Prometheus metrics server
//! 5. Spawn generation tick loop
//! 6. Spawn WebSocket broadcast hub
//! 7. Spawn HTTP read/control API
//! 8. Wait for SIGINT → graceful shutdown (signal→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::metrics::FeedMetrics;
use adapters::server::http_api;
use adapters::server::BroadcastHub;
use usecases::OracleService;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.service.log_level)
            }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        assets = config.assets.len(),
        nodes = config.nodes.len(),
        "Starting oracle price feed"
    );

    // ── 3. Shutdown signal channels ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (ready_tx, ready_rx) = watch::channel(true);

    // ── 4. Create the in-memory feed authority ──────────────
    let service = Arc::new(OracleService::new(&config));

    // ── 5. Spawn Prometheus metrics server ──────────────────
    let gauges = if config.metrics.enabled {
        let gauges = Arc::new(FeedMetrics::new().context("Failed to build metrics registry")?);
        let metrics_shutdown = shutdown_tx.subscribe();
        let metrics_bind = config.metrics.bind_address.clone();
        let metrics_ref = Arc::clone(&gauges);
        tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(metrics_bind, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        });
        Some(gauges)
    } else {
        None
    };

    // ── 6. Spawn the generation tick loop ───────────────────
    let generator_service = Arc::clone(&service);
    let generator_shutdown = shutdown_tx.subscribe();
    let generator_handle = tokio::spawn(async move {
        generator_service.run(generator_shutdown).await;
    });

    // ── 7. Spawn the WebSocket broadcast hub ────────────────
    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&service),
        Duration::from_secs(config.server.heartbeat_interval_secs),
        config.server.session_queue_depth,
        gauges,
    ));
    let ws_listener = TcpListener::bind(&config.server.ws_bind)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener on {}", config.server.ws_bind))?;
    let hub_shutdown_tx = shutdown_tx.clone();
    let hub_handle = tokio::spawn(async move {
        if let Err(e) = hub.run(ws_listener, hub_shutdown_tx).await {
            error!(error = %e, "Broadcast hub failed");
        }
    });

    // ── 8. Spawn the HTTP read/control API ──────────────────
    let api_service = Arc::clone(&service);
    let api_listener = TcpListener::bind(&config.server.http_bind)
        .await
        .with_context(|| format!("Failed to bind HTTP API on {}", config.server.http_bind))?;
    let api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = http_api::serve(api_service, api_listener, ready_rx, api_shutdown).await {
            error!(error = %e, "HTTP API failed");
        }
    });

    info!("All tasks spawned — feed is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown ───────────────────────────────────

    // 1. Mark readiness probe unhealthy (→ 503)
    let _ = ready_tx.send(false);

    // 2. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 3. Wait for the distribution surface to drain (up to 10s)
    let _ = tokio::time::timeout(Duration::from_secs(10), hub_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), api_handle).await;

    // 4. Wait for the generator to finish its last tick (up to 5s)
    let _ = tokio::time::timeout(Duration::from_secs(5), generator_handle).await;

    info!("Shutdown complete");
    Ok(())
}
