//! HTTP Read/Control API - axum Endpoints over the Oracle Service
//!
//! The read endpoints are what the polling transport diffs against;
//! the control endpoints drive failure simulation and out-of-band
//! ticks. Liveness/readiness probes ride on the same router.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::domain::error::FeedError;
use crate::domain::oracle::{AssetId, MetricsSnapshot, OracleNode, PriceUpdate};
use crate::ports::envelope::ErrorPayload;
use crate::usecases::OracleService;

/// Shared state for all API handlers.
#[derive(Clone)]
struct ApiState {
    service: Arc<OracleService>,
    ready_rx: watch::Receiver<bool>,
}

/// `?hours=N` query on the history endpoint.
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    hours: Option<u32>,
}

/// FeedError rendered as an HTTP response.
struct ApiError(FeedError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(ErrorPayload {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        Self(e)
    }
}

/// Build the API router.
pub fn router(service: Arc<OracleService>, ready_rx: watch::Receiver<bool>) -> Router {
    let state = ApiState { service, ready_rx };
    Router::new()
        .route("/latest-prices", get(latest_prices))
        .route("/metrics", get(metrics))
        .route("/nodes", get(nodes))
        .route("/price-history/:asset_id", get(price_history))
        .route("/simulate-failure/:node_id", post(simulate_failure))
        .route("/simulate-recovery/:node_id", post(simulate_recovery))
        .route("/force-update", post(force_update))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Serve the API on a pre-bound listener until shutdown.
#[instrument(skip_all, name = "http_api")]
pub async fn serve(
    service: Arc<OracleService>,
    listener: tokio::net::TcpListener,
    ready_rx: watch::Receiver<bool>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(service, ready_rx);
    let addr = listener.local_addr()?;
    info!(address = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

/// `GET /latest-prices` — most recent update per asset.
async fn latest_prices(State(state): State<ApiState>) -> Json<HashMap<AssetId, PriceUpdate>> {
    Json(state.service.latest_prices().await)
}

/// `GET /metrics` — current metrics snapshot.
async fn metrics(State(state): State<ApiState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics().await)
}

/// `GET /nodes` — node population snapshot.
async fn nodes(State(state): State<ApiState>) -> Json<Vec<OracleNode>> {
    Json(state.service.nodes().await)
}

/// `GET /price-history/{asset_id}?hours=N` — trailing window, default 24h.
async fn price_history(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PriceUpdate>>, ApiError> {
    let hours = query.hours.unwrap_or(24);
    Ok(Json(state.service.price_history(&asset_id, hours).await?))
}

/// `POST /simulate-failure/{node_id}` — deactivate a node.
async fn simulate_failure(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> Result<Json<OracleNode>, ApiError> {
    Ok(Json(state.service.set_node_active(&node_id, false).await?))
}

/// `POST /simulate-recovery/{node_id}` — reactivate a node.
async fn simulate_recovery(
    State(state): State<ApiState>,
    Path(node_id): Path<String>,
) -> Result<Json<OracleNode>, ApiError> {
    Ok(Json(state.service.set_node_active(&node_id, true).await?))
}

/// `POST /force-update` — one immediate generator tick.
async fn force_update(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    state.service.force_update().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 503 during graceful shutdown.
async fn readiness(State(state): State<ApiState>) -> impl IntoResponse {
    if *state.ready_rx.borrow() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
