//! HTTP Snapshot Client - reqwest Implementation of the Snapshot API
//!
//! Thin typed wrapper over the feed's read/control endpoints. Used by
//! the polling transport and available directly for tooling.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::domain::error::FeedError;
use crate::domain::oracle::{AssetId, MetricsSnapshot, OracleNode, PriceUpdate};
use crate::ports::transport::SnapshotApi;

/// reqwest-backed snapshot API client.
pub struct HttpSnapshotApi {
    http: Client,
    base_url: String,
}

impl HttpSnapshotApi {
    /// Create a client for the given API base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Execute a GET and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("GET {path} failed: {e}")))?;
        Self::decode(path, response).await
    }

    /// Execute a POST and decode the JSON body.
    async fn post_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("POST {path} failed: {e}")))?;
        Self::decode(path, response).await
    }

    /// Map status codes into the feed's error taxonomy, then decode.
    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, FeedError> {
        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| FeedError::Protocol(format!("Invalid body from {path}: {e}"))),
            StatusCode::NOT_FOUND => Err(FeedError::not_found("resource", path)),
            status => Err(FeedError::Transport(format!("{path} returned {status}"))),
        }
    }
}

#[async_trait]
impl SnapshotApi for HttpSnapshotApi {
    async fn latest_prices(&self) -> Result<HashMap<AssetId, PriceUpdate>, FeedError> {
        self.get_json("/latest-prices").await
    }

    async fn metrics(&self) -> Result<MetricsSnapshot, FeedError> {
        self.get_json("/metrics").await
    }

    async fn nodes(&self) -> Result<Vec<OracleNode>, FeedError> {
        self.get_json("/nodes").await
    }

    async fn price_history(
        &self,
        asset_id: &str,
        hours: u32,
    ) -> Result<Vec<PriceUpdate>, FeedError> {
        self.get_json(&format!("/price-history/{asset_id}?hours={hours}"))
            .await
    }

    async fn simulate_failure(&self, node_id: &str) -> Result<OracleNode, FeedError> {
        self.post_json(&format!("/simulate-failure/{node_id}")).await
    }

    async fn simulate_recovery(&self, node_id: &str) -> Result<OracleNode, FeedError> {
        self.post_json(&format!("/simulate-recovery/{node_id}")).await
    }

    async fn force_update(&self) -> Result<(), FeedError> {
        let url = format!("{}/force-update", self.base_url);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("POST /force-update failed: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(FeedError::Transport(format!(
                "/force-update returned {}",
                response.status()
            )))
        }
    }
}
