//! Core oracle feed domain types.
//!
//! Defines the entities every layer shares: assets, oracle nodes, price
//! updates and the rolling metrics snapshot. All wire surfaces (WebSocket
//! envelopes and the HTTP API) serialize these camelCase.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asset identifier used at the ports boundary.
pub type AssetId = String;

/// Oracle node identifier used at the ports boundary.
pub type NodeId = String;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Scale factor for the fixed-point `raw_price` representation.
const RAW_PRICE_SCALE: f64 = 1e14;

/// A tradable asset in the static catalog.
///
/// Loaded from configuration at startup; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Asset identifier (symbol or symbol:issuer form).
    pub id: AssetId,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Starting price for the synthetic walk.
    pub base_price: f64,
    /// Relative stddev per tick.
    pub volatility: f64,
}

/// A virtual price-reporting entity.
///
/// Nodes are never created or destroyed at runtime; failure/recovery
/// simulation only toggles `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleNode {
    /// Node identifier.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Simulated on-chain address.
    pub address: String,
    /// Reliability score in [0, 1]; immutable.
    pub reliability: f64,
    /// Whether the node participates in generation.
    pub is_active: bool,
    /// Timestamp of the node's most recent attributed update (Unix ms).
    pub last_update_ms: u64,
    /// Number of updates attributed to this node.
    pub update_count: u64,
    /// Mean confidence over this node's retained history entries.
    pub average_confidence: f64,
}

impl OracleNode {
    /// Create a fresh, active node with zeroed counters.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        address: impl Into<String>,
        reliability: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            reliability,
            is_active: true,
            last_update_ms: 0,
            update_count: 0,
            average_confidence: 0.0,
        }
    }
}

/// A single generated price point. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    /// Unique update identifier.
    pub id: Uuid,
    /// Asset this update belongs to.
    pub asset_id: AssetId,
    /// Ticker symbol, denormalized for consumers.
    pub symbol: String,
    /// Fixed-point price (price x 10^14) as a decimal string.
    pub raw_price: String,
    /// Price formatted to six decimal places.
    pub formatted_price: String,
    /// Generation timestamp (Unix ms).
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    /// Synthetic quality score in [80, 100].
    pub confidence: u8,
    /// Feed source tag.
    pub source: String,
    /// Synthetic 24h change percentage in [-10, 10].
    pub change_24h: f64,
    /// Synthetic 24h volume in [0, 1e6).
    pub volume_24h: f64,
    /// Node this update is attributed to.
    pub source_node_id: NodeId,
    /// Synthetic correlation tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_hash: Option<String>,
}

impl PriceUpdate {
    /// Render a price into its fixed-point string form.
    pub fn raw_price_string(price: f64) -> String {
        format!("{:.0}", price * RAW_PRICE_SCALE)
    }

    /// Render a price into its six-decimal display form.
    pub fn format_price(price: f64) -> String {
        format!("{price:.6}")
    }

    /// Parse the display price back into an f64.
    ///
    /// The display form is produced by [`Self::format_price`], so this
    /// only fails on hand-crafted updates.
    pub fn price(&self) -> Option<f64> {
        self.formatted_price.parse().ok()
    }
}

/// Rolling feed statistics, recomputed after each generator batch.
///
/// Read-only consumers always receive a copy, never a live reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Cumulative update counter since startup.
    pub total_updates: u64,
    /// Mean confidence of the most recent batch.
    pub average_confidence: f64,
    /// Currently active node count.
    #[serde(rename = "activeNodeCount")]
    pub active_nodes: usize,
    /// active/total x 100.
    pub uptime_percent: f64,
    /// Timestamp of the most recent batch (Unix ms).
    #[serde(rename = "lastUpdateTime")]
    pub last_update_ms: u64,
    /// History entries across all assets in the trailing 60 seconds.
    pub update_frequency: usize,
}
