//! Transport Ports - Push Channel and Snapshot API
//!
//! The hybrid connector multiplexes two transports behind these
//! traits. The WebSocket and HTTP adapters implement them; tests
//! substitute channel-backed fakes and mocks, so the failover state
//! machine is testable without sockets.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::envelope::Envelope;
use crate::domain::error::FeedError;
use crate::domain::oracle::{AssetId, MetricsSnapshot, OracleNode, PriceUpdate};

/// A live push session.
///
/// The session is a dumb pipe of envelopes: `outbound` feeds the
/// socket, `inbound` yields whatever the peer sends. The session is
/// dead once `inbound` yields `None` or `outbound` rejects a send.
pub struct PushSession {
  /// Envelopes to deliver to the peer.
  pub outbound: mpsc::Sender<Envelope>,
  /// Envelopes received from the peer.
  pub inbound: mpsc::Receiver<Envelope>,
}

/// Factory for persistent push sessions.
///
/// On unexpected close the session signals the connector's failure
/// path (the inbound channel closes); it never retries internally.
#[async_trait]
pub trait PushChannel: Send + Sync + 'static {
  /// Open one persistent session to the feed.
  async fn open(&self) -> Result<PushSession, FeedError>;
}

/// Read/control surface the pull transport polls.
///
/// Mirrors the feed's HTTP endpoints; implemented by the reqwest
/// adapter and mocked in tests.
#[async_trait]
pub trait SnapshotApi: Send + Sync + 'static {
  /// `GET /latest-prices`: most recent update per asset.
  async fn latest_prices(&self) -> Result<HashMap<AssetId, PriceUpdate>, FeedError>;

  /// `GET /metrics`: current metrics snapshot.
  async fn metrics(&self) -> Result<MetricsSnapshot, FeedError>;

  /// `GET /nodes`: node population snapshot.
  async fn nodes(&self) -> Result<Vec<OracleNode>, FeedError>;

  /// `GET /price-history/{asset}?hours=N`: trailing history window.
  async fn price_history(
    &self,
    asset_id: &str,
    hours: u32,
  ) -> Result<Vec<PriceUpdate>, FeedError>;

  /// `POST /simulate-failure/{node}`: deactivate a node.
  async fn simulate_failure(&self, node_id: &str) -> Result<OracleNode, FeedError>;

  /// `POST /simulate-recovery/{node}`: reactivate a node.
  async fn simulate_recovery(&self, node_id: &str) -> Result<OracleNode, FeedError>;

  /// `POST /force-update`: trigger one out-of-band generator tick.
  async fn force_update(&self) -> Result<(), FeedError>;
}
