//! Typed Feed Events - Tagged Unions over the Event Surface
//!
//! The wire speaks four string-tagged event kinds (priceUpdate,
//! metricsUpdate, nodeStatus, error). Inside the process they are
//! explicit enums, so ordering is preserved and consumers never
//! dispatch on strings.

use serde::{Deserialize, Serialize};

use crate::domain::oracle::{MetricsSnapshot, OracleNode, PriceUpdate};

/// Which transport (if any) a hybrid connector is currently on.
///
/// Exactly one mode holds at any time; transitions are the
/// authoritative record of the active transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionMode {
  /// No transport active (initial, and terminal after disconnect).
  Offline,
  /// WebSocket connection attempt in flight.
  ConnectingPush,
  /// Live WebSocket session.
  ConnectedPush,
  /// Polling fallback active.
  ConnectedPull,
}

impl std::fmt::Display for ConnectionMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Offline => write!(f, "offline"),
      Self::ConnectingPush => write!(f, "connectingPush"),
      Self::ConnectedPush => write!(f, "connectedPush"),
      Self::ConnectedPull => write!(f, "connectedPull"),
    }
  }
}

/// Signals emitted by the oracle service after each generator tick
/// or node toggle. The broadcast hub fans these out to sessions.
#[derive(Debug, Clone)]
pub enum FeedSignal {
  /// One generator batch (one update per asset).
  Prices(Vec<PriceUpdate>),
  /// Metrics recomputed from that batch.
  Metrics(MetricsSnapshot),
  /// Node population snapshot after a failure/recovery toggle.
  Nodes(Vec<OracleNode>),
}

/// Events delivered to consumers of the hybrid client connector.
///
/// Both transports normalize to this union, so application code is
/// transport-agnostic.
#[derive(Debug, Clone)]
pub enum ClientEvent {
  /// Price updates (a push batch, or polled diffs).
  Prices(Vec<PriceUpdate>),
  /// Feed metrics snapshot.
  Metrics(MetricsSnapshot),
  /// Node population snapshot.
  Nodes(Vec<OracleNode>),
  /// A failure the connector could not recover from locally.
  Error {
    /// Mode the connector was in when the failure happened.
    mode: ConnectionMode,
    /// Human-readable description.
    message: String,
  },
  /// The connector moved between modes.
  ModeChanged {
    /// Mode before the transition.
    from: ConnectionMode,
    /// Mode after the transition.
    to: ConnectionMode,
  },
}
