//! Message Envelope - Persistent Channel Wire Contract
//!
//! Every message on the WebSocket channel, in either direction, is one
//! JSON envelope: `{ "type": ..., "data"?: ..., "timestamp": ms,
//! "id"?: ... }`. Payload shapes are typed structs serialized into the
//! `data` slot.

use serde::{Deserialize, Serialize};

use crate::domain::oracle::{now_ms, AssetId, MetricsSnapshot, OracleNode, PriceUpdate};

/// Envelope kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
  PriceUpdate,
  MetricsUpdate,
  NodeStatus,
  Error,
  Ping,
  Pong,
  Subscribe,
  Unsubscribe,
  GetLatestPrices,
  GetMetrics,
  GetNodeStatus,
  /// Any kind this build does not understand. Answered with an
  /// `error` envelope; the connection stays open.
  #[serde(other)]
  Unknown,
}

/// One message on the persistent channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
  /// Message kind.
  #[serde(rename = "type")]
  pub kind: MessageKind,
  /// Kind-specific payload.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
  /// Sender-side timestamp (Unix ms).
  pub timestamp: u64,
  /// Correlation id, echoed on ping/pong pairs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
}

impl Envelope {
  /// Bare envelope of the given kind, stamped now.
  pub fn new(kind: MessageKind) -> Self {
    Self {
      kind,
      data: None,
      timestamp: now_ms(),
      id: None,
    }
  }

  /// Envelope carrying a serialized payload.
  ///
  /// Payload types here are all infallibly serializable, so a serde
  /// failure collapses to an empty `data` slot rather than an error
  /// path every call site would have to thread.
  pub fn with_data(kind: MessageKind, payload: &impl Serialize) -> Self {
    Self {
      kind,
      data: serde_json::to_value(payload).ok(),
      timestamp: now_ms(),
      id: None,
    }
  }

  /// Attach a correlation id.
  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  /// Deserialize the payload into a typed shape.
  pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
    self
      .data
      .as_ref()
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }
}

/// `subscribe` / `unsubscribe` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
  /// Asset ids to add to / remove from the session's filter.
  pub assets: Vec<AssetId>,
}

/// `priceUpdate` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesPayload {
  /// Updates relevant to the receiving session.
  pub updates: Vec<PriceUpdate>,
}

/// `metricsUpdate` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsPayload {
  /// Current metrics snapshot.
  pub metrics: MetricsSnapshot,
}

/// `nodeStatus` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesPayload {
  /// Full node population snapshot.
  pub nodes: Vec<OracleNode>,
}

/// `error` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
  /// Human-readable description.
  pub error: String,
}

/// Welcome `ping` payload sent by the hub on accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
  /// The session id assigned by the hub.
  pub client_id: String,
  /// Greeting line.
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_envelope_wire_shape() {
    let env = Envelope::with_data(
      MessageKind::Subscribe,
      &SubscriptionRequest {
        assets: vec!["BTC".into(), "ETH".into()],
      },
    )
    .with_id("req-1");

    let json = serde_json::to_value(&env).unwrap();
    assert_eq!(json["type"], "subscribe");
    assert_eq!(json["data"]["assets"][1], "ETH");
    assert_eq!(json["id"], "req-1");
    assert!(json["timestamp"].is_u64());
  }

  #[test]
  fn test_bare_envelope_omits_optionals() {
    let json = serde_json::to_value(Envelope::new(MessageKind::Pong)).unwrap();
    assert_eq!(json["type"], "pong");
    assert!(json.get("data").is_none());
    assert!(json.get("id").is_none());
  }

  #[test]
  fn test_unknown_kind_round_trips_to_unknown() {
    let env: Envelope =
      serde_json::from_str(r#"{"type":"selfDestruct","timestamp":1}"#).unwrap();
    assert_eq!(env.kind, MessageKind::Unknown);
  }

  #[test]
  fn test_payload_extraction() {
    let env: Envelope = serde_json::from_str(
      r#"{"type":"subscribe","data":{"assets":["XLM"]},"timestamp":5,"id":"a"}"#,
    )
    .unwrap();
    let req: SubscriptionRequest = env.payload().unwrap();
    assert_eq!(req.assets, vec!["XLM".to_string()]);
  }
}
