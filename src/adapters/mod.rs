//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits with concrete transports (WebSockets,
//! HTTP, Prometheus). Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `server`: WebSocket broadcast hub and the axum read/control API
//! - `client`: hybrid connector, WebSocket push channel, HTTP
//!   snapshot client and the polling transport
//! - `metrics`: Prometheus export

pub mod client;
pub mod metrics;
pub mod server;
