//! Server Adapters - Feed Distribution Surface
//!
//! - `hub`: WebSocket broadcast hub with per-session subscription
//!   filtering and heartbeat eviction
//! - `http_api`: axum read/control endpoints consumed by the polling
//!   transport and operational tooling

pub mod http_api;
pub mod hub;

pub use hub::BroadcastHub;
