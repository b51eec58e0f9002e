//! Client Adapters - Hybrid Feed Consumption
//!
//! - `connector`: the failover state machine multiplexing both
//!   transports behind one typed event stream
//! - `ws_channel`: WebSocket implementation of the push-channel port
//! - `http_api`: reqwest implementation of the snapshot-API port
//! - `poller`: fetch-and-diff pull transport over the snapshot API

pub mod connector;
pub mod http_api;
pub mod poller;
pub mod ws_channel;

pub use connector::{ConnectorConfig, HybridConnector};
pub use http_api::HttpSnapshotApi;
pub use poller::PricePoller;
pub use ws_channel::WsPushChannel;
