//! Domain layer - Core feed logic and models.
//!
//! This module contains the pure logic of the synthetic oracle feed.
//! No I/O or transport dependencies allowed here (hexagonal architecture
//! inner ring). All types are serializable and testable in isolation.

pub mod error;
pub mod history;
pub mod metrics;
pub mod oracle;
pub mod registry;
pub mod walk;

// Re-export core types for convenience
pub use error::FeedError;
pub use history::PriceHistory;
pub use metrics::MetricsAggregator;
pub use oracle::{Asset, AssetId, MetricsSnapshot, NodeId, OracleNode, PriceUpdate};
pub use registry::NodeRegistry;
pub use walk::PriceWalk;
