//! Metrics and Monitoring Adapters
//!
//! Prometheus export for operational feed metrics (sessions, updates,
//! evictions). The feed's own `MetricsSnapshot` is a domain concern
//! served by the HTTP API; these gauges are for dashboards.

pub mod prometheus;

pub use prometheus::FeedMetrics;
