//! Configuration Module - TOML-based Feed Configuration
//!
//! Loads and validates configuration from `config.toml`. The asset
//! catalog and oracle node population are externalized here -
//! nothing is hardcoded in the domain layer.

pub mod loader;

use serde::Deserialize;

/// Top-level feed configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any task is spawned.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and metadata.
  pub service: ServiceConfig,
  /// Price generation parameters.
  pub feed: FeedConfig,
  /// WebSocket/HTTP server binds and heartbeat cadence.
  pub server: ServerConfig,
  /// Hybrid client connector parameters.
  pub client: ClientConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Static asset catalog.
  pub assets: Vec<AssetConfig>,
  /// Virtual oracle node population.
  pub nodes: Vec<NodeConfig>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Price generation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Generation tick interval in milliseconds.
  #[serde(default = "default_tick_interval")]
  pub tick_interval_ms: u64,
  /// Per-asset history ring buffer capacity.
  #[serde(default = "default_history_cap")]
  pub history_cap: usize,
  /// RNG seed for the price walk. Random when absent.
  pub seed: Option<u64>,
  /// Source tag stamped on every generated update.
  #[serde(default = "default_source_label")]
  pub source_label: String,
}

/// Server bind configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// WebSocket listener bind address.
  #[serde(default = "default_ws_bind")]
  pub ws_bind: String,
  /// HTTP API bind address.
  #[serde(default = "default_http_bind")]
  pub http_bind: String,
  /// Heartbeat probe interval in seconds.
  #[serde(default = "default_heartbeat_secs")]
  pub heartbeat_interval_secs: u64,
  /// Per-session outbound queue depth. A session whose queue
  /// fills up is evicted rather than allowed to stall fan-out.
  #[serde(default = "default_session_queue")]
  pub session_queue_depth: usize,
}

/// Hybrid client connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// WebSocket feed URL.
  pub ws_url: String,
  /// HTTP API base URL for the polling transport.
  pub http_url: String,
  /// Reconnect attempts before falling back to polling.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Delay between reconnect attempts (milliseconds).
  #[serde(default = "default_retry_delay")]
  pub retry_delay_ms: u64,
  /// Polling interval in fallback mode (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Client-side liveness ping interval in seconds.
  #[serde(default = "default_heartbeat_secs")]
  pub ping_interval_secs: u64,
  /// HTTP request timeout in milliseconds.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_ms: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

/// A single tradable asset in the static catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
  /// Asset identifier (e.g. "BTC", "USDC:GA5Z...").
  pub id: String,
  /// Ticker symbol.
  pub symbol: String,
  /// Display name.
  pub name: String,
  /// Starting price for the walk.
  pub base_price: f64,
  /// Relative stddev per tick.
  pub volatility: f64,
}

/// A single virtual oracle node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
  /// Node identifier.
  pub id: String,
  /// Display name.
  pub name: String,
  /// Simulated on-chain address.
  pub address: String,
  /// Reliability score in [0, 1]; drives update confidence.
  pub reliability: f64,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_tick_interval() -> u64 {
  5000
}

fn default_history_cap() -> usize {
  1000
}

fn default_source_label() -> String {
  "synthetic".to_string()
}

fn default_ws_bind() -> String {
  "0.0.0.0:9001".to_string()
}

fn default_http_bind() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_heartbeat_secs() -> u64 {
  30
}

fn default_session_queue() -> usize {
  64
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_delay() -> u64 {
  5000
}

fn default_poll_interval() -> u64 {
  5000
}

fn default_request_timeout() -> u64 {
  10_000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
