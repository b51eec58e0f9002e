//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    assets = config.assets.len(),
    nodes = config.nodes.len(),
    tick_ms = config.feed.tick_interval_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty asset catalog and node population
/// - Positive prices and sane volatilities
/// - Reliability scores in [0, 1]
/// - Non-zero timer intervals
fn validate_config(config: &AppConfig) -> Result<()> {
  // Asset catalog validation
  anyhow::ensure!(
    !config.assets.is_empty(),
    "At least one asset must be configured"
  );

  for (i, asset) in config.assets.iter().enumerate() {
    anyhow::ensure!(
      !asset.id.is_empty(),
      "Asset {} ({}) has empty id",
      i,
      asset.symbol
    );
    anyhow::ensure!(
      asset.base_price > 0.0,
      "Asset {} ({}) must have positive base_price, got {}",
      i,
      asset.symbol,
      asset.base_price
    );
    anyhow::ensure!(
      asset.volatility > 0.0 && asset.volatility < 1.0,
      "Asset {} ({}) volatility must be in (0, 1), got {}",
      i,
      asset.symbol,
      asset.volatility
    );
  }

  // Node population validation
  anyhow::ensure!(
    !config.nodes.is_empty(),
    "At least one oracle node must be configured"
  );

  for (i, node) in config.nodes.iter().enumerate() {
    anyhow::ensure!(!node.id.is_empty(), "Node {} has empty id", i);
    anyhow::ensure!(
      (0.0..=1.0).contains(&node.reliability),
      "Node {} ({}) reliability must be in [0, 1], got {}",
      i,
      node.id,
      node.reliability
    );
  }

  // Timer validation
  anyhow::ensure!(
    config.feed.tick_interval_ms > 0,
    "feed.tick_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.feed.history_cap > 0,
    "feed.history_cap must be positive"
  );
  anyhow::ensure!(
    config.server.heartbeat_interval_secs > 0,
    "server.heartbeat_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.server.session_queue_depth > 0,
    "server.session_queue_depth must be positive"
  );
  anyhow::ensure!(
    config.client.poll_interval_ms > 0,
    "client.poll_interval_ms must be positive"
  );

  // Client endpoint validation
  anyhow::ensure!(
    !config.client.ws_url.is_empty(),
    "client.ws_url must not be empty"
  );
  anyhow::ensure!(
    !config.client.http_url.is_empty(),
    "client.http_url must not be empty"
  );

  Ok(())
}
