//! Oracle Node Registry
//!
//! Holds the mutable oracle node population. Nodes are only ever
//! toggled active/inactive; the generator's random-selection pool is
//! whatever `active_nodes` returns at tick time.

use tracing::{info, warn};

use super::error::FeedError;
use super::oracle::OracleNode;

/// Registry over the virtual node population.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: Vec<OracleNode>,
}

impl NodeRegistry {
    /// Build a registry from the startup population.
    pub fn new(nodes: Vec<OracleNode>) -> Self {
        info!(nodes = nodes.len(), "Oracle node registry initialized");
        Self { nodes }
    }

    /// Snapshot of all nodes.
    pub fn nodes(&self) -> Vec<OracleNode> {
        self.nodes.clone()
    }

    /// Snapshot of currently active nodes (the generator's pool).
    pub fn active_nodes(&self) -> Vec<OracleNode> {
        self.nodes.iter().filter(|n| n.is_active).cloned().collect()
    }

    /// Number of active nodes.
    pub fn active_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_active).count()
    }

    /// Total node population size.
    pub fn total_count(&self) -> usize {
        self.nodes.len()
    }

    /// Toggle a node's active flag (failure/recovery simulation).
    ///
    /// Idempotent. Returns the node's post-toggle snapshot, or
    /// `FeedError::NotFound` for an unknown id.
    pub fn set_node_active(&mut self, node_id: &str, active: bool) -> Result<OracleNode, FeedError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| FeedError::not_found("node", node_id))?;

        node.is_active = active;
        if active {
            info!(node_id, node_name = %node.name, "Oracle node recovery simulated");
        } else {
            warn!(node_id, node_name = %node.name, "Oracle node failure simulated");
        }
        Ok(node.clone())
    }

    /// Attribute one generated update to a node.
    pub fn record_update(&mut self, node_id: &str, timestamp_ms: u64) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.last_update_ms = timestamp_ms;
            node.update_count += 1;
        }
    }

    /// Refresh a node's derived mean confidence.
    pub fn set_average_confidence(&mut self, node_id: &str, average: f64) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.average_confidence = average;
        }
    }
}
