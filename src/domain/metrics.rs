//! Feed Metrics Aggregator
//!
//! Recomputes rolling statistics after each generator batch, never
//! per-update. Consumers only ever get snapshot copies.

use super::oracle::{MetricsSnapshot, PriceUpdate};

/// Aggregates per-batch statistics into a rolling snapshot.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    current: MetricsSnapshot,
}

impl MetricsAggregator {
    /// Create a zeroed aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one generator batch into the rolling statistics.
    ///
    /// `recent_entries` is the number of history entries across all
    /// assets within the trailing 60 seconds, computed by the caller
    /// who owns the histories.
    pub fn record_batch(
        &mut self,
        batch: &[PriceUpdate],
        active_nodes: usize,
        total_nodes: usize,
        recent_entries: usize,
        now_ms: u64,
    ) -> MetricsSnapshot {
        self.current.total_updates += batch.len() as u64;
        self.current.last_update_ms = now_ms;
        self.current.active_nodes = active_nodes;
        self.current.update_frequency = recent_entries;

        self.current.average_confidence = if batch.is_empty() {
            0.0
        } else {
            batch.iter().map(|u| f64::from(u.confidence)).sum::<f64>() / batch.len() as f64
        };

        self.current.uptime_percent = if total_nodes > 0 {
            active_nodes as f64 / total_nodes as f64 * 100.0
        } else {
            0.0
        };

        self.current.clone()
    }

    /// Current snapshot copy.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.current.clone()
    }
}
