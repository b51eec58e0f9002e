//! Per-asset Price History - Bounded FIFO Ring
//!
//! Each asset keeps its most recent updates in a ring buffer capped at
//! the configured capacity (1000 by default). Once at capacity every
//! append evicts exactly the oldest entry.

use std::collections::VecDeque;

use super::oracle::PriceUpdate;

/// Bounded FIFO buffer of price updates for one asset.
#[derive(Debug)]
pub struct PriceHistory {
    entries: VecDeque<PriceUpdate>,
    cap: usize,
}

impl PriceHistory {
    /// Create an empty history with the given capacity.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Append an update, evicting the oldest entry when at capacity.
    pub fn push(&mut self, update: PriceUpdate) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(update);
    }

    /// The most recent update, if any.
    pub fn latest(&self) -> Option<&PriceUpdate> {
        self.entries.back()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PriceUpdate> {
        self.entries.iter()
    }

    /// Entries with `timestamp_ms >= cutoff_ms`, oldest first.
    pub fn since(&self, cutoff_ms: u64) -> Vec<PriceUpdate> {
        self.entries
            .iter()
            .filter(|u| u.timestamp_ms >= cutoff_ms)
            .cloned()
            .collect()
    }

    /// Count of entries with `timestamp_ms >= cutoff_ms`.
    pub fn count_since(&self, cutoff_ms: u64) -> usize {
        self.entries
            .iter()
            .filter(|u| u.timestamp_ms >= cutoff_ms)
            .count()
    }
}
