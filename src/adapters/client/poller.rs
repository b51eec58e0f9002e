//! Pull Transport - Fetch-and-diff Polling
//!
//! Re-derives the push path's event shapes from periodic snapshot
//! fetches. Latest prices are diffed per asset against the previous
//! poll (on formatted price and timestamp) so unchanged values are
//! never re-announced, keeping the event stream semantically
//! equivalent to the push path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::domain::oracle::{AssetId, PriceUpdate};
use crate::ports::events::{ClientEvent, ConnectionMode};
use crate::ports::transport::SnapshotApi;

/// Polling pull transport over the snapshot API.
pub struct PricePoller {
    api: Arc<dyn SnapshotApi>,
    previous: HashMap<AssetId, PriceUpdate>,
}

impl PricePoller {
    /// Create a poller over the given API.
    pub fn new(api: Arc<dyn SnapshotApi>) -> Self {
        Self {
            api,
            previous: HashMap::new(),
        }
    }

    /// Forget the previous snapshot.
    ///
    /// Called when the poller is (re)started so the first poll after
    /// entering pull mode announces the full current state.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Run one polling round against all three read endpoints.
    ///
    /// Returns the events this round produced, in emit order. Fetch
    /// failures become `ClientEvent::Error` entries; polling itself
    /// never stops on error.
    pub async fn poll(&mut self, subscriptions: &HashSet<AssetId>) -> Vec<ClientEvent> {
        let mut events = Vec::new();

        match self.api.latest_prices().await {
            Ok(latest) => {
                let mut changed = diff_prices(&self.previous, &latest);
                if !subscriptions.is_empty() {
                    changed.retain(|u| subscriptions.contains(&u.asset_id));
                }
                self.previous = latest;
                if !changed.is_empty() {
                    debug!(changed = changed.len(), "Poll detected price changes");
                    events.push(ClientEvent::Prices(changed));
                }
            }
            Err(e) => events.push(ClientEvent::Error {
                mode: ConnectionMode::ConnectedPull,
                message: e.to_string(),
            }),
        }

        match self.api.metrics().await {
            Ok(metrics) => events.push(ClientEvent::Metrics(metrics)),
            Err(e) => events.push(ClientEvent::Error {
                mode: ConnectionMode::ConnectedPull,
                message: e.to_string(),
            }),
        }

        match self.api.nodes().await {
            Ok(nodes) => events.push(ClientEvent::Nodes(nodes)),
            Err(e) => events.push(ClientEvent::Error {
                mode: ConnectionMode::ConnectedPull,
                message: e.to_string(),
            }),
        }

        events
    }
}

/// Updates whose formatted price or timestamp differ from the
/// previous snapshot (including assets seen for the first time).
pub fn diff_prices(
    previous: &HashMap<AssetId, PriceUpdate>,
    next: &HashMap<AssetId, PriceUpdate>,
) -> Vec<PriceUpdate> {
    let mut changed: Vec<PriceUpdate> = next
        .values()
        .filter(|update| {
            previous.get(&update.asset_id).map_or(true, |prev| {
                prev.formatted_price != update.formatted_price
                    || prev.timestamp_ms != update.timestamp_ms
            })
        })
        .cloned()
        .collect();
    // Stable emit order regardless of map iteration order.
    changed.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    changed
}
