//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify the price walk and history buffer
//! maintain their invariants across random inputs.

use proptest::prelude::*;
use uuid::Uuid;

use oracle_price_feed::domain::history::PriceHistory;
use oracle_price_feed::domain::oracle::PriceUpdate;
use oracle_price_feed::domain::walk::PriceWalk;

fn update(timestamp_ms: u64) -> PriceUpdate {
    PriceUpdate {
        id: Uuid::new_v4(),
        asset_id: "BTC".into(),
        symbol: "BTC".into(),
        raw_price: PriceUpdate::raw_price_string(45000.0),
        formatted_price: PriceUpdate::format_price(45000.0),
        timestamp_ms,
        confidence: 90,
        source: "synthetic".into(),
        change_24h: 0.0,
        volume_24h: 0.0,
        source_node_id: "node-1".into(),
        correlation_hash: None,
    }
}

// ── Price Walk Properties ───────────────────────────────────

proptest! {
    /// The floor clamp holds for every asset, seed and walk length.
    #[test]
    fn walk_never_breaks_price_floor(
        seed: u64,
        base in 0.01f64..100_000.0,
        volatility in 0.001f64..0.9,
        steps in 1usize..200,
    ) {
        let mut walk = PriceWalk::new(Some(seed));
        let floor = base * 0.1;
        let mut last = None;
        for _ in 0..steps {
            let price = walk.next_price(base, volatility, last);
            prop_assert!(
                price >= floor,
                "price {price} below floor {floor}"
            );
            last = Some(price);
        }
    }

    /// Confidence stays in [80, 100] for any reliability score.
    #[test]
    fn walk_confidence_bounded(seed: u64, reliability in 0.0f64..=1.0) {
        let mut walk = PriceWalk::new(Some(seed));
        for _ in 0..100 {
            let confidence = walk.confidence(reliability);
            prop_assert!((80..=100).contains(&confidence));
        }
    }

    /// Two walks from the same seed produce identical sequences.
    #[test]
    fn walk_is_deterministic_per_seed(seed: u64, volatility in 0.01f64..0.5) {
        let mut a = PriceWalk::new(Some(seed));
        let mut b = PriceWalk::new(Some(seed));
        let mut last = None;
        for _ in 0..25 {
            let pa = a.next_price(100.0, volatility, last);
            let pb = b.next_price(100.0, volatility, last);
            prop_assert_eq!(pa, pb);
            last = Some(pa);
        }
    }
}

// ── History Buffer Properties ───────────────────────────────

proptest! {
    /// The buffer never exceeds its cap and always evicts FIFO.
    #[test]
    fn history_cap_is_fifo(cap in 1usize..50, pushes in 0usize..200) {
        let mut history = PriceHistory::new(cap);
        for n in 0..pushes {
            history.push(update(n as u64));
            prop_assert!(history.len() <= cap);
        }

        if pushes > 0 {
            let expected_len = pushes.min(cap);
            prop_assert_eq!(history.len(), expected_len);

            // Retained entries are exactly the newest `expected_len`,
            // in insertion order.
            let timestamps: Vec<u64> =
                history.iter().map(|u| u.timestamp_ms).collect();
            let first = (pushes - expected_len) as u64;
            let expected: Vec<u64> = (first..pushes as u64).collect();
            prop_assert_eq!(timestamps, expected);
        }
    }

    /// Window queries agree with a naive filter.
    #[test]
    fn history_window_matches_filter(
        timestamps in proptest::collection::vec(0u64..10_000, 0..50),
        cutoff in 0u64..10_000,
    ) {
        let mut history = PriceHistory::new(1000);
        for &ts in &timestamps {
            history.push(update(ts));
        }
        let expected = timestamps.iter().filter(|&&ts| ts >= cutoff).count();
        prop_assert_eq!(history.count_since(cutoff), expected);
        prop_assert_eq!(history.since(cutoff).len(), expected);
    }
}
