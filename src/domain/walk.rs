//! Synthetic Price Walk - Seedable Stochastic Generation
//!
//! All randomness in the feed flows through one explicitly seeded
//! generator so generated sequences are reproducible in tests.
//! Returns are drawn from a normal distribution via the Box-Muller
//! transform, scaled to a tenth of the asset's volatility per tick.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Fraction of an asset's volatility applied per tick.
const STEP_SCALE: f64 = 0.1;

/// Generated price floor, relative to the asset's base price.
const FLOOR_RATIO: f64 = 0.1;

/// Confidence noise half-width (uniform in +/- 2.5).
const CONFIDENCE_NOISE: f64 = 5.0;

/// Stochastic source for prices, confidences and synthetic 24h figures.
pub struct PriceWalk {
    rng: StdRng,
}

impl PriceWalk {
    /// Create a walk from an explicit seed, or entropy when absent.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Step the price for one asset.
    ///
    /// The first tick varies the base price by a uniform draw scaled by
    /// volatility; every later tick applies a normal-distributed return.
    /// The result is clamped to `FLOOR_RATIO x base_price`.
    pub fn next_price(&mut self, base_price: f64, volatility: f64, last_price: Option<f64>) -> f64 {
        let price = match last_price {
            Some(last) => last * (1.0 + self.normal() * volatility * STEP_SCALE),
            None => base_price * (1.0 + (self.rng.r#gen::<f64>() - 0.5) * volatility),
        };
        price.max(base_price * FLOOR_RATIO)
    }

    /// Derive an update confidence from a node's reliability.
    ///
    /// `reliability x 100` plus uniform noise in [-2.5, 2.5], clamped
    /// to [80, 100] and rounded.
    pub fn confidence(&mut self, reliability: f64) -> u8 {
        let noise = (self.rng.r#gen::<f64>() - 0.5) * CONFIDENCE_NOISE;
        (reliability * 100.0 + noise).clamp(80.0, 100.0).round() as u8
    }

    /// Synthetic 24h change percentage in [-10, 10], two decimals.
    pub fn change_24h(&mut self) -> f64 {
        round2((self.rng.r#gen::<f64>() - 0.5) * 20.0)
    }

    /// Synthetic 24h volume in [0, 1e6), two decimals.
    pub fn volume_24h(&mut self) -> f64 {
        round2(self.rng.r#gen::<f64>() * 1_000_000.0)
    }

    /// Pick one element uniformly at random.
    pub fn pick<'a, T>(&mut self, pool: &'a [T]) -> Option<&'a T> {
        pool.choose(&mut self.rng)
    }

    /// Synthetic correlation tag (`tx_<timestamp>_<suffix>`).
    pub fn correlation_hash(&mut self, timestamp_ms: u64) -> String {
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let suffix: String = (0..9)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        format!("tx_{timestamp_ms}_{suffix}")
    }

    /// Standard normal draw via the Box-Muller transform.
    fn normal(&mut self) -> f64 {
        let u1: f64 = self.rng.r#gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.r#gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
