//! Mean-reverting price process.
//!
//! Each call to [`PriceProcess::step`] advances a single price by a discrete
//! Ornstein–Uhlenbeck style update:
//!
//! ```text
//! current += (mean_price - current) * reversion_rate + N(0, 1) * volatility
//! ```
//!
//! and clamps the result to `floor` whenever it drops to zero or below, so every
//! observed price is strictly positive.
//!
//! The process owns its RNG. `PriceProcess::from_clock` seeds it once from the
//! wall clock in nanoseconds; tests inject a seeded `StdRng` instead.
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Model constants of the price process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    /// Level the price is pulled back to.
    pub mean_price: f64,
    /// Fraction of the distance to the mean recovered per step.
    pub reversion_rate: f64,
    /// Standard deviation of the per-step noise.
    pub volatility: f64,
    /// Value substituted for non-positive prices.
    pub floor: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            mean_price: 100.0,
            reversion_rate: 0.05,
            volatility: 5.0,
            floor: 0.01,
        }
    }
}

/// Mutable state of the process: the last price handed out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceState {
    /// Current price, always `> 0` between steps.
    pub current: f64,
}

/// Price generator for a single symbol.
pub struct PriceProcess<R = StdRng> {
    params: ModelParams,
    state: PriceState,
    rng: R,
}

impl PriceProcess<StdRng> {
    /// Start at the mean price with an RNG seeded from the current time.
    pub fn from_clock(params: ModelParams) -> Self {
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        Self::new(params, params.mean_price, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PriceProcess<R> {
    /// Create a process starting at `start` with the given RNG.
    pub fn new(params: ModelParams, start: f64, rng: R) -> Self {
        Self {
            params,
            state: PriceState { current: start },
            rng,
        }
    }

    /// Advance one step and return the new price.
    pub fn step(&mut self) -> f64 {
        let pull = (self.params.mean_price - self.state.current) * self.params.reversion_rate;
        let noise: f64 = self.rng.sample::<f64, _>(StandardNormal) * self.params.volatility;
        self.state.current += pull + noise;
        if self.state.current <= 0.0 {
            self.state.current = self.params.floor;
        }
        self.state.current
    }
}
