//! Evapotranspiration forecast engine.
//!
//! Gateway for the forecasting pipeline:
//! - `aggregate`: raw readings to one training sample per UTC day
//! - `split`: stratified bootstrap and greedy stump search
//! - `forest`: ensemble training and averaged prediction
//! - `driver`: one full train-then-forecast cycle
//!
//! Everything here is synchronous and free of I/O. Randomness is always passed
//! in, so a seeded generator reproduces a cycle exactly.

use std::time::Duration;

mod aggregate;
mod driver;
mod forest;
mod split;

pub use aggregate::aggregate_daily;
pub use driver::{ForecastCycle, ForecastDriver};
pub use forest::{train_forest, Forest};
pub use split::{fit_stump, Feature, Split, SplitRule};

// ---

/// Temperature coefficient of the linear ET proxy.
pub const ET_TEMPERATURE_WEIGHT: f64 = 0.08;
/// Soil moisture coefficient of the linear ET proxy.
pub const ET_MOISTURE_WEIGHT: f64 = 0.03;
/// Lowest plausible ET (humid conditions), mm/day.
pub const MIN_ET: f64 = 1.0;
/// Highest plausible ET (arid conditions), mm/day.
pub const MAX_ET: f64 = 9.0;

/// Linear ET proxy used as the training target.
pub fn et_proxy(temperature: f64, moisture: f64) -> f64 {
    ET_TEMPERATURE_WEIGHT * temperature + ET_MOISTURE_WEIGHT * moisture
}

/// Round to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Tunable constants of the forecast engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastParams {
    // ---
    /// Upper bound on trees per cycle.
    pub tree_cap: usize,

    /// Lower bound on trees per cycle.
    pub tree_floor: usize,

    /// Trees requested per daily sample, before the cap and floor apply.
    pub tree_multiplier: usize,

    /// Number of contiguous bootstrap strata.
    pub strata: usize,

    /// Half-width of the uniform temperature noise applied to future days.
    pub temperature_noise: f64,

    /// Half-width of the uniform moisture noise applied to future days.
    pub moisture_noise: f64,

    /// Number of forecast days.
    pub horizon_days: u32,

    /// Retrain period when history does not change.
    pub retrain_interval: Duration,

    /// Fixed RNG seed. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            tree_cap: 40,
            tree_floor: 1,
            tree_multiplier: 4,
            strata: 5,
            temperature_noise: 1.0,
            moisture_noise: 2.0,
            horizon_days: 10,
            retrain_interval: Duration::from_secs(60 * 60),
            seed: None,
        }
    }
}

impl ForecastParams {
    /// Trees to fit for `sample_count` daily samples: `min(cap, max(floor, multiplier * n))`.
    pub fn tree_count(&self, sample_count: usize) -> usize {
        // ---
        self.tree_multiplier
            .saturating_mul(sample_count)
            .max(self.tree_floor)
            .min(self.tree_cap)
    }
}
