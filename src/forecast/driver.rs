//! One forecast cycle: aggregate, train, then roll the forest forward.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::instrument;

use super::{aggregate_daily, round3, train_forest, ForecastParams};
use crate::models::{Features, Forecast, ForecastPoint, Reading};

// ---

/// Conditions assumed for the future when there is no history at all.
const FALLBACK_FEATURES: Features = Features {
    temperature: 25.0,
    moisture: 50.0,
};

/// Result of a single train-and-forecast cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCycle {
    pub forecast: Forecast,
    /// Distinct days used for training.
    pub sample_count: usize,
    /// Trees the cycle tried to fit.
    pub requested_trees: usize,
    /// Trees that produced a valid split.
    pub tree_count: usize,
}

/// Owns the random stream and runs forecast cycles on demand.
///
/// Every cycle rebuilds samples and the forest from scratch; nothing carries
/// over between cycles except the RNG state.
#[derive(Debug, Clone)]
pub struct ForecastDriver {
    params: ForecastParams,
    rng: StdRng,
}

impl ForecastDriver {
    /// Seed from `params.seed` when set, otherwise from OS entropy.
    pub fn new(params: ForecastParams) -> Self {
        // ---
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { params, rng }
    }

    /// Create a driver with a fixed seed for reproducible forecasts.
    pub fn with_seed(params: ForecastParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &ForecastParams {
        &self.params
    }

    /// Train on `history` and forecast `horizon_days` days.
    ///
    /// Forecast dates follow the latest day in the history, or `today` when
    /// the history is empty. Each future day perturbs the same last-known
    /// feature vector; noise does not accumulate across days.
    #[instrument(skip(self, history), fields(readings = history.len()))]
    pub fn run_cycle(&mut self, history: &[Reading], today: NaiveDate) -> ForecastCycle {
        // ---
        let samples = aggregate_daily(history);
        let requested_trees = self.params.tree_count(samples.len());
        let forest = train_forest(&samples, requested_trees, self.params.strata, &mut self.rng);

        let (base_date, base) = samples
            .last()
            .map_or((today, FALLBACK_FEATURES), |s| (s.day, s.features));

        let mut points = Vec::with_capacity(self.params.horizon_days as usize);
        for offset in 1..=self.params.horizon_days {
            let features = Features {
                temperature: base.temperature + self.noise(self.params.temperature_noise),
                moisture: base.moisture + self.noise(self.params.moisture_noise),
            };
            let Some(date) = base_date.checked_add_days(Days::new(u64::from(offset))) else {
                tracing::warn!("Forecast date overflow after {}, truncating horizon", base_date);
                break;
            };
            points.push(ForecastPoint {
                date,
                et: round3(forest.predict(&features)),
            });
        }

        tracing::debug!(
            "Forecast cycle: {} samples, {}/{} trees, base {} ({:.2}, {:.2})",
            samples.len(),
            forest.len(),
            requested_trees,
            base_date,
            base.temperature,
            base.moisture
        );

        ForecastCycle {
            forecast: Forecast { points },
            sample_count: samples.len(),
            requested_trees,
            tree_count: forest.len(),
        }
    }

    /// Uniform noise in `[-half_width, half_width)`.
    fn noise(&mut self, half_width: f64) -> f64 {
        (self.rng.random::<f64>() - 0.5) * 2.0 * half_width
    }
}
