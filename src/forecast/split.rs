//! Stump fitting: stratified bootstrap plus greedy best-split search.
//!
//! Each fitted tree is a single threshold test with two leaf means. Candidate
//! splits come from three families, searched in a fixed order:
//! 1. temperature alone, thresholds at whole degrees
//! 2. moisture alone, thresholds at multiples of 5
//! 3. both together, every (temperature, moisture) threshold pair
//!
//! Single-feature splits are scored on the raw sample targets. Paired splits
//! are scored on the ET proxy clamped to `[MIN_ET, MAX_ET]`.

use rand::Rng;
use serde::Serialize;

use super::{et_proxy, MAX_ET, MIN_ET};
use crate::models::{DailySample, Features};

// ---

/// Model input a single-feature split tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature,
    Moisture,
}

impl Feature {
    fn value(self, features: &Features) -> f64 {
        match self {
            Feature::Temperature => features.temperature,
            Feature::Moisture => features.moisture,
        }
    }
}

/// The threshold test of a stump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Split {
    /// `feature <= threshold`
    Single { feature: Feature, threshold: f64 },
    /// `temperature <= temperature_threshold && moisture <= moisture_threshold`
    Paired {
        temperature_threshold: f64,
        moisture_threshold: f64,
    },
}

impl Split {
    /// Whether `features` falls into the left branch.
    pub fn goes_left(&self, features: &Features) -> bool {
        // ---
        match *self {
            Split::Single { feature, threshold } => feature.value(features) <= threshold,
            Split::Paired {
                temperature_threshold,
                moisture_threshold,
            } => {
                features.temperature <= temperature_threshold
                    && features.moisture <= moisture_threshold
            }
        }
    }

    /// Per-sample value this split is scored on.
    fn branch_value(&self, sample: &DailySample) -> f64 {
        // ---
        match self {
            Split::Single { .. } => sample.target,
            Split::Paired { .. } => {
                let Features { temperature, moisture } = sample.features;
                et_proxy(temperature, moisture).clamp(MIN_ET, MAX_ET)
            }
        }
    }
}

/// A fitted stump: a split plus the mean value of each branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitRule {
    pub split: Split,
    pub left_mean: f64,
    pub right_mean: f64,
}

impl SplitRule {
    pub fn predict(&self, features: &Features) -> f64 {
        if self.split.goes_left(features) {
            self.left_mean
        } else {
            self.right_mean
        }
    }
}

/// Round half up, toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn temperature_threshold(temperature: f64) -> f64 {
    round_half_up(temperature)
}

fn moisture_threshold(moisture: f64) -> f64 {
    round_half_up(moisture / 5.0) * 5.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population mean squared error around the mean.
fn mse(values: &[f64]) -> f64 {
    // ---
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Draw a bootstrap sample independently inside `strata` contiguous slices of
/// `0..n`. Each stratum contributes as many draws as it has members, so the
/// result has exactly `n` indices.
pub(crate) fn stratified_bootstrap<R: Rng + ?Sized>(
    n: usize,
    strata: usize,
    rng: &mut R,
) -> Vec<usize> {
    // ---
    if n == 0 {
        return Vec::new();
    }
    let strata = strata.max(1);
    let stratum_size = n.div_ceil(strata);

    let mut indices = Vec::with_capacity(n);
    for stratum in 0..strata {
        let start = stratum * stratum_size;
        let end = (start + stratum_size).min(n);
        if start >= end {
            continue;
        }
        for _ in start..end {
            indices.push(rng.random_range(start..end));
        }
    }
    indices
}

/// Distinct values in order of first appearance.
fn distinct(values: impl Iterator<Item = f64>) -> Vec<f64> {
    // ---
    let mut seen: Vec<f64> = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Score `split` over the bootstrap indices.
///
/// Returns the size-weighted MSE and the fitted rule, or `None` when either
/// branch would be empty.
fn evaluate(split: Split, samples: &[DailySample], indices: &[usize]) -> Option<(f64, SplitRule)> {
    // ---
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in indices {
        let sample = &samples[i];
        let value = split.branch_value(sample);
        if split.goes_left(&sample.features) {
            left.push(value);
        } else {
            right.push(value);
        }
    }

    if left.is_empty() || right.is_empty() {
        return None;
    }

    let total = left.len() + right.len();
    let weighted_mse =
        (left.len() as f64 * mse(&left) + right.len() as f64 * mse(&right)) / total as f64;

    Some((
        weighted_mse,
        SplitRule {
            split,
            left_mean: mean(&left),
            right_mean: mean(&right),
        },
    ))
}

/// All candidate splits for one bootstrap draw, in search order.
fn candidates(samples: &[DailySample], indices: &[usize]) -> Vec<Split> {
    // ---
    let temperatures = distinct(
        indices
            .iter()
            .map(|&i| temperature_threshold(samples[i].features.temperature)),
    );
    let moistures = distinct(
        indices
            .iter()
            .map(|&i| moisture_threshold(samples[i].features.moisture)),
    );

    let singles = temperatures
        .iter()
        .map(|&threshold| Split::Single {
            feature: Feature::Temperature,
            threshold,
        })
        .chain(moistures.iter().map(|&threshold| Split::Single {
            feature: Feature::Moisture,
            threshold,
        }));

    let paired = temperatures.iter().flat_map(|&temperature_threshold| {
        moistures.iter().map(move |&moisture_threshold| Split::Paired {
            temperature_threshold,
            moisture_threshold,
        })
    });

    singles.chain(paired).collect()
}

/// Best split over one bootstrap draw.
///
/// The search starts from an infinite score, so only a finite, strictly lower
/// weighted MSE is ever accepted. The first such minimum wins.
pub(crate) fn best_split(samples: &[DailySample], indices: &[usize]) -> Option<SplitRule> {
    // ---
    let mut best_score = f64::INFINITY;
    let mut best = None;
    for split in candidates(samples, indices) {
        let Some((score, rule)) = evaluate(split, samples, indices) else {
            continue;
        };
        if score < best_score {
            best_score = score;
            best = Some(rule);
        }
    }
    best
}

/// Fit one stump on a fresh stratified bootstrap of `samples`.
///
/// Returns `None` when no candidate splits the draw into two non-empty
/// branches with a finite score.
pub fn fit_stump<R: Rng + ?Sized>(
    samples: &[DailySample],
    strata: usize,
    rng: &mut R,
) -> Option<SplitRule> {
    // ---
    let indices = stratified_bootstrap(samples.len(), strata, rng);
    best_split(samples, &indices)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(day: u32, temperature: f64, moisture: f64) -> DailySample {
        // ---
        DailySample {
            day: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            features: Features { temperature, moisture },
            target: et_proxy(temperature, moisture),
        }
    }

    fn spread_samples() -> Vec<DailySample> {
        (1..=12)
            .map(|d| sample(d, 10.0 + 2.0 * d as f64, 80.0 - 5.0 * d as f64))
            .collect()
    }

    #[test]
    fn test_bootstrap_stays_within_strata() {
        // ---
        let mut rng = StdRng::seed_from_u64(7);
        let indices = stratified_bootstrap(12, 5, &mut rng);

        // ceil(12 / 5) = 3 -> strata [0,3) [3,6) [6,9) [9,12) and an empty fifth
        assert_eq!(indices.len(), 12);
        for (position, &index) in indices.iter().enumerate() {
            let stratum = position / 3;
            assert!(index >= stratum * 3 && index < stratum * 3 + 3);
        }
    }

    #[test]
    fn test_bootstrap_short_last_stratum() {
        // ---
        let mut rng = StdRng::seed_from_u64(11);
        let indices = stratified_bootstrap(7, 5, &mut rng);

        // ceil(7 / 5) = 2 -> [0,2) [2,4) [4,6) [6,7)
        assert_eq!(indices.len(), 7);
        assert_eq!(indices[6], 6);
    }

    #[test]
    fn test_bootstrap_single_sample() {
        // ---
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(stratified_bootstrap(1, 5, &mut rng), vec![0]);
        assert!(stratified_bootstrap(0, 5, &mut rng).is_empty());
    }

    #[test]
    fn test_rounding_matches_half_up() {
        // ---
        assert_eq!(temperature_threshold(21.5), 22.0);
        assert_eq!(temperature_threshold(-2.5), -2.0);
        assert_eq!(temperature_threshold(21.49), 21.0);
        assert_eq!(moisture_threshold(47.4), 45.0);
        assert_eq!(moisture_threshold(47.5), 50.0);
    }

    #[test]
    fn test_mse_of_empty_and_constant() {
        // ---
        assert_eq!(mse(&[]), 0.0);
        assert_eq!(mse(&[3.0, 3.0, 3.0]), 0.0);
        assert_eq!(mse(&[1.0, 3.0]), 1.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_evaluate_rejects_empty_branch() {
        // ---
        let samples = spread_samples();
        let indices: Vec<usize> = (0..samples.len()).collect();
        let everything_left = Split::Single {
            feature: Feature::Temperature,
            threshold: 1000.0,
        };

        assert!(evaluate(everything_left, &samples, &indices).is_none());
    }

    #[test]
    fn test_evaluate_single_split_uses_raw_targets() {
        // ---
        let samples = vec![sample(1, 10.0, 10.0), sample(2, 200.0, 90.0)];
        let indices = vec![0, 1];
        let split = Split::Single {
            feature: Feature::Temperature,
            threshold: 10.0,
        };
        let (score, rule) = evaluate(split, &samples, &indices).unwrap();

        assert_eq!(score, 0.0);
        assert_eq!(rule.left_mean, samples[0].target);
        // Raw target is far above the clamp ceiling.
        assert_eq!(rule.right_mean, samples[1].target);
        assert!(rule.right_mean > MAX_ET);
    }

    #[test]
    fn test_evaluate_paired_split_is_clamped() {
        // ---
        let samples = vec![sample(1, 0.0, 0.0), sample(2, 200.0, 90.0)];
        let indices = vec![0, 1];
        let split = Split::Paired {
            temperature_threshold: 0.0,
            moisture_threshold: 0.0,
        };
        let (_, rule) = evaluate(split, &samples, &indices).unwrap();

        assert_eq!(rule.left_mean, MIN_ET);
        assert_eq!(rule.right_mean, MAX_ET);
    }

    #[test]
    fn test_candidate_order() {
        // ---
        let samples = vec![sample(1, 20.4, 41.0), sample(2, 25.6, 58.0)];
        let indices = vec![1, 0, 1];
        let splits = candidates(&samples, &indices);

        assert_eq!(
            splits,
            vec![
                Split::Single { feature: Feature::Temperature, threshold: 26.0 },
                Split::Single { feature: Feature::Temperature, threshold: 20.0 },
                Split::Single { feature: Feature::Moisture, threshold: 60.0 },
                Split::Single { feature: Feature::Moisture, threshold: 40.0 },
                Split::Paired { temperature_threshold: 26.0, moisture_threshold: 60.0 },
                Split::Paired { temperature_threshold: 26.0, moisture_threshold: 40.0 },
                Split::Paired { temperature_threshold: 20.0, moisture_threshold: 60.0 },
                Split::Paired { temperature_threshold: 20.0, moisture_threshold: 40.0 },
            ]
        );
    }

    #[test]
    fn test_first_best_candidate_wins() {
        // ---
        // Both a temperature and a moisture split separate the two samples
        // perfectly; the temperature split is searched first.
        let samples = vec![sample(1, 10.0, 20.0), sample(2, 30.0, 80.0)];
        let mut rng = StdRng::seed_from_u64(3);

        let mut found = 0;
        for _ in 0..50 {
            if let Some(rule) = fit_stump(&samples, 1, &mut rng) {
                found += 1;
                assert!(matches!(
                    rule.split,
                    Split::Single { feature: Feature::Temperature, threshold } if threshold == 10.0
                ));
                assert_eq!(rule.left_mean, samples[0].target);
                assert_eq!(rule.right_mean, samples[1].target);
            }
        }
        assert!(found > 0);
    }

    #[test]
    fn test_accepted_rules_have_both_branches() {
        // ---
        let samples = spread_samples();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let indices = stratified_bootstrap(samples.len(), 5, &mut rng);
            let Some(rule) = best_split(&samples, &indices) else {
                continue;
            };
            let left = indices
                .iter()
                .filter(|&&i| rule.split.goes_left(&samples[i].features))
                .count();
            assert!(left > 0 && left < indices.len());
        }
    }

    #[test]
    fn test_paired_rule_means_within_et_bounds() {
        // ---
        let samples: Vec<DailySample> = (1..=20)
            .map(|d| sample(d, -20.0 + 6.0 * d as f64, 5.0 * d as f64))
            .collect();
        let indices: Vec<usize> = (0..samples.len()).collect();

        for split in candidates(&samples, &indices) {
            if let (Split::Paired { .. }, Some((_, rule))) = (split, evaluate(split, &samples, &indices)) {
                assert!((MIN_ET..=MAX_ET).contains(&rule.left_mean));
                assert!((MIN_ET..=MAX_ET).contains(&rule.right_mean));
            }
        }
    }

    #[test]
    fn test_single_sample_never_splits() {
        // ---
        let samples = vec![sample(1, 25.0, 50.0)];
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..10 {
            assert!(fit_stump(&samples, 5, &mut rng).is_none());
        }
    }

    #[test]
    fn test_rule_predict_follows_split() {
        // ---
        let rule = SplitRule {
            split: Split::Paired {
                temperature_threshold: 25.0,
                moisture_threshold: 50.0,
            },
            left_mean: 2.0,
            right_mean: 4.0,
        };

        assert_eq!(rule.predict(&Features { temperature: 25.0, moisture: 50.0 }), 2.0);
        assert_eq!(rule.predict(&Features { temperature: 25.0, moisture: 51.0 }), 4.0);
        assert_eq!(rule.predict(&Features { temperature: 26.0, moisture: 10.0 }), 4.0);
    }

    #[test]
    fn test_non_finite_scores_never_win() {
        // ---
        // The hot day's raw target overflows, so every single-feature split
        // that puts it in a branch scores NaN or inf. Only the clamped paired
        // split has a finite score.
        let mut hot = sample(1, 20.0, 50.0);
        hot.target = f64::INFINITY;
        let samples = vec![hot, sample(2, 25.0, 60.0)];
        let indices = vec![0, 1];

        let rule = best_split(&samples, &indices).unwrap();
        assert!(matches!(rule.split, Split::Paired { .. }));
        assert!(rule.left_mean.is_finite() && rule.right_mean.is_finite());
    }

    #[test]
    fn test_all_non_finite_scores_reject_the_draw() {
        // ---
        let mut samples = vec![sample(1, 20.0, 50.0), sample(2, 25.0, 50.0)];
        samples[0].target = f64::NAN;
        samples[1].target = f64::NAN;
        samples[0].features.moisture = f64::NAN;

        // Every split that separates the draw puts a NaN value in a branch.
        assert!(best_split(&samples, &[0, 1]).is_none());
    }

    #[test]
    fn test_overflowing_day_yields_finite_rules() {
        // ---
        use crate::forecast::aggregate_daily;
        use crate::models::{NodeId, Reading};
        use chrono::{TimeZone, Utc};

        let reading = |day: u32, temperature: f64| Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            temperature: Some(temperature),
            soil_moisture: None,
            node_id: NodeId::default(),
        };
        let samples = aggregate_daily(&[reading(1, 1e308), reading(1, 1e308), reading(2, 20.0)]);
        let mut rng = StdRng::seed_from_u64(200);

        for _ in 0..200 {
            if let Some(rule) = fit_stump(&samples, 5, &mut rng) {
                assert!(rule.left_mean.is_finite(), "{:?}", rule);
                assert!(rule.right_mean.is_finite(), "{:?}", rule);
            }
        }
    }
}
