//! Ensemble training and prediction.

use rand::Rng;

use super::split::{fit_stump, SplitRule};
use crate::models::{DailySample, Features};

// ---

/// An ensemble of independently fitted stumps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    rules: Vec<SplitRule>,
}

impl Forest {
    pub fn new(rules: Vec<SplitRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SplitRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Unweighted mean of every rule's leaf value. An empty forest predicts `0.0`.
    pub fn predict(&self, features: &Features) -> f64 {
        // ---
        if self.rules.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.rules.iter().map(|rule| rule.predict(features)).sum();
        sum / self.rules.len() as f64
    }
}

/// Fit `tree_count` stumps, each on its own stratified bootstrap draw.
///
/// Rounds where no split is possible contribute no tree, so the forest may
/// hold fewer than `tree_count` rules.
pub fn train_forest<R: Rng + ?Sized>(
    samples: &[DailySample],
    tree_count: usize,
    strata: usize,
    rng: &mut R,
) -> Forest {
    // ---
    if samples.is_empty() {
        return Forest::default();
    }

    let rules: Vec<SplitRule> = (0..tree_count)
        .filter_map(|_| fit_stump(samples, strata, &mut *rng))
        .collect();

    tracing::debug!(
        "Trained forest: {} of {} trees accepted over {} samples",
        rules.len(),
        tree_count,
        samples.len()
    );
    Forest::new(rules)
}
