//! Daily aggregation of raw readings into training samples.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::et_proxy;
use crate::models::{DailySample, Features, Reading};

// ---

const DEFAULT_TEMPERATURE: f64 = 20.0;
const DEFAULT_MOISTURE: f64 = 50.0;

/// Running sums for one calendar day.
#[derive(Debug, Clone, Copy, Default)]
struct DayTotals {
    temperature_sum: f64,
    temperature_count: usize,
    moisture_sum: f64,
    moisture_count: usize,
}

impl DayTotals {
    fn add(mut self, reading: &Reading) -> Self {
        // ---
        if let Some(t) = reading.temperature {
            self.temperature_sum += t;
            self.temperature_count += 1;
        }
        if let Some(m) = reading.soil_moisture {
            self.moisture_sum += m;
            self.moisture_count += 1;
        }
        self
    }

    /// Mean of the day's values, or `default` when there are none or the sum overflowed.
    fn mean_or(sum: f64, count: usize, default: f64) -> f64 {
        // ---
        let mean = sum / count as f64;
        if count == 0 || !mean.is_finite() {
            default
        } else {
            mean
        }
    }

    fn features(&self) -> Features {
        Features {
            temperature: Self::mean_or(self.temperature_sum, self.temperature_count, DEFAULT_TEMPERATURE),
            moisture: Self::mean_or(self.moisture_sum, self.moisture_count, DEFAULT_MOISTURE),
        }
    }
}

/// Collapse the full reading history (all nodes pooled) into one sample per
/// UTC calendar day, ascending by date.
///
/// Days with no temperature (or moisture) observations fall back to 20.0
/// (or 50.0). The target is the linear ET proxy of the day's averages.
pub fn aggregate_daily(history: &[Reading]) -> Vec<DailySample> {
    // ---
    let totals: BTreeMap<NaiveDate, DayTotals> =
        history.iter().fold(BTreeMap::new(), |mut days, reading| {
            let day = reading.timestamp.date_naive();
            let entry = days.entry(day).or_insert_with(DayTotals::default);
            *entry = entry.add(reading);
            days
        });

    totals
        .into_iter()
        .map(|(day, totals)| {
            let features = totals.features();
            DailySample {
                day,
                features,
                target: et_proxy(features.temperature, features.moisture),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::NodeId;
    use chrono::{TimeZone, Utc};

    fn reading(day: u32, hour: u32, temperature: Option<f64>, moisture: Option<f64>) -> Reading {
        // ---
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            temperature,
            soil_moisture: moisture,
            node_id: NodeId::default(),
        }
    }

    #[test]
    fn test_single_day_average() {
        // ---
        let history = vec![
            reading(1, 1, Some(20.0), Some(40.0)),
            reading(1, 8, Some(22.0), Some(50.0)),
            reading(1, 23, Some(24.0), Some(60.0)),
        ];
        let samples = aggregate_daily(&history);

        assert_eq!(samples.len(), 1);
        let sample = &samples[0];
        assert_eq!(sample.day, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(sample.features.temperature, 22.0);
        assert_eq!(sample.features.moisture, 50.0);
        assert!((sample.target - 3.26).abs() < 1e-9);
    }

    #[test]
    fn test_one_sample_per_day_regardless_of_order() {
        // ---
        let history = vec![
            reading(3, 5, Some(30.0), Some(20.0)),
            reading(1, 5, Some(10.0), Some(80.0)),
            reading(3, 9, Some(32.0), Some(22.0)),
            reading(2, 0, Some(15.0), Some(60.0)),
            reading(1, 12, Some(12.0), Some(70.0)),
        ];
        let samples = aggregate_daily(&history);

        let days: Vec<u32> = samples.iter().map(|s| chrono::Datelike::day(&s.day)).collect();
        assert_eq!(days, vec![1, 2, 3]);
        assert_eq!(samples[0].features.temperature, 11.0);
        assert_eq!(samples[2].features.moisture, 21.0);

        let mut reversed = history.clone();
        reversed.reverse();
        assert_eq!(aggregate_daily(&reversed), samples);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        // ---
        let history = vec![
            reading(1, 1, None, Some(30.0)),
            reading(2, 1, Some(28.0), None),
            reading(3, 1, None, None),
        ];
        let samples = aggregate_daily(&history);

        assert_eq!(samples[0].features, Features { temperature: 20.0, moisture: 30.0 });
        assert_eq!(samples[1].features, Features { temperature: 28.0, moisture: 50.0 });
        assert_eq!(samples[2].features, Features { temperature: 20.0, moisture: 50.0 });
        assert!((samples[2].target - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_partial_fields_average_only_present_values() {
        // ---
        let history = vec![
            reading(1, 1, Some(10.0), None),
            reading(1, 2, Some(30.0), Some(40.0)),
        ];
        let samples = aggregate_daily(&history);

        assert_eq!(samples[0].features, Features { temperature: 20.0, moisture: 40.0 });
    }

    #[test]
    fn test_overflowing_day_falls_back_to_defaults() {
        // ---
        let history = vec![
            reading(1, 1, Some(1e308), Some(1e308)),
            reading(1, 2, Some(1e308), Some(1e308)),
            reading(2, 1, Some(-1e308), Some(40.0)),
            reading(2, 2, Some(-1e308), Some(40.0)),
        ];
        let samples = aggregate_daily(&history);

        assert_eq!(samples[0].features, Features { temperature: 20.0, moisture: 50.0 });
        assert_eq!(samples[1].features, Features { temperature: 20.0, moisture: 40.0 });
        assert!(samples.iter().all(|s| s.target.is_finite()));
    }

    #[test]
    fn test_empty_history() {
        // ---
        assert!(aggregate_daily(&[]).is_empty());
    }
}
