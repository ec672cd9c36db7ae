//! Dashboard summaries derived from the reading history.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::forecast::{et_proxy, round3};
use crate::models::{NodeId, Reading};

// ---

const DEFAULT_TEMPERATURE: f64 = 20.0;
const DEFAULT_MOISTURE: f64 = 50.0;

/// Latest reading reported by one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStat {
    pub node_id: NodeId,
    pub temperature: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub last_update: DateTime<Utc>,
}

/// Rolling 24 hour summary with day-over-day trends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub avg_temperature: Option<f64>,
    pub avg_moisture: Option<f64>,
    /// Percent change against the previous 24 hours.
    pub temperature_trend_pct: Option<f64>,
    pub moisture_trend_pct: Option<f64>,
    /// ET estimate from the mean of each node's latest values, mm/day.
    pub et_today: f64,
}

/// Numeric ids sort numerically, everything else lexically after them.
fn compare_node_ids(a: &NodeId, b: &NodeId) -> Ordering {
    // ---
    match (a.0.parse::<i64>(), b.0.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// The most recent reading per node, sorted by node id.
///
/// "Most recent" is the latest timestamp; ties keep the later history entry.
pub fn node_stats(history: &[Reading]) -> Vec<NodeStat> {
    // ---
    let latest: BTreeMap<&NodeId, &Reading> =
        history.iter().fold(BTreeMap::new(), |mut nodes, reading| {
            let entry = nodes.entry(&reading.node_id).or_insert(reading);
            if reading.timestamp >= entry.timestamp {
                *entry = reading;
            }
            nodes
        });

    let mut stats: Vec<NodeStat> = latest
        .into_values()
        .map(|r| NodeStat {
            node_id: r.node_id.clone(),
            temperature: r.temperature,
            soil_moisture: r.soil_moisture,
            last_update: r.timestamp,
        })
        .collect();
    stats.sort_by(|a, b| compare_node_ids(&a.node_id, &b.node_id));
    stats
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    // ---
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Percent change from `older` to `recent`; `None` without a usable baseline.
fn trend_pct(recent: Option<f64>, older: Option<f64>) -> Option<f64> {
    // ---
    match (recent, older) {
        (Some(r), Some(o)) if o != 0.0 => Some(((r - o) / o * 100.0 * 10.0).round() / 10.0),
        _ => None,
    }
}

/// ET estimate for today from current node conditions.
pub fn estimate_et(temperature: Option<f64>, moisture: Option<f64>) -> f64 {
    round3(et_proxy(
        temperature.unwrap_or(DEFAULT_TEMPERATURE),
        moisture.unwrap_or(DEFAULT_MOISTURE),
    ))
}

/// Summarise the last 24 hours before `now` against the 24 hours before that.
pub fn summarize(history: &[Reading], now: DateTime<Utc>) -> AnalyticsSummary {
    // ---
    let day_ago = now - Duration::hours(24);
    let two_days_ago = day_ago - Duration::hours(24);

    let recent: Vec<&Reading> = history.iter().filter(|r| r.timestamp > day_ago).collect();
    let older: Vec<&Reading> = history
        .iter()
        .filter(|r| r.timestamp <= day_ago && r.timestamp > two_days_ago)
        .collect();

    let avg_temp = |rs: &[&Reading]| mean(rs.iter().filter_map(|r| r.temperature));
    let avg_moist = |rs: &[&Reading]| mean(rs.iter().filter_map(|r| r.soil_moisture));

    let avg_temperature = avg_temp(&recent);
    let avg_moisture = avg_moist(&recent);

    let nodes = node_stats(history);
    let et_today = estimate_et(
        mean(nodes.iter().filter_map(|n| n.temperature)),
        mean(nodes.iter().filter_map(|n| n.soil_moisture)),
    );

    AnalyticsSummary {
        total: history.len(),
        avg_temperature: avg_temperature.map(|v| (v * 100.0).round() / 100.0),
        avg_moisture: avg_moisture.map(|v| (v * 100.0).round() / 100.0),
        temperature_trend_pct: trend_pct(avg_temperature, avg_temp(&older)),
        moisture_trend_pct: trend_pct(avg_moisture, avg_moist(&older)),
        et_today,
    }
}
