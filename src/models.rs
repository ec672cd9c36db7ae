//! Data models shared by the history source, the forecast engine and the API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---

/// Identifier of the sensor node that produced a reading.
///
/// The backend sends node ids as numbers or strings; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl Default for NodeId {
    fn default() -> Self {
        NodeId("1".to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // ---
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        let id = match value {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Ok(NodeId::default()),
        };
        Ok(NodeId(id))
    }
}

/// One raw sensor reading as reported by the sensor backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    #[serde(default, rename = "soilMoisture", deserialize_with = "lenient_f64")]
    pub soil_moisture: Option<f64>,
    #[serde(default)]
    pub node_id: NodeId,
}

/// Accept a JSON number or a numeric string. Anything else is treated as missing.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    // ---
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

/// The two model inputs for one day (or one synthetic future day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Features {
    pub temperature: f64,
    pub moisture: f64,
}

/// Per-day training sample produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySample {
    pub day: NaiveDate,
    pub features: Features,
    pub target: f64,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Predicted evapotranspiration in mm/day, rounded to 3 decimals.
    pub et: f64,
}

/// A full multi-day forecast, oldest day first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Chart labels (`YYYY-MM-DD`).
    pub fn labels(&self) -> Vec<String> {
        self.points.iter().map(|p| p.date.to_string()).collect()
    }

    /// Chart values, aligned with [`Forecast::labels`].
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.et).collect()
    }
}
