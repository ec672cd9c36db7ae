//! Sensor backend client: reading history and the live current reading.

use anyhow::{Context, Result};

use crate::{config::SourceConfig, Reading};

// ---

/// Path of the history endpoint relative to the backend base URL.
const HISTORY_PATH: &str = "/api/sensors/history";

/// Path of the live reading endpoint relative to the backend base URL.
const CURRENT_PATH: &str = "/api/sensors/current";

/// GET `path` on the backend and decode the JSON body.
async fn get_json(
    client: &reqwest::Client,
    source: &SourceConfig,
    path: &str,
) -> Result<serde_json::Value> {
    // ---
    let url = format!("{}{}", source.api_url, path);
    tracing::debug!("Fetching from: {}", url);

    let mut request = client.get(&url);
    if let Some(token) = &source.api_token {
        request = request.bearer_auth(token);
    }

    request
        .send()
        .await
        .with_context(|| format!("Failed to reach sensor backend at {}", url))?
        .error_for_status()
        .with_context(|| format!("Sensor backend rejected request to {}", url))?
        .json()
        .await
        .with_context(|| format!("Response from {} was not valid JSON", url))
}

/// Fetch the full reading history, oldest first.
///
/// The backend answers `{ "data": [...] }` newest first. Items that fail to
/// parse are logged and skipped so one bad record never drops the batch.
pub async fn fetch_history(client: &reqwest::Client, source: &SourceConfig) -> Result<Vec<Reading>> {
    // ---
    let response = get_json(client, source, HISTORY_PATH).await?;
    Ok(parse_history(&response))
}

/// Fetch the backend's live reading.
///
/// A successful call proves the backend is reachable even when the body is
/// not a usable reading, so that case is `Ok(None)`.
pub async fn fetch_current(client: &reqwest::Client, source: &SourceConfig) -> Result<Option<Reading>> {
    // ---
    let response = get_json(client, source, CURRENT_PATH).await?;
    Ok(parse_current(&response))
}

/// Decode a current-reading body. The reading may be bare or wrapped in `data`.
pub fn parse_current(response: &serde_json::Value) -> Option<Reading> {
    // ---
    let body = response.get("data").filter(|d| d.is_object()).unwrap_or(response);
    match serde_json::from_value::<Reading>(body.clone()) {
        Ok(reading) => Some(reading),
        Err(e) => {
            tracing::debug!("Failed to parse current reading: {} - Raw body: {}", e, response);
            None
        }
    }
}

/// Extract readings from a history response body, oldest first.
pub fn parse_history(response: &serde_json::Value) -> Vec<Reading> {
    // ---
    let Some(data) = response.get("data").and_then(|d| d.as_array()) else {
        tracing::debug!("History response missing 'data' field or not an array");
        return Vec::new();
    };

    let mut readings = Vec::with_capacity(data.len());
    for (i, item) in data.iter().enumerate() {
        match serde_json::from_value::<Reading>(item.clone()) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                tracing::debug!("Failed to parse history item {}: {} - Raw item: {}", i, e, item);
            }
        }
    }

    readings.reverse();
    tracing::debug!("Parsed {} of {} history items", readings.len(), data.len());
    readings
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_history_reverses_to_oldest_first() {
        // ---
        let body = serde_json::json!({
            "data": [
                { "timestamp": "2024-01-02T10:00:00Z", "temperature": 21, "soilMoisture": 40, "node_id": 1 },
                { "timestamp": "2024-01-01T09:00:00Z", "temperature": 19, "soilMoisture": 45, "node_id": 2 }
            ]
        });
        let readings = parse_history(&body);

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].timestamp.hour(), 9);
        assert_eq!(readings[1].timestamp.hour(), 10);
    }

    #[test]
    fn test_parse_history_skips_bad_items() {
        // ---
        let body = serde_json::json!({
            "data": [
                { "timestamp": "not a time", "temperature": 21 },
                { "timestamp": "2024-01-01T09:00:00Z", "temperature": "n/a", "soilMoisture": 45 },
                42
            ]
        });
        let readings = parse_history(&body);

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].temperature, None);
        assert_eq!(readings[0].soil_moisture, Some(45.0));
    }

    #[test]
    fn test_parse_current_bare_and_wrapped() {
        // ---
        let bare = serde_json::json!({
            "timestamp": "2024-01-02T10:00:00Z", "temperature": 21.5, "soilMoisture": "38", "node_id": 4
        });
        let reading = parse_current(&bare).unwrap();
        assert_eq!(reading.temperature, Some(21.5));
        assert_eq!(reading.soil_moisture, Some(38.0));

        let wrapped = serde_json::json!({ "data": bare });
        assert_eq!(parse_current(&wrapped), Some(reading));
    }

    #[test]
    fn test_parse_current_without_timestamp() {
        // ---
        assert!(parse_current(&serde_json::json!({ "temperature": 21.5 })).is_none());
        assert!(parse_current(&serde_json::json!(null)).is_none());
    }

    #[test]
    fn test_parse_history_without_data() {
        // ---
        assert!(parse_history(&serde_json::json!({ "error": "nope" })).is_empty());
        assert!(parse_history(&serde_json::json!({ "data": {} })).is_empty());
    }
}
