use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::forecast::ForecastDriver;
use crate::models::ForecastPoint;
use crate::service::{ForecastSnapshot, Trigger};
use crate::{AppState, Config, NodeId, Reading};

// ---

pub fn router() -> Router<(AppState, Config)> {
    // ---
    Router::new().route("/forecast", get(handler))
}

/// Query parameters for the forecast endpoint
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// Restrict training to a single node's readings.
    node_id: Option<String>,
}

/// Forecast payload, shaped for a chart (`labels` + `values`) and for tables (`points`).
#[derive(Debug, Serialize)]
struct ForecastResponse {
    cycle_id: Uuid,
    generated_at: DateTime<Utc>,
    trigger: Trigger,
    node_id: Option<String>,
    reading_count: usize,
    sample_count: usize,
    requested_trees: usize,
    tree_count: usize,
    labels: Vec<String>,
    values: Vec<f64>,
    points: Vec<ForecastPoint>,
}

impl ForecastResponse {
    fn new(snapshot: ForecastSnapshot, node_id: Option<String>) -> Self {
        // ---
        Self {
            cycle_id: snapshot.cycle_id,
            generated_at: snapshot.generated_at,
            trigger: snapshot.trigger,
            node_id,
            reading_count: snapshot.reading_count,
            sample_count: snapshot.sample_count,
            requested_trees: snapshot.requested_trees,
            tree_count: snapshot.tree_count,
            labels: snapshot.forecast.labels(),
            values: snapshot.forecast.values(),
            points: snapshot.forecast.points,
        }
    }
}

async fn handler(
    Query(params): Query<ForecastQuery>,
    State((state, config)): State<(AppState, Config)>,
) -> impl IntoResponse {
    // ---
    info!("GET /forecast - {:?}", params);

    let Some(node) = params.node_id.filter(|n| !n.trim().is_empty()) else {
        return match state.snapshot().await {
            Some(snapshot) => {
                (StatusCode::OK, Json(ForecastResponse::new(snapshot, None))).into_response()
            }
            None => {
                debug!("GET /forecast - no forecast published yet");
                (StatusCode::SERVICE_UNAVAILABLE, Json("Forecast not ready")).into_response()
            }
        };
    };

    // One-off cycle over a single node's readings.
    let node_id = NodeId(node.trim().to_string());
    let history = state.history().await;
    let filtered: Vec<Reading> = history
        .iter()
        .filter(|r| r.node_id == node_id)
        .cloned()
        .collect();

    if filtered.is_empty() {
        debug!("GET /forecast - node {} has no readings", node_id);
        let message = format!("No readings for node {}", node_id);
        return (StatusCode::NOT_FOUND, Json(message)).into_response();
    }

    let mut driver = ForecastDriver::new(config.forecast.clone());
    let cycle = driver.run_cycle(&filtered, Utc::now().date_naive());
    let snapshot = ForecastSnapshot::from_cycle(cycle, Trigger::OnDemand, filtered.len());

    debug!("GET /forecast - Returning OK for node {}", node_id);
    (StatusCode::OK, Json(ForecastResponse::new(snapshot, Some(node_id.0)))).into_response()
}
