use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::analytics::{summarize, AnalyticsSummary};
use crate::{AppState, Config};

// ---

pub fn router() -> Router<(AppState, Config)> {
    // ---
    Router::new().route("/analytics/summary", get(handler))
}

#[derive(Serialize)]
struct SummaryResponse {
    connected: bool,
    last_fetch: Option<DateTime<Utc>>,
    #[serde(flatten)]
    summary: AnalyticsSummary,
}

async fn handler(State((state, _config)): State<(AppState, Config)>) -> Json<SummaryResponse> {
    // ---
    let history = state.history().await;
    let summary = summarize(&history, Utc::now());
    info!("GET /analytics/summary - {} readings", summary.total);

    Json(SummaryResponse {
        connected: state.connected().await,
        last_fetch: state.last_fetch().await,
        summary,
    })
}
