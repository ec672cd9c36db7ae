use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use crate::analytics::{node_stats, NodeStat};
use crate::{AppState, Config};

// ---

pub fn router() -> Router<(AppState, Config)> {
    // ---
    Router::new().route("/nodes", get(handler))
}

/// Latest reading of every node seen in the history.
async fn handler(State((state, _config)): State<(AppState, Config)>) -> Json<Vec<NodeStat>> {
    // ---
    let history = state.history().await;
    let stats = node_stats(&history);
    info!("GET /nodes - {} nodes", stats.len());
    Json(stats)
}
