use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{AppState, Config, Reading};

// ---

pub fn router() -> Router<(AppState, Config)> {
    // ---
    Router::new().route("/current", get(handler))
}

#[derive(Serialize)]
struct CurrentResponse {
    connected: bool,
    reading: Reading,
}

/// Latest live reading polled from the sensor backend.
async fn handler(State((state, _config)): State<(AppState, Config)>) -> impl IntoResponse {
    // ---
    info!("GET /current");
    let connected = state.connected().await;
    match state.latest().await {
        Some(reading) => (StatusCode::OK, Json(CurrentResponse { connected, reading })).into_response(),
        None => {
            debug!("GET /current - no live reading yet");
            (StatusCode::NOT_FOUND, Json("No live reading yet")).into_response()
        }
    }
}
