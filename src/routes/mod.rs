use axum::Router;

use crate::{AppState, Config};

mod get_analytics;
mod get_current;
mod get_forecast;
mod get_nodes;
mod health;

// ---

pub fn router(state: AppState, config: Config) -> Router {
    // ---
    Router::new()
        .merge(get_forecast::router())
        .merge(get_nodes::router())
        .merge(get_current::router())
        .merge(get_analytics::router())
        .merge(health::router())
        .with_state((state, config))
}
