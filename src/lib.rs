//! `sensorflow-forecast`: soil sensor monitoring with an embedded ET forecast.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a narrow surface and siblings reach each other through the
//! re-exports below rather than through each other's internals.
//!
//! - `forecast`: the synchronous forecasting engine
//! - `source`: sensor backend history client
//! - `service`: background retraining loop and shared state
//! - `analytics`: node and 24 hour summaries
//! - `routes`: HTTP API gateway

pub mod analytics;
pub mod config;
pub mod forecast;
pub mod models;
pub mod routes;
pub mod service;
pub mod source;

pub use config::Config;
pub use models::{DailySample, Features, Forecast, ForecastPoint, NodeId, Reading};
pub use service::AppState;
