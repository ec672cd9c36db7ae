//! Configuration loader for the `sensorflow-forecast` service.
//!
//! All runtime values and their defaults live here and are loaded from
//! environment variables (with optional `.env` support provided by the
//! caller). The forecast engine's constants are exposed as `FORECAST_*`
//! overrides so they can be tuned without a rebuild.
//!
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Result};

use crate::forecast::ForecastParams;

/// Longest forecast the service will produce.
const MAX_HORIZON_DAYS: u32 = 366;

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Where reading history comes from.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    // ---
    /// Sensor backend base URL.
    pub api_url: String,

    /// Optional bearer token sent with every history request.
    pub api_token: Option<String>,

    /// How often the history endpoint is polled.
    pub poll_interval: Duration,

    /// How often the live reading endpoint is polled. Drives the connectivity flag.
    pub current_poll_interval: Duration,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Sensor backend connection.
    pub source: SourceConfig,

    /// Address the HTTP API binds to.
    pub listen_addr: SocketAddr,

    /// Forecast engine constants.
    pub forecast: ForecastParams,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `SENSOR_API_URL` – Sensor backend base URL
///
/// Optional:
/// - `SENSOR_API_TOKEN` – bearer token for the backend (default: none)
/// - `HISTORY_POLL_SECS` – history poll period (default: 5)
/// - `CURRENT_POLL_SECS` – live reading poll period (default: 2)
/// - `LISTEN_ADDR` – API bind address (default: `0.0.0.0:8080`)
/// - `FORECAST_TREE_CAP`, `FORECAST_TREE_FLOOR`, `FORECAST_TREE_MULTIPLIER` (40, 1, 4)
/// - `FORECAST_STRATA` – bootstrap strata (default: 5)
/// - `FORECAST_TEMP_NOISE`, `FORECAST_MOISTURE_NOISE` – noise half-widths (1.0, 2.0)
/// - `FORECAST_HORIZON_DAYS` – forecast length (default: 10)
/// - `FORECAST_RETRAIN_SECS` – periodic retrain (default: 3600)
/// - `FORECAST_SEED` – fixed RNG seed (default: OS entropy)
///
/// Returns an error if any required variable is missing or any value is invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let api_url = require_env!("SENSOR_API_URL");
    let api_token = env::var("SENSOR_API_TOKEN").ok().filter(|t| !t.trim().is_empty());
    let poll_secs = parse_env!("HISTORY_POLL_SECS", u64, 5);
    let current_poll_secs = parse_env!("CURRENT_POLL_SECS", u64, 2);
    let listen_addr = parse_env!("LISTEN_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 8080)));

    let defaults = ForecastParams::default();
    let forecast = ForecastParams {
        tree_cap: parse_env!("FORECAST_TREE_CAP", usize, defaults.tree_cap),
        tree_floor: parse_env!("FORECAST_TREE_FLOOR", usize, defaults.tree_floor),
        tree_multiplier: parse_env!("FORECAST_TREE_MULTIPLIER", usize, defaults.tree_multiplier),
        strata: parse_env!("FORECAST_STRATA", usize, defaults.strata),
        temperature_noise: parse_env!("FORECAST_TEMP_NOISE", f64, defaults.temperature_noise),
        moisture_noise: parse_env!("FORECAST_MOISTURE_NOISE", f64, defaults.moisture_noise),
        horizon_days: parse_env!("FORECAST_HORIZON_DAYS", u32, defaults.horizon_days),
        retrain_interval: Duration::from_secs(parse_env!(
            "FORECAST_RETRAIN_SECS",
            u64,
            defaults.retrain_interval.as_secs()
        )),
        seed: env::var("FORECAST_SEED")
            .ok()
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid FORECAST_SEED: {}", e))?,
    };

    let config = Config {
        source: SourceConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            poll_interval: Duration::from_secs(poll_secs),
            current_poll_interval: Duration::from_secs(current_poll_secs),
        },
        listen_addr,
        forecast,
    };
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        // ---
        let f = &self.forecast;
        if self.source.poll_interval.is_zero() {
            bail!("HISTORY_POLL_SECS must be greater than zero");
        }
        if self.source.current_poll_interval.is_zero() {
            bail!("CURRENT_POLL_SECS must be greater than zero");
        }
        if f.retrain_interval.is_zero() {
            bail!("FORECAST_RETRAIN_SECS must be greater than zero");
        }
        if f.strata == 0 {
            bail!("FORECAST_STRATA must be greater than zero");
        }
        if f.horizon_days == 0 || f.horizon_days > MAX_HORIZON_DAYS {
            bail!("FORECAST_HORIZON_DAYS must be between 1 and {}", MAX_HORIZON_DAYS);
        }
        if f.tree_floor > f.tree_cap {
            bail!(
                "FORECAST_TREE_FLOOR ({}) exceeds FORECAST_TREE_CAP ({})",
                f.tree_floor,
                f.tree_cap
            );
        }
        for (name, width) in [
            ("FORECAST_TEMP_NOISE", f.temperature_noise),
            ("FORECAST_MOISTURE_NOISE", f.moisture_noise),
        ] {
            if !width.is_finite() || width < 0.0 {
                bail!("{} must be a finite, non-negative number", name);
            }
        }
        Ok(())
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// The API token is masked; everything else is shown as loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.source.api_token {
            Some(_) => "****",
            None => "(none)",
        };
        let f = &self.forecast;

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_API_URL        : {}", self.source.api_url);
        tracing::info!("  SENSOR_API_TOKEN      : {}", masked_token);
        tracing::info!("  HISTORY_POLL_SECS     : {}", self.source.poll_interval.as_secs());
        tracing::info!(
            "  CURRENT_POLL_SECS     : {}",
            self.source.current_poll_interval.as_secs()
        );
        tracing::info!("  LISTEN_ADDR           : {}", self.listen_addr);
        tracing::info!(
            "  FORECAST_TREES        : cap {} / floor {} / x{}",
            f.tree_cap,
            f.tree_floor,
            f.tree_multiplier
        );
        tracing::info!("  FORECAST_STRATA       : {}", f.strata);
        tracing::info!(
            "  FORECAST_NOISE        : ±{} temp / ±{} moisture",
            f.temperature_noise,
            f.moisture_noise
        );
        tracing::info!("  FORECAST_HORIZON_DAYS : {}", f.horizon_days);
        tracing::info!("  FORECAST_RETRAIN_SECS : {}", f.retrain_interval.as_secs());
        tracing::info!("  FORECAST_SEED         : {:?}", f.seed);
    }
}
