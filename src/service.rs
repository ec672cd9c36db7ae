//! Background retraining service and the state it shares with the API.
//!
//! A single task owns the [`ForecastDriver`]. It polls the sensor backend for
//! history, retrains whenever the history changes, and retrains again on a
//! fixed interval so the bootstrap and forecast noise are re-sampled. The same
//! task polls the live reading, which also decides whether the backend counts
//! as connected. HTTP handlers only ever read the published state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::config::Config;
use crate::forecast::{ForecastCycle, ForecastDriver};
use crate::models::{Forecast, Reading};
use crate::source::{fetch_current, fetch_history};

// ---

/// Why a forecast cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Startup,
    HistoryChanged,
    Timer,
    OnDemand,
}

/// A published forecast together with the cycle that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSnapshot {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub trigger: Trigger,
    pub reading_count: usize,
    pub sample_count: usize,
    pub requested_trees: usize,
    pub tree_count: usize,
    pub forecast: Forecast,
}

impl ForecastSnapshot {
    pub fn from_cycle(cycle: ForecastCycle, trigger: Trigger, reading_count: usize) -> Self {
        // ---
        Self {
            cycle_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            trigger,
            reading_count,
            sample_count: cycle.sample_count,
            requested_trees: cycle.requested_trees,
            tree_count: cycle.tree_count,
            forecast: cycle.forecast,
        }
    }
}

/// Everything the API reads.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub history: Arc<Vec<Reading>>,
    pub snapshot: Option<ForecastSnapshot>,
    /// Latest live reading from the backend.
    pub latest: Option<Reading>,
    /// Whether the last live reading poll succeeded.
    pub connected: bool,
    /// Time of the last successful history fetch.
    pub last_fetch: Option<DateTime<Utc>>,
}

/// Cheaply cloneable handle to the shared monitor state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    inner: Arc<RwLock<MonitorState>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history(&self) -> Arc<Vec<Reading>> {
        self.inner.read().await.history.clone()
    }

    pub async fn snapshot(&self) -> Option<ForecastSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn connected(&self) -> bool {
        self.inner.read().await.connected
    }

    pub async fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_fetch
    }

    pub async fn latest(&self) -> Option<Reading> {
        self.inner.read().await.latest.clone()
    }

    /// Record a live reading poll. `None` means the backend was unreachable.
    ///
    /// A reachable backend with an unusable body keeps the previous reading.
    async fn record_current(&self, outcome: Option<Option<Reading>>) {
        // ---
        let mut state = self.inner.write().await;
        state.connected = outcome.is_some();
        if let Some(Some(reading)) = outcome {
            state.latest = Some(reading);
        }
    }

    async fn record_history_fetch(&self) {
        self.inner.write().await.last_fetch = Some(Utc::now());
    }
}

/// Owns the forecast driver and publishes snapshots into [`AppState`].
pub struct Retrainer {
    driver: ForecastDriver,
    state: AppState,
}

impl Retrainer {
    pub fn new(driver: ForecastDriver, state: AppState) -> Self {
        Self { driver, state }
    }

    /// Store `history` and retrain if it differs from the current one.
    ///
    /// Returns whether a new cycle ran.
    pub async fn ingest(&mut self, history: Vec<Reading>) -> bool {
        // ---
        {
            let mut state = self.state.inner.write().await;
            if *state.history == history {
                tracing::trace!("History unchanged ({} readings)", history.len());
                return false;
            }
            tracing::info!(
                "History changed: {} -> {} readings",
                state.history.len(),
                history.len()
            );
            state.history = Arc::new(history);
        }
        self.retrain(Trigger::HistoryChanged).await;
        true
    }

    /// Run one cycle over the stored history and publish the result.
    pub async fn retrain(&mut self, trigger: Trigger) -> ForecastSnapshot {
        // ---
        let history = self.state.history().await;
        let cycle = self.driver.run_cycle(&history, Utc::now().date_naive());
        let snapshot = ForecastSnapshot::from_cycle(cycle, trigger, history.len());

        tracing::info!(
            cycle_id = %snapshot.cycle_id,
            trigger = ?trigger,
            "Forecast published: {} samples, {}/{} trees",
            snapshot.sample_count,
            snapshot.tree_count,
            snapshot.requested_trees
        );

        self.state.inner.write().await.snapshot = Some(snapshot.clone());
        snapshot
    }
}

/// Poll the backend and retrain until the process exits.
pub async fn run(state: AppState, config: Config) {
    // ---
    let client = reqwest::Client::new();
    let mut retrainer = Retrainer::new(ForecastDriver::new(config.forecast.clone()), state.clone());
    retrainer.retrain(Trigger::Startup).await;

    let mut poll = interval(config.source.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut current = interval(config.source.current_poll_interval);
    current.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut retrain = interval(config.forecast.retrain_interval);
    retrain.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and the startup cycle already covered it.
    retrain.tick().await;

    loop {
        tokio::select! {
            _ = current.tick() => {
                match fetch_current(&client, &config.source).await {
                    Ok(reading) => {
                        if !state.connected().await {
                            tracing::info!("Sensor backend connected");
                        }
                        state.record_current(Some(reading)).await;
                    }
                    Err(e) => {
                        if state.connected().await {
                            tracing::warn!("Sensor backend unreachable: {:#}", e);
                        } else {
                            tracing::debug!("Sensor backend still unreachable: {:#}", e);
                        }
                        state.record_current(None).await;
                    }
                }
            }
            _ = poll.tick() => {
                match fetch_history(&client, &config.source).await {
                    Ok(history) => {
                        state.record_history_fetch().await;
                        retrainer.ingest(history).await;
                    }
                    Err(e) => tracing::debug!("History fetch failed: {:#}", e),
                }
            }
            _ = retrain.tick() => {
                tracing::info!("Periodic forecast refresh");
                retrainer.retrain(Trigger::Timer).await;
            }
        }
    }
}
