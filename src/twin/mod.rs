//! # Digital Twin
//!
//! A continuously synchronized latent replica of one real system.
//!
//! ## Sync cycle
//!
//! ```text
//! fetch ──► encode ──► drift(current, observed)
//!                         │
//!            ┌────────────┴────────────┐
//!       drift ≤ max_drift         drift > max_drift
//!       status = synced           status = drifting
//!       blend 0.3 → observed      blend 0.8 → observed (correction)
//!            └────────────┬────────────┘
//!                  append to history
//!                  verify predictions older than 2 × sync interval
//! ```
//!
//! ## Status machine
//!
//! `initializing → synced ⇄ drifting`, and `→ disconnected` from any state on
//! fetch failure or `stop_sync`. `start_sync` brings a disconnected twin
//! back.
//!
//! ## Concurrency
//!
//! Mutable state lives behind one `parking_lot::RwLock` that is never held
//! across an await. Sync cycles are serialized by an async cycle guard:
//! timer ticks skip when a cycle is already running, explicit `sync_now`
//! calls wait their turn. `predict` and `what_if` only read.

pub mod config;
pub mod source;
pub mod health;
pub mod consistency;
pub mod snapshot;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{cosine_similarity, Action, LatentState, Trajectory};
use crate::predictor::{Predictor, PredictorConfig};
use crate::{Error, Result};

pub use config::TwinConfig;
pub use source::{Encoder, RawObservation, StateFetcher, VectorEncoder};
pub use health::{DriftTrend, TwinHealth};
pub use consistency::{ConsistencyCheck, ConsistencyIssue, IssueKind, Severity};
pub use snapshot::TwinSnapshot;

/// Blend weight toward the observation while within tolerance.
pub const LIGHT_BLEND: f64 = 0.3;
/// Blend weight toward the observation when correcting drift.
pub const CORRECTION_BLEND: f64 = 0.8;

pub const HIGH_RISK: f64 = 0.7;
pub const LOW_CONFIDENCE: f64 = 0.3;
pub const UNCERTAIN_STEP: f64 = 0.5;

// ============================================================================
// Identifiers and status
// ============================================================================

/// Opaque twin identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwinId(pub Uuid);

impl TwinId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TwinId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TwinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwinStatus {
    Initializing,
    Synced,
    Drifting,
    Disconnected,
}

impl std::fmt::Display for TwinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TwinStatus::Initializing => write!(f, "initializing"),
            TwinStatus::Synced => write!(f, "synced"),
            TwinStatus::Drifting => write!(f, "drifting"),
            TwinStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events emitted by a twin.
#[derive(Debug, Clone, PartialEq)]
pub enum TwinEvent {
    /// A sync cycle completed.
    Synced { twin_id: TwinId, drift: f64, status: TwinStatus },

    /// Measured drift exceeded `max_drift`.
    DriftDetected { twin_id: TwinId, drift: f64, max_drift: f64 },

    /// Heavy blend applied after drift detection.
    DriftCorrected { twin_id: TwinId, before: f64, after: f64 },

    StatusChanged { twin_id: TwinId, old_status: TwinStatus, new_status: TwinStatus },

    /// A logged prediction was matched against an observed state.
    PredictionVerified { twin_id: TwinId, prediction_id: Uuid, similarity: f64 },

    SnapshotTaken { twin_id: TwinId, snapshot_id: Uuid },

    SnapshotRestored { twin_id: TwinId, snapshot_id: Uuid },

    /// Operational failure on the sync path.
    Error { twin_id: TwinId, message: String },
}

// ============================================================================
// Bookkeeping types
// ============================================================================

/// A forecast awaiting (or holding) retroactive verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub made_at: DateTime<Utc>,
    pub horizon: usize,
    pub predicted: LatentState,
    pub actual: Option<LatentState>,
    /// Cosine similarity between `predicted` and `actual`, once verified.
    pub similarity: Option<f64>,
}

impl PredictionRecord {
    pub fn is_verified(&self) -> bool {
        self.actual.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinMetrics {
    pub sync_count: u64,
    pub failed_syncs: u64,
    pub skipped_syncs: u64,
    pub corrections: u64,
    /// Incremental mean of measured drift across successful syncs.
    pub average_drift: f64,
    pub max_drift: f64,
    pub predictions_made: u64,
    pub predictions_verified: u64,
    pub what_if_count: u64,
    pub last_sync_duration: Option<Duration>,
}

/// What one sync cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Within tolerance; light blend applied.
    Synced { drift: f64 },
    /// Drift exceeded tolerance; correction applied. `residual` is the drift
    /// left after correcting.
    Corrected { drift: f64, residual: f64 },
    /// Fetch or encode failed; the twin is now disconnected.
    Failed { reason: String },
    /// A timer tick found another cycle running.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfResult {
    pub trajectory: Trajectory,
    pub risk_score: f64,
    pub final_drift: f64,
    pub warnings: Vec<String>,
}

// ============================================================================
// DigitalTwin
// ============================================================================

struct TwinState {
    current: LatentState,
    status: TwinStatus,
    last_sync: Option<DateTime<Utc>>,
    sync_drift: f64,
    history: VecDeque<LatentState>,
    predictions: VecDeque<PredictionRecord>,
    metrics: TwinMetrics,
    fetcher: Option<Arc<dyn StateFetcher>>,
}

struct SyncTimer {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Latent replica of one real system.
pub struct DigitalTwin {
    id: TwinId,
    name: String,
    real_system_id: String,
    config: TwinConfig,
    predictor: Predictor,
    encoder: Arc<dyn Encoder>,
    state: RwLock<TwinState>,
    cycle: tokio::sync::Mutex<()>,
    timer: Mutex<Option<SyncTimer>>,
    event_tx: broadcast::Sender<TwinEvent>,
}

impl DigitalTwin {
    /// Create a twin using the reference [`VectorEncoder`].
    pub fn new(real_system_id: impl Into<String>, name: impl Into<String>, config: TwinConfig) -> Result<Self> {
        let encoder = Arc::new(VectorEncoder::new(config.dimensions));
        Self::with_encoder(real_system_id, name, config, encoder)
    }

    /// Create a twin with a custom encoder.
    pub fn with_encoder(
        real_system_id: impl Into<String>,
        name: impl Into<String>,
        config: TwinConfig,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self> {
        config.validate()?;
        if encoder.dimensions() != config.dimensions {
            return Err(Error::DimensionMismatch {
                expected: config.dimensions,
                got: encoder.dimensions(),
            });
        }

        let predictor = Predictor::new(PredictorConfig {
            dimensions: config.dimensions,
            branching_factor: config.branching_factor,
            uncertainty_threshold: config.uncertainty_threshold,
            ..PredictorConfig::default()
        })?;

        let id = TwinId::new();
        let real_system_id = real_system_id.into();
        let (event_tx, _) = broadcast::channel(1024);

        Ok(Self {
            id,
            name: name.into(),
            state: RwLock::new(TwinState {
                current: LatentState::zeros(config.dimensions, real_system_id.clone()),
                status: TwinStatus::Initializing,
                last_sync: None,
                sync_drift: 0.0,
                history: VecDeque::with_capacity(config.history_limit.min(1024)),
                predictions: VecDeque::new(),
                metrics: TwinMetrics::default(),
                fetcher: None,
            }),
            real_system_id,
            config,
            predictor,
            encoder,
            cycle: tokio::sync::Mutex::new(()),
            timer: Mutex::new(None),
            event_tx,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &TwinId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn real_system_id(&self) -> &str { &self.real_system_id }
    pub fn config(&self) -> &TwinConfig { &self.config }

    /// The predictor this twin forecasts with.
    pub fn predictor(&self) -> &Predictor { &self.predictor }

    pub fn status(&self) -> TwinStatus { self.state.read().status }
    pub fn current_state(&self) -> LatentState { self.state.read().current.clone() }
    pub fn last_sync(&self) -> Option<DateTime<Utc>> { self.state.read().last_sync }

    /// Drift left between the twin and the latest observation.
    pub fn sync_drift(&self) -> f64 { self.state.read().sync_drift }

    /// History, oldest first.
    pub fn history(&self) -> Vec<LatentState> {
        self.state.read().history.iter().cloned().collect()
    }

    /// Logged predictions, oldest first.
    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.state.read().predictions.iter().cloned().collect()
    }

    pub fn get_metrics(&self) -> TwinMetrics {
        self.state.read().metrics.clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Subscribe to twin events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<TwinEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: TwinEvent) {
        let _ = self.event_tx.send(event);
    }

    // ========================================================================
    // Sync lifecycle
    // ========================================================================

    /// Attach `fetcher`, run one sync immediately, then keep syncing every
    /// `sync_interval_ms` on a background task.
    ///
    /// A failing first sync does not prevent the timer from being armed;
    /// the returned outcome reports it. If `stop_sync` (or another
    /// `start_sync`) replaces the fetcher while the first sync is in flight,
    /// no timer is armed for this call.
    #[instrument(skip(self, fetcher), fields(twin_id = %self.id))]
    pub async fn start_sync(self: &Arc<Self>, fetcher: Arc<dyn StateFetcher>) -> Result<SyncOutcome> {
        self.stop_timer();
        self.state.write().fetcher = Some(Arc::clone(&fetcher));
        info!(interval_ms = self.config.sync_interval_ms, "Starting twin sync");

        let outcome = self.sync_now().await?;

        // Checked under the timer lock; stop_sync clears the fetcher before
        // taking it, so a concurrent stop either prevents arming here or
        // finds the armed timer.
        let mut timer = self.timer.lock();
        let attached = self
            .state
            .read()
            .fetcher
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &fetcher));
        if !attached {
            debug!("Sync stopped during the first cycle; timer not armed");
            return Ok(outcome);
        }

        if let Some(previous) = timer.take() {
            let _ = previous.stop_tx.send(true);
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(sync_loop(Arc::downgrade(self), self.config.sync_interval(), stop_rx));
        *timer = Some(SyncTimer { stop_tx, task });

        Ok(outcome)
    }

    /// Stop future timer firings and mark the twin disconnected.
    ///
    /// A cycle already in flight runs to completion but no longer changes
    /// the status.
    #[instrument(skip(self), fields(twin_id = %self.id))]
    pub fn stop_sync(&self) {
        let changed = {
            let mut st = self.state.write();
            st.fetcher = None;
            let old = st.status;
            st.status = TwinStatus::Disconnected;
            (old != TwinStatus::Disconnected).then_some(old)
        };
        self.stop_timer();
        if let Some(old_status) = changed {
            self.emit(TwinEvent::StatusChanged {
                twin_id: self.id,
                old_status,
                new_status: TwinStatus::Disconnected,
            });
        }
        info!("Stopped twin sync");
    }

    fn stop_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            let _ = timer.stop_tx.send(true);
            drop(timer.task);
        }
    }

    /// Run one sync cycle now, waiting for any cycle in flight to finish.
    ///
    /// Fails only when no fetcher is attached. Fetch and encode failures
    /// come back as [`SyncOutcome::Failed`].
    #[instrument(skip(self), fields(twin_id = %self.id))]
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let _guard = self.cycle.lock().await;
        self.run_cycle().await
    }

    /// Timer entry point: skip instead of queueing behind a running cycle.
    async fn tick(&self) {
        let Ok(_guard) = self.cycle.try_lock() else {
            self.state.write().metrics.skipped_syncs += 1;
            debug!(twin_id = %self.id, "Sync tick skipped: previous cycle still running");
            return;
        };
        if let Err(e) = self.run_cycle().await {
            debug!(twin_id = %self.id, error = %e, "Sync tick without fetcher");
        }
    }

    async fn run_cycle(&self) -> Result<SyncOutcome> {
        let fetcher = self
            .state
            .read()
            .fetcher
            .clone()
            .ok_or_else(|| Error::NotConnected(format!("twin {} has no state fetcher", self.id)))?;

        let started = Instant::now();
        match self.fetch_and_encode(fetcher.as_ref()).await {
            Ok(observed) => Ok(self.apply_observation(observed, started.elapsed())),
            Err(e) => Ok(self.record_failure(e)),
        }
    }

    async fn fetch_and_encode(&self, fetcher: &dyn StateFetcher) -> Result<LatentState> {
        let timeout = self.config.fetch_timeout();
        let raw = tokio::time::timeout(timeout, fetcher.fetch())
            .await
            .map_err(|_| Error::FetchTimeout(timeout))??;
        self.encoder.encode(&raw)
    }

    fn record_failure(&self, error: Error) -> SyncOutcome {
        warn!(twin_id = %self.id, error = %error, "Sync failed");
        let old = {
            let mut st = self.state.write();
            st.metrics.failed_syncs += 1;
            let old = st.status;
            st.status = TwinStatus::Disconnected;
            old
        };

        if old != TwinStatus::Disconnected {
            self.emit(TwinEvent::StatusChanged {
                twin_id: self.id,
                old_status: old,
                new_status: TwinStatus::Disconnected,
            });
        }
        let message = error.to_string();
        self.emit(TwinEvent::Error { twin_id: self.id, message: message.clone() });
        SyncOutcome::Failed { reason: message }
    }

    fn apply_observation(&self, observed: LatentState, elapsed: Duration) -> SyncOutcome {
        let now = Utc::now();
        let mut events = Vec::new();

        let outcome = {
            let mut st = self.state.write();
            let drift = st.current.drift_to(&observed);

            let m = &mut st.metrics;
            m.sync_count += 1;
            m.average_drift += (drift - m.average_drift) / m.sync_count as f64;
            m.max_drift = m.max_drift.max(drift);
            m.last_sync_duration = Some(elapsed);

            let drifting = drift > self.config.max_drift;
            let weight = if drifting { CORRECTION_BLEND } else { LIGHT_BLEND };
            let mut next = st.current.blend(&observed, weight);
            next.timestamp = now;
            let residual = next.drift_to(&observed);

            let outcome = if drifting {
                warn!(twin_id = %self.id, drift, max_drift = self.config.max_drift, "Drift detected");
                st.metrics.corrections += 1;
                events.push(TwinEvent::DriftDetected {
                    twin_id: self.id,
                    drift,
                    max_drift: self.config.max_drift,
                });
                events.push(TwinEvent::DriftCorrected { twin_id: self.id, before: drift, after: residual });
                SyncOutcome::Corrected { drift, residual }
            } else {
                SyncOutcome::Synced { drift }
            };

            // A stopped twin keeps the observation but stays disconnected.
            let new_status = if st.fetcher.is_none() {
                st.status
            } else if drifting {
                TwinStatus::Drifting
            } else {
                TwinStatus::Synced
            };
            if new_status != st.status {
                info!(twin_id = %self.id, old = %st.status, new = %new_status, "Twin status changed");
                events.push(TwinEvent::StatusChanged {
                    twin_id: self.id,
                    old_status: st.status,
                    new_status,
                });
                st.status = new_status;
            }

            st.current = next.clone();
            st.sync_drift = residual;
            st.last_sync = Some(now);

            if st.history.len() >= self.config.history_limit {
                st.history.pop_front();
            }
            st.history.push_back(next);

            let verified = verify_predictions(&mut st.predictions, &observed, now, self.config.verification_age());
            st.metrics.predictions_verified += verified.len() as u64;
            events.extend(verified.into_iter().map(|(prediction_id, similarity)| {
                TwinEvent::PredictionVerified { twin_id: self.id, prediction_id, similarity }
            }));

            events.push(TwinEvent::Synced { twin_id: self.id, drift, status: st.status });
            debug!(twin_id = %self.id, drift, residual, status = %st.status, "Sync cycle complete");
            outcome
        };

        for event in events {
            self.emit(event);
        }
        outcome
    }

    // ========================================================================
    // Forecasting
    // ========================================================================

    /// Simulate `actions` from the current state and log the final state for
    /// later verification.
    #[instrument(skip(self, actions), fields(twin_id = %self.id, actions = actions.len()))]
    pub fn predict(&self, actions: &[Action], horizon: usize) -> Result<Trajectory> {
        let current = self.current_state();
        let trajectory = self.predictor.simulate(&current, actions, horizon)?;

        let record = PredictionRecord {
            id: Uuid::new_v4(),
            made_at: Utc::now(),
            horizon: trajectory.horizon,
            predicted: trajectory.final_state().clone(),
            actual: None,
            similarity: None,
        };

        let mut st = self.state.write();
        if st.predictions.len() >= self.config.prediction_log_limit {
            st.predictions.pop_front();
        }
        st.predictions.push_back(record);
        st.metrics.predictions_made += 1;

        Ok(trajectory)
    }

    /// Forecast over the configured default horizon.
    pub fn forecast(&self, actions: &[Action]) -> Result<Trajectory> {
        self.predict(actions, self.config.prediction_horizon)
    }

    /// Simulate `actions` once each and score the outcome's risk.
    ///
    /// Risk = 0.3 × mean action risk + 0.4 × mean step uncertainty
    /// + 0.3 × drift between the current and final state.
    #[instrument(skip(self, actions), fields(twin_id = %self.id, actions = actions.len()))]
    pub fn what_if(&self, actions: &[Action]) -> Result<WhatIfResult> {
        let current = self.current_state();
        let trajectory = self.predictor.simulate(&current, actions, actions.len())?;

        let action_risk =
            actions.iter().map(|a| a.action_type().risk()).sum::<f64>() / actions.len() as f64;
        let final_drift = current.drift_to(trajectory.final_state());
        let risk_score =
            (0.3 * action_risk + 0.4 * trajectory.average_uncertainty() + 0.3 * final_drift).clamp(0.0, 1.0);

        let mut warnings = Vec::new();
        if risk_score > HIGH_RISK {
            warnings.push(format!("high risk ({risk_score:.2})"));
        }
        if trajectory.total_probability < LOW_CONFIDENCE {
            warnings.push(format!("low confidence (p = {:.3})", trajectory.total_probability));
        }
        let uncertain = trajectory.steps.iter().filter(|s| s.uncertainty > UNCERTAIN_STEP).count();
        if uncertain * 2 > trajectory.steps.len() {
            warnings.push(format!("many uncertain steps ({uncertain}/{})", trajectory.steps.len()));
        }
        if trajectory.terminated_early() {
            warnings.push(format!(
                "terminated early after {} of {} steps",
                trajectory.horizon, trajectory.requested_horizon
            ));
        }

        self.state.write().metrics.what_if_count += 1;
        debug!(risk_score, warnings = warnings.len(), "What-if evaluated");

        Ok(WhatIfResult { trajectory, risk_score, final_drift, warnings })
    }

    // ========================================================================
    // Health & consistency
    // ========================================================================

    #[instrument(skip(self), fields(twin_id = %self.id))]
    pub fn get_health(&self) -> TwinHealth {
        let st = self.state.read();
        health::assess(health::HealthInputs {
            twin_id: self.id,
            status: st.status,
            sync_drift: st.sync_drift,
            max_drift: self.config.max_drift,
            last_sync: st.last_sync,
            history: st.history.iter().collect(),
            predictions: st.predictions.iter().collect(),
        })
    }

    #[instrument(skip(self), fields(twin_id = %self.id))]
    pub fn check_consistency(&self) -> ConsistencyCheck {
        let st = self.state.read();
        let history: Vec<&LatentState> = st.history.iter().collect();
        let predictions: Vec<&PredictionRecord> = st.predictions.iter().collect();
        consistency::check(self.id, st.status, &history, &predictions)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    #[instrument(skip(self, metadata), fields(twin_id = %self.id))]
    pub fn take_snapshot(&self, metadata: HashMap<String, serde_json::Value>) -> TwinSnapshot {
        let snapshot = {
            let st = self.state.read();
            TwinSnapshot::capture(self.id, st.current.clone(), st.sync_drift, st.status, metadata)
        };
        debug!(twin_id = %self.id, snapshot_id = %snapshot.id(), "Snapshot taken");
        self.emit(TwinEvent::SnapshotTaken { twin_id: self.id, snapshot_id: snapshot.id() });
        snapshot
    }

    /// Roll the twin back to `snapshot`.
    ///
    /// The restored state is re-stamped to now; history is left untouched.
    #[instrument(skip(self, snapshot), fields(twin_id = %self.id, snapshot_id = %snapshot.id()))]
    pub fn restore_snapshot(&self, snapshot: &TwinSnapshot) -> Result<()> {
        if snapshot.twin_id() != &self.id {
            return Err(Error::SnapshotMismatch {
                snapshot_twin: *snapshot.twin_id(),
                target_twin: self.id,
            });
        }

        {
            let mut st = self.state.write();
            st.current = snapshot.state().clone().with_timestamp(Utc::now());
            st.sync_drift = snapshot.drift();
        }

        info!(twin_id = %self.id, snapshot_id = %snapshot.id(), "Snapshot restored");
        self.emit(TwinEvent::SnapshotRestored { twin_id: self.id, snapshot_id: snapshot.id() });
        Ok(())
    }
}

impl Drop for DigitalTwin {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl std::fmt::Debug for DigitalTwin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("real_system_id", &self.real_system_id)
            .field("status", &self.status())
            .finish()
    }
}

/// Attach `observed` as the outcome of every unverified prediction at least
/// `min_age` old. Returns `(prediction id, similarity)` per verification.
fn verify_predictions(
    records: &mut VecDeque<PredictionRecord>,
    observed: &LatentState,
    now: DateTime<Utc>,
    min_age: Duration,
) -> Vec<(Uuid, f64)> {
    let Ok(min_age) = chrono::Duration::from_std(min_age) else {
        return Vec::new();
    };
    records
        .iter_mut()
        .filter(|r| r.actual.is_none() && now - r.made_at >= min_age)
        .map(|r| {
            let similarity = cosine_similarity(&r.predicted.vector, &observed.vector);
            r.actual = Some(observed.clone());
            r.similarity = Some(similarity);
            (r.id, similarity)
        })
        .collect()
}

async fn sync_loop(twin: Weak<DigitalTwin>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; start_sync already synced.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        let Some(strong) = twin.upgrade() else { break };
        strong.tick().await;
    }
}
