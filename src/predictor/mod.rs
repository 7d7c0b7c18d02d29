//! # Predictor
//!
//! Wraps a [`TransitionModel`] and answers "what happens if I do this?":
//!
//! | Operation | Module | Description |
//! |-----------|--------|-------------|
//! | `predict` | here | one action, one step, with uncertainty and branching |
//! | `simulate` | `simulate` | multi-step trajectory with early termination |
//! | `simulate_multiple` | `simulate` | Monte Carlo spread of trajectories |
//! | `train_agent` | `simulate` | policy rollout harness |
//! | `reason` | `physics` | qualitative physical reasoning |
//!
//! All operations take `&self`. Counters are atomics and the transition
//! table sits behind a read-mostly lock, so one predictor can serve
//! concurrent callers.

pub mod transition;
pub mod simulate;
pub mod physics;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::latent::clamp_unit;
use crate::model::{vector_entropy, Action, ActionType, LatentState, PredictedState};
use crate::{Error, Result};

pub use transition::TransitionModel;
pub use simulate::{TrainingReport, MIN_TRAJECTORY_PROBABILITY, PERTURBATION_SPREAD};
pub use physics::{PhysicsAnswer, PhysicsObject, PhysicsQuery, PhysicsQueryType, Verdict};

// ============================================================================
// Configuration
// ============================================================================

/// Predictor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Latent vector length every input state must have.
    pub dimensions: usize,
    /// Above this, `UncertaintyHigh` fires and simulations stop.
    pub uncertainty_threshold: f64,
    /// Total branches per high-uncertainty prediction (the main one included).
    pub branching_factor: usize,
    /// Uncertainty above which alternatives are generated.
    pub branching_threshold: f64,
    /// Action types with registered transition parameters.
    pub action_types: Vec<ActionType>,
    /// Seed for Monte Carlo perturbation and training start states.
    pub seed: Option<u64>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            dimensions: 64,
            uncertainty_threshold: 0.7,
            branching_factor: 3,
            branching_threshold: 0.3,
            action_types: ActionType::ALL.to_vec(),
            seed: None,
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::InvalidConfig("dimensions must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.uncertainty_threshold) {
            return Err(Error::InvalidConfig(format!(
                "uncertainty_threshold {} outside [0, 1]",
                self.uncertainty_threshold
            )));
        }
        if self.branching_factor == 0 {
            return Err(Error::InvalidConfig("branching_factor must be >= 1".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events emitted by a predictor.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorEvent {
    /// Every successful single-step prediction.
    PredictionMade {
        action_type: ActionType,
        uncertainty: f64,
        source_id: String,
    },

    /// A prediction's uncertainty exceeded the configured threshold.
    UncertaintyHigh {
        action_type: ActionType,
        uncertainty: f64,
        threshold: f64,
    },

    /// A trajectory finished.
    SimulationCompleted {
        horizon: usize,
        requested_horizon: usize,
        total_probability: f64,
    },
}

// ============================================================================
// Metrics
// ============================================================================

/// Snapshot of predictor counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictorMetrics {
    pub predictions_made: u64,
    pub high_uncertainty: u64,
    pub simulations_run: u64,
    pub average_prediction_time: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    predictions: AtomicU64,
    high_uncertainty: AtomicU64,
    simulations: AtomicU64,
    prediction_nanos: AtomicU64,
}

// ============================================================================
// Predictor
// ============================================================================

/// Latent-space predictor. Owned by exactly one component (a host or a twin).
pub struct Predictor {
    config: PredictorConfig,
    model: RwLock<TransitionModel>,
    counters: Counters,
    rng: Mutex<StdRng>,
    event_tx: broadcast::Sender<PredictorEvent>,
}

impl Predictor {
    /// Create a predictor. Fails on an invalid configuration.
    pub fn new(config: PredictorConfig) -> Result<Self> {
        config.validate()?;
        let model = TransitionModel::new(config.dimensions, &config.action_types);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (event_tx, _) = broadcast::channel(1024);

        Ok(Self {
            config,
            model: RwLock::new(model),
            counters: Counters::default(),
            rng: Mutex::new(rng),
            event_tx,
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Subscribe to predictor events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PredictorEvent> {
        self.event_tx.subscribe()
    }

    /// Register (or reset) transition parameters for an action type.
    pub fn register_action_type(&self, action_type: ActionType) {
        self.model.write().register(action_type);
    }

    /// Remove transition parameters for an action type.
    pub fn unregister_action_type(&self, action_type: ActionType) -> bool {
        self.model.write().unregister(action_type)
    }

    pub fn supports(&self, action_type: ActionType) -> bool {
        self.model.read().is_registered(action_type)
    }

    pub fn metrics(&self) -> PredictorMetrics {
        let predictions = self.counters.predictions.load(Ordering::Relaxed);
        let nanos = self.counters.prediction_nanos.load(Ordering::Relaxed);
        PredictorMetrics {
            predictions_made: predictions,
            high_uncertainty: self.counters.high_uncertainty.load(Ordering::Relaxed),
            simulations_run: self.counters.simulations.load(Ordering::Relaxed),
            average_prediction_time: if predictions == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos(nanos / predictions)
            },
        }
    }

    /// Predict the state after applying `action` to `state`.
    ///
    /// Fails with [`Error::UnknownActionType`] when the action type has no
    /// registered transition parameters; nothing is counted or emitted then.
    pub fn predict(&self, state: &LatentState, action: &Action) -> Result<PredictedState> {
        let started = Instant::now();
        let now = Utc::now();

        let vector = self.model.read().apply(&state.vector, action)?;

        let uncertainty = transition::uncertainty(state, action.action_type(), now);
        let probability = 1.0 - uncertainty;

        let next = LatentState {
            entropy: vector_entropy(&vector),
            vector,
            source_modality: state.source_modality,
            source_id: format!("{}->{}", state.source_id, action.id()),
            timestamp: now,
            confidence: clamp_unit(state.confidence() * probability),
            features: state.features.clone(),
        };

        let alternative_states = if uncertainty > self.config.branching_threshold
            && self.config.branching_factor > 1
        {
            (1..self.config.branching_factor)
                .map(|branch| transition::branch_state(&next, branch))
                .collect()
        } else {
            Vec::new()
        };

        let prediction_time = started.elapsed();
        self.counters.predictions.fetch_add(1, Ordering::Relaxed);
        self.counters
            .prediction_nanos
            .fetch_add(prediction_time.as_nanos() as u64, Ordering::Relaxed);

        debug!(
            action_type = %action.action_type(),
            uncertainty,
            branches = alternative_states.len(),
            "Prediction made"
        );

        let _ = self.event_tx.send(PredictorEvent::PredictionMade {
            action_type: action.action_type(),
            uncertainty,
            source_id: next.source_id.clone(),
        });

        if uncertainty > self.config.uncertainty_threshold {
            self.counters.high_uncertainty.fetch_add(1, Ordering::Relaxed);
            let _ = self.event_tx.send(PredictorEvent::UncertaintyHigh {
                action_type: action.action_type(),
                uncertainty,
                threshold: self.config.uncertainty_threshold,
            });
        }

        Ok(PredictedState {
            state: next,
            action: action.clone(),
            probability,
            uncertainty,
            alternative_states,
            prediction_time,
        })
    }

    /// Answer a qualitative physics query.
    pub fn reason(&self, query: &PhysicsQuery) -> Result<PhysicsAnswer> {
        physics::reason(query)
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .finish()
    }
}
