//! # latent-twin: Latent World Model and Digital Twins
//!
//! Maintains a compressed vector ("latent") model of an external system,
//! predicts how it evolves under actions, and keeps a synchronized replica
//! consistent with the real system despite noisy or delayed observations.
//!
//! ## Design Principles
//!
//! 1. **Pure model layer**: `LatentState`, `Action`, `Trajectory` are plain DTOs
//! 2. **Trait-first collaborators**: `StateFetcher` and `Encoder` are the only
//!    contact points with the real system
//! 3. **Anomalies are data**: drift, low accuracy and inconsistencies land in
//!    health and consistency reports; only setup mistakes are errors
//! 4. **One predictor per owner**: each twin owns its predictor outright
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use latent_twin::{Action, ActionType, DigitalTwinManager, TwinConfig, StateFetcher, RawObservation};
//!
//! struct Sensor;
//!
//! #[async_trait::async_trait]
//! impl StateFetcher for Sensor {
//!     async fn fetch(&self) -> latent_twin::Result<RawObservation> {
//!         Ok(RawObservation::new("pump-7", serde_json::json!({ "vector": [0.1, 0.9, 0.3] })))
//!     }
//! }
//!
//! # async fn example() -> latent_twin::Result<()> {
//! let manager = DigitalTwinManager::new();
//! let twin = manager.create_twin("pump-7", "Pump 7", TwinConfig::default())?;
//! twin.start_sync(Arc::new(Sensor)).await?;
//!
//! let plan = vec![Action::new(ActionType::Execute, "operator").with_param("rpm", 1200.0)];
//! let outcome = twin.what_if(&plan)?;
//! println!("risk {:.2}: {:?}", outcome.risk_score, outcome.warnings);
//!
//! manager.remove_twin(twin.id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Subsystems
//!
//! | Subsystem | Module | Description |
//! |-----------|--------|-------------|
//! | Model | `model` | latent states, actions, trajectories, vector math |
//! | Predictor | `predictor` | transitions, simulation, Monte Carlo, physics heuristics |
//! | Twin | `twin` | sync/drift loop, health, consistency, snapshots |
//! | Manager | `manager` | registry over many twins |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod predictor;
pub mod twin;
pub mod manager;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Action, ActionType, ActionParams, ParamValue,
    LatentState, LatentFeature, Modality,
    PredictedState, Trajectory,
};

// ============================================================================
// Re-exports: Predictor
// ============================================================================

pub use predictor::{
    Predictor, PredictorConfig, PredictorEvent, PredictorMetrics, TransitionModel,
    PhysicsAnswer, PhysicsObject, PhysicsQuery, PhysicsQueryType, Verdict,
    TrainingReport,
};

// ============================================================================
// Re-exports: Twin + Manager
// ============================================================================

pub use twin::{
    DigitalTwin, TwinId, TwinStatus, TwinConfig, TwinEvent, TwinMetrics,
    SyncOutcome, WhatIfResult, PredictionRecord,
    StateFetcher, Encoder, VectorEncoder, RawObservation,
    TwinHealth, DriftTrend,
    ConsistencyCheck, ConsistencyIssue, IssueKind, Severity,
    TwinSnapshot,
};
pub use manager::{DigitalTwinManager, FleetHealth};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No transition parameters registered for action type '{0}'")]
    UnknownActionType(ActionType),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(std::time::Duration),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Snapshot belongs to twin {snapshot_twin}, cannot restore onto {target_twin}")]
    SnapshotMismatch { snapshot_twin: TwinId, target_twin: TwinId },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that indicate a setup or contract mistake rather than
    /// a transient condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownActionType(_)
                | Error::DimensionMismatch { .. }
                | Error::InvalidConfig(_)
                | Error::InvalidInput(_)
                | Error::NotConnected(_)
                | Error::SnapshotMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
