//! # Transition Model
//!
//! Per-action-type linear map from one latent vector to the next.
//!
//! ```text
//! next = normalize( M[type] · v  +  0.1 · embed(action) )
//! ```
//!
//! Each `M[type]` is near-identity: `0.9` on the diagonal plus a single
//! `0.1` perturbation per row at a column offset unique to the action type.
//! The weights are a fixed, inspectable placeholder; learning them is out
//! of scope for this crate.
//!
//! Uncertainty is a weighted sum of four signals in [0, 1]:
//!
//! | Signal | Weight |
//! |--------|--------|
//! | `1 - state.confidence` | 0.3 |
//! | per-type base uncertainty | 0.3 |
//! | `state.entropy` | 0.2 |
//! | age decay `1 - exp(-age / 60s)` | 0.2 |

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::latent::clamp_unit;
use crate::model::{normalize, Action, ActionType, LatentState, ParamValue};
use crate::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Diagonal dominance of every transition matrix.
pub const DIAGONAL_WEIGHT: f64 = 0.9;

/// Magnitude of the single off-diagonal entry per row.
pub const PERTURBATION_WEIGHT: f64 = 0.1;

/// Contribution of the action embedding to the next vector.
pub const ACTION_EMBEDDING_WEIGHT: f64 = 0.1;

pub const W_CONFIDENCE: f64 = 0.3;
pub const W_ACTION: f64 = 0.3;
pub const W_ENTROPY: f64 = 0.2;
pub const W_AGE: f64 = 0.2;

/// Time constant of the age-decay term.
pub const AGE_SCALE_SECS: f64 = 60.0;

/// Noise amplitude added to alternative branches.
pub const BRANCH_NOISE_SCALE: f64 = 0.1;

/// Confidence multiplier applied to alternative branches.
pub const BRANCH_CONFIDENCE_DECAY: f64 = 0.7;

// ============================================================================
// Transition parameters
// ============================================================================

/// Dense square matrix for one action type, row-major.
#[derive(Debug, Clone)]
pub struct TransitionParams {
    dimensions: usize,
    matrix: Vec<f64>,
}

impl TransitionParams {
    /// Near-identity matrix with the perturbation placed `offset` columns
    /// right of the diagonal (wrapping).
    pub fn near_identity(dimensions: usize, offset: usize) -> Self {
        let mut matrix = vec![0.0; dimensions * dimensions];
        for row in 0..dimensions {
            matrix[row * dimensions + row] += DIAGONAL_WEIGHT;
            let col = (row + offset) % dimensions;
            matrix[row * dimensions + col] += PERTURBATION_WEIGHT;
        }
        Self { dimensions, matrix }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[row * self.dimensions + col]
    }

    /// Matrix-vector product. `v` must have `dimensions` entries.
    pub fn apply(&self, v: &[f64]) -> Vec<f64> {
        self.matrix
            .chunks_exact(self.dimensions.max(1))
            .take(self.dimensions)
            .map(|row| row.iter().zip(v).map(|(m, x)| m * x).sum())
            .collect()
    }
}

// ============================================================================
// TransitionModel
// ============================================================================

/// Registry of transition parameters keyed by action type.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    dimensions: usize,
    params: HashMap<ActionType, TransitionParams>,
}

impl TransitionModel {
    /// Model with parameters registered for the given action types.
    pub fn new(dimensions: usize, action_types: &[ActionType]) -> Self {
        let mut model = Self { dimensions, params: HashMap::new() };
        for ty in action_types {
            model.register(*ty);
        }
        model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// (Re)initialize the parameters for `action_type`.
    pub fn register(&mut self, action_type: ActionType) {
        let offset = action_type.index() + 1;
        self.params
            .insert(action_type, TransitionParams::near_identity(self.dimensions, offset));
    }

    /// Drop the parameters for `action_type`. Returns true if they existed.
    pub fn unregister(&mut self, action_type: ActionType) -> bool {
        self.params.remove(&action_type).is_some()
    }

    pub fn is_registered(&self, action_type: ActionType) -> bool {
        self.params.contains_key(&action_type)
    }

    pub fn params(&self, action_type: ActionType) -> Option<&TransitionParams> {
        self.params.get(&action_type)
    }

    /// Compute the next unit vector for `vector` under `action`.
    pub fn apply(&self, vector: &[f64], action: &Action) -> Result<Vec<f64>> {
        let params = self
            .params
            .get(&action.action_type())
            .ok_or(Error::UnknownActionType(action.action_type()))?;

        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        let embedding = action_embedding(self.dimensions, action);
        let mixed: Vec<f64> = params
            .apply(vector)
            .into_iter()
            .zip(&embedding)
            .map(|(x, e)| x + ACTION_EMBEDDING_WEIGHT * e)
            .collect();

        Ok(normalize(&mixed))
    }
}

// ============================================================================
// Action embedding
// ============================================================================

/// Deterministic unit-norm embedding of an action.
///
/// The base pattern is a sine wave whose frequency depends on the action
/// type. Numeric parameters add `tanh(value)` and string parameters add a
/// hashed fraction at a slot chosen by hashing the parameter name. Boolean
/// parameters do not contribute.
pub fn action_embedding(dimensions: usize, action: &Action) -> Vec<f64> {
    if dimensions == 0 {
        return Vec::new();
    }
    let freq = (action.action_type().index() + 1) as f64;
    let mut e: Vec<f64> = (0..dimensions)
        .map(|i| ((i + 1) as f64 * freq * 0.1).sin())
        .collect();

    for (key, value) in action.parameters() {
        let slot = (hash_str(key) % dimensions as u64) as usize;
        match value {
            ParamValue::Number(n) => e[slot] += n.tanh(),
            ParamValue::String(s) => e[slot] += (hash_str(s) % 1000) as f64 / 1000.0,
            ParamValue::Bool(_) => {}
        }
    }

    normalize(&e)
}

/// djb2-style string hash; stable across runs and platforms.
fn hash_str(s: &str) -> u64 {
    s.bytes()
        .fold(5381u64, |h, b| h.wrapping_mul(33) ^ u64::from(b))
}

// ============================================================================
// Uncertainty
// ============================================================================

/// Weighted uncertainty of applying `action_type` to `state` at `now`.
pub fn uncertainty(state: &LatentState, action_type: ActionType, now: DateTime<Utc>) -> f64 {
    let age_decay = 1.0 - (-state.age_secs(now) / AGE_SCALE_SECS).exp();
    clamp_unit(
        W_CONFIDENCE * (1.0 - state.confidence())
            + W_ACTION * action_type.base_uncertainty()
            + W_ENTROPY * state.entropy()
            + W_AGE * age_decay,
    )
}

// ============================================================================
// Branch noise
// ============================================================================

/// Deterministic pseudo-random value in [-1, 1) for `(branch, index)`.
///
/// Sine-hash: the same pair always yields the same value, so branches are
/// reproducible.
pub fn branch_noise(branch: usize, index: usize) -> f64 {
    let x = ((branch + 1) as f64 * 12.9898 + (index + 1) as f64 * 78.233).sin() * 43758.5453;
    (x - x.floor()) * 2.0 - 1.0
}

/// Alternative next-state for `branch`: noise added, renormalized, confidence decayed.
pub fn branch_state(predicted: &LatentState, branch: usize) -> LatentState {
    let noisy: Vec<f64> = predicted
        .vector
        .iter()
        .enumerate()
        .map(|(i, x)| x + BRANCH_NOISE_SCALE * branch_noise(branch, i))
        .collect();

    let mut alt = predicted.clone();
    alt.vector = normalize(&noisy);
    alt.confidence = clamp_unit(predicted.confidence() * BRANCH_CONFIDENCE_DECAY);
    alt.source_id = format!("{}#branch{}", predicted.source_id, branch);
    alt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{norm, Modality};

    #[test]
    fn test_near_identity_shape() {
        let p = TransitionParams::near_identity(4, 2);
        assert_eq!(p.get(0, 0), DIAGONAL_WEIGHT);
        assert_eq!(p.get(0, 2), PERTURBATION_WEIGHT);
        assert_eq!(p.get(3, 1), PERTURBATION_WEIGHT);
        assert_eq!(p.get(0, 1), 0.0);
    }

    #[test]
    fn test_offsets_unique_per_type() {
        let model = TransitionModel::new(16, &ActionType::ALL);
        for ty in ActionType::ALL {
            let p = model.params(ty).unwrap();
            let col = ty.index() + 1;
            assert_eq!(p.get(0, col), PERTURBATION_WEIGHT, "{ty}");
        }
    }

    #[test]
    fn test_apply_is_unit_norm() {
        let model = TransitionModel::new(8, &ActionType::ALL);
        let action = Action::new(ActionType::Execute, "a").with_param("force", 3.0);
        let next = model.apply(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], &action).unwrap();
        assert!((norm(&next) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_unregistered_fails() {
        let mut model = TransitionModel::new(4, &ActionType::ALL);
        assert!(model.unregister(ActionType::Delete));
        let action = Action::new(ActionType::Delete, "a");
        let err = model.apply(&[1.0, 0.0, 0.0, 0.0], &action).unwrap_err();
        assert!(matches!(err, Error::UnknownActionType(ActionType::Delete)));
    }

    #[test]
    fn test_apply_dimension_mismatch() {
        let model = TransitionModel::new(4, &ActionType::ALL);
        let action = Action::new(ActionType::Observe, "a");
        let err = model.apply(&[1.0, 0.0], &action).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, got: 2 }));
    }

    #[test]
    fn test_embedding_deterministic_and_param_sensitive() {
        let a = Action::new(ActionType::Navigate, "a").with_param("x", 1.0);
        let b = Action::new(ActionType::Navigate, "b").with_param("x", 1.0);
        let c = Action::new(ActionType::Navigate, "a").with_param("x", -1.0);
        assert_eq!(action_embedding(16, &a), action_embedding(16, &b));
        assert_ne!(action_embedding(16, &a), action_embedding(16, &c));
    }

    #[test]
    fn test_bool_params_ignored() {
        let a = Action::new(ActionType::Query, "a");
        let b = Action::new(ActionType::Query, "a").with_param("dry_run", true);
        assert_eq!(action_embedding(8, &a), action_embedding(8, &b));
    }

    #[test]
    fn test_uncertainty_weights() {
        let now = Utc::now();
        let state = LatentState::new(vec![1.0, 0.0], Modality::State, "s")
            .with_confidence(1.0)
            .with_entropy(0.0)
            .with_timestamp(now);
        let u = uncertainty(&state, ActionType::Observe, now);
        assert!((u - 0.03).abs() < 1e-9);

        let worst = LatentState::new(vec![1.0, 0.0], Modality::State, "s")
            .with_confidence(0.0)
            .with_entropy(1.0)
            .with_timestamp(now - chrono::Duration::hours(1));
        assert!(uncertainty(&worst, ActionType::Delete, now) > 0.9);
    }

    #[test]
    fn test_branch_noise_reproducible_and_bounded() {
        for b in 0..4 {
            for i in 0..64 {
                let n = branch_noise(b, i);
                assert_eq!(n, branch_noise(b, i));
                assert!((-1.0..1.0).contains(&n));
            }
        }
        assert_ne!(branch_noise(0, 3), branch_noise(1, 3));
    }
}
