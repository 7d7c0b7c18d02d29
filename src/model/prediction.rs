//! Prediction outputs: single transitions and trajectories.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Action, LatentState};

/// The result of applying one action to one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedState {
    pub state: LatentState,
    pub action: Action,
    /// `1 - uncertainty`.
    pub probability: f64,
    pub uncertainty: f64,
    /// Plausible alternatives, only populated when uncertainty is high
    /// enough to branch.
    pub alternative_states: Vec<LatentState>,
    pub prediction_time: Duration,
}

/// States produced by repeatedly applying actions from an initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub initial_state: LatentState,
    pub steps: Vec<PredictedState>,
    /// Product of every step's probability.
    pub total_probability: f64,
    /// Steps actually taken; can be below the requested horizon.
    pub horizon: usize,
    pub requested_horizon: usize,
    pub simulation_time: Duration,
}

/// Upper bound on the step storage reserved up front. Most trajectories
/// terminate long before a large requested horizon.
const PREALLOCATED_STEPS: usize = 64;

impl Trajectory {
    pub fn new(initial_state: LatentState, requested_horizon: usize) -> Self {
        Self {
            initial_state,
            steps: Vec::with_capacity(requested_horizon.min(PREALLOCATED_STEPS)),
            total_probability: 1.0,
            horizon: 0,
            requested_horizon,
            simulation_time: Duration::ZERO,
        }
    }

    /// Append a step and fold its probability into the running product.
    pub fn push(&mut self, step: PredictedState) {
        self.total_probability *= step.probability;
        self.steps.push(step);
        self.horizon = self.steps.len();
    }

    /// State after the last step, or the initial state for an empty trajectory.
    pub fn final_state(&self) -> &LatentState {
        self.steps.last().map(|s| &s.state).unwrap_or(&self.initial_state)
    }

    pub fn average_uncertainty(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.steps.iter().map(|s| s.uncertainty).sum::<f64>() / self.steps.len() as f64
    }

    /// True when a termination condition fired before the requested horizon.
    pub fn terminated_early(&self) -> bool {
        self.horizon < self.requested_horizon
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionType, Modality};
    use proptest::prelude::*;

    fn step(probability: f64) -> PredictedState {
        PredictedState {
            state: LatentState::new(vec![1.0, 0.0], Modality::State, "s"),
            action: Action::new(ActionType::Observe, "t"),
            probability,
            uncertainty: 1.0 - probability,
            alternative_states: Vec::new(),
            prediction_time: Duration::ZERO,
        }
    }

    #[test]
    fn test_empty_trajectory_final_state_is_initial() {
        let initial = LatentState::new(vec![0.0, 1.0], Modality::State, "init");
        let t = Trajectory::new(initial.clone(), 4);
        assert!(t.is_empty());
        assert_eq!(t.final_state(), &initial);
        assert!(t.terminated_early());
        assert_eq!(t.average_uncertainty(), 0.0);
    }

    #[test]
    fn test_huge_horizon_does_not_reserve_upfront() {
        let t = Trajectory::new(LatentState::zeros(2, "init"), usize::MAX);
        assert!(t.steps.capacity() <= PREALLOCATED_STEPS);
        assert_eq!(t.requested_horizon, usize::MAX);
    }

    proptest! {
        #[test]
        fn prop_total_probability_is_product(probs in prop::collection::vec(0.0f64..=1.0, 1..20)) {
            let mut t = Trajectory::new(LatentState::zeros(2, "init"), probs.len());
            let mut previous = t.total_probability;
            for p in &probs {
                t.push(step(*p));
                prop_assert!(t.total_probability <= previous);
                previous = t.total_probability;
            }
            let product: f64 = probs.iter().product();
            prop_assert!((t.total_probability - product).abs() < 1e-12);
            prop_assert!(!t.terminated_early());
        }
    }
}
