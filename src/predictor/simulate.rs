//! Multi-step simulation, Monte Carlo spread and policy rollouts.

use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Action, LatentState, Trajectory};
use crate::{Error, Result};

use super::{Predictor, PredictorEvent};

/// A trajectory stops once its cumulative probability drops below this.
pub const MIN_TRAJECTORY_PROBABILITY: f64 = 0.01;

/// Per-dimension uniform perturbation applied to Monte Carlo start states.
pub const PERTURBATION_SPREAD: f64 = 0.05;

/// Outcome of [`Predictor::train_agent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub agent: String,
    pub episodes: usize,
    pub average_reward: f64,
    pub best_reward: f64,
    pub best_trajectory: Option<Trajectory>,
}

impl Predictor {
    /// Apply `actions` (cycled) from `initial` for up to `horizon` steps.
    ///
    /// Stops early when a step's uncertainty exceeds the configured
    /// threshold or the cumulative probability falls below
    /// [`MIN_TRAJECTORY_PROBABILITY`]. The step that triggers termination is
    /// kept in the trajectory.
    pub fn simulate(
        &self,
        initial: &LatentState,
        actions: &[Action],
        horizon: usize,
    ) -> Result<Trajectory> {
        if actions.is_empty() {
            return Err(Error::InvalidInput("simulate requires at least one action".into()));
        }

        let started = Instant::now();
        let mut trajectory = Trajectory::new(initial.clone(), horizon);
        let mut current = initial.clone();

        for step in 0..horizon {
            let action = &actions[step % actions.len()];
            let predicted = self.predict(&current, action)?;
            let uncertainty = predicted.uncertainty;
            current = predicted.state.clone();
            trajectory.push(predicted);

            if uncertainty > self.config.uncertainty_threshold {
                debug!(step, uncertainty, "Simulation stopped: uncertainty above threshold");
                break;
            }
            if trajectory.total_probability < MIN_TRAJECTORY_PROBABILITY {
                debug!(
                    step,
                    total_probability = trajectory.total_probability,
                    "Simulation stopped: trajectory probability exhausted"
                );
                break;
            }
        }

        trajectory.simulation_time = started.elapsed();
        self.counters.simulations.fetch_add(1, Ordering::Relaxed);

        let _ = self.event_tx.send(PredictorEvent::SimulationCompleted {
            horizon: trajectory.horizon,
            requested_horizon: horizon,
            total_probability: trajectory.total_probability,
        });

        Ok(trajectory)
    }

    /// Run `n` simulations from jittered copies of `initial`, most probable first.
    ///
    /// Each start state gets independent uniform noise of
    /// ±[`PERTURBATION_SPREAD`] per dimension. Trajectories are not
    /// reweighted against each other.
    pub fn simulate_multiple(
        &self,
        initial: &LatentState,
        actions: &[Action],
        n: usize,
        horizon: usize,
    ) -> Result<Vec<Trajectory>> {
        let mut trajectories = Vec::new();

        for _ in 0..n {
            let start = {
                let mut rng = self.rng.lock();
                let mut start = initial.clone();
                for x in start.vector.iter_mut() {
                    *x += rng.gen_range(-PERTURBATION_SPREAD..=PERTURBATION_SPREAD);
                }
                start
            };
            trajectories.push(self.simulate(&start, actions, horizon)?);
        }

        trajectories.sort_by(|a, b| b.total_probability.total_cmp(&a.total_probability));
        Ok(trajectories)
    }

    /// Roll `policy` forward from random start states and score the results.
    ///
    /// Each episode collects actions until a step's uncertainty exceeds the
    /// threshold or `max_steps` is reached, then simulates the collected
    /// sequence. Reward is `total_probability × achieved horizon`.
    pub fn train_agent<P>(
        &self,
        agent: &str,
        mut policy: P,
        episodes: usize,
        max_steps: usize,
    ) -> Result<TrainingReport>
    where
        P: FnMut(&LatentState) -> Action,
    {
        let mut total_reward = 0.0;
        let mut best_reward = f64::NEG_INFINITY;
        let mut best_trajectory = None;

        for episode in 0..episodes {
            let initial = {
                let mut rng = self.rng.lock();
                LatentState::random(
                    self.config.dimensions,
                    &mut *rng,
                    format!("{agent}/episode-{episode}"),
                )
            };

            let mut state = initial.clone();
            let mut actions = Vec::new();
            for _ in 0..max_steps {
                let action = policy(&state);
                let predicted = self.predict(&state, &action)?;
                actions.push(action);
                if predicted.uncertainty > self.config.uncertainty_threshold {
                    break;
                }
                state = predicted.state;
            }

            if actions.is_empty() {
                continue;
            }

            let trajectory = self.simulate(&initial, &actions, actions.len())?;
            let reward = trajectory.total_probability * trajectory.horizon as f64;
            total_reward += reward;

            debug!(agent, episode, reward, horizon = trajectory.horizon, "Episode finished");

            if reward > best_reward {
                best_reward = reward;
                best_trajectory = Some(trajectory);
            }
        }

        let average_reward = if episodes == 0 { 0.0 } else { total_reward / episodes as f64 };
        info!(agent, episodes, average_reward, "Agent rollout finished");

        Ok(TrainingReport {
            agent: agent.to_owned(),
            episodes,
            average_reward,
            best_reward: if best_trajectory.is_some() { best_reward } else { 0.0 },
            best_trajectory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{normalize, ActionType, Modality};
    use crate::predictor::PredictorConfig;

    fn predictor() -> Predictor {
        Predictor::new(PredictorConfig { dimensions: 16, seed: Some(42), ..Default::default() })
            .unwrap()
    }

    fn start() -> LatentState {
        let raw: Vec<f64> = (0..16).map(|i| if i % 3 == 0 { 1.0 } else { 0.2 }).collect();
        LatentState::new(normalize(&raw), Modality::State, "start")
    }

    #[test]
    fn test_simulate_cycles_actions() {
        let p = predictor();
        let actions = vec![
            Action::new(ActionType::Observe, "a"),
            Action::new(ActionType::Query, "a"),
        ];
        let t = p.simulate(&start(), &actions, 3).unwrap();
        assert!(t.horizon <= 3);
        assert_eq!(t.steps[0].action.action_type(), ActionType::Observe);
        if t.horizon >= 2 {
            assert_eq!(t.steps[1].action.action_type(), ActionType::Query);
        }
        if t.horizon == 3 {
            assert_eq!(t.steps[2].action.action_type(), ActionType::Observe);
        }
    }

    #[test]
    fn test_total_probability_is_product() {
        let p = predictor();
        let actions = vec![Action::new(ActionType::Transform, "a")];
        let t = p.simulate(&start(), &actions, 20).unwrap();

        let product: f64 = t.steps.iter().map(|s| s.probability).product();
        assert!((t.total_probability - product).abs() < 1e-12);

        let mut running = 1.0;
        for step in &t.steps {
            let next = running * step.probability;
            assert!(next <= running);
            running = next;
        }
    }

    #[test]
    fn test_terminates_on_low_probability() {
        let p = predictor();
        let actions = vec![Action::new(ActionType::Observe, "a")];
        let t = p.simulate(&start(), &actions, 500).unwrap();
        assert!(t.terminated_early());
        assert!(t.horizon < 500);
        let last = t.steps.last().unwrap();
        assert!(
            t.total_probability < MIN_TRAJECTORY_PROBABILITY
                || last.uncertainty > p.config().uncertainty_threshold
        );
    }

    #[test]
    fn test_empty_actions_rejected() {
        let p = predictor();
        assert!(matches!(p.simulate(&start(), &[], 5), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let p = predictor();
        let t = p.simulate(&start(), &[Action::new(ActionType::Observe, "a")], 0).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.total_probability, 1.0);
        assert_eq!(t.final_state(), &t.initial_state);
    }

    #[test]
    fn test_simulate_multiple_sorted() {
        let p = predictor();
        let actions = vec![Action::new(ActionType::Navigate, "a")];
        let ts = p.simulate_multiple(&start(), &actions, 6, 5).unwrap();
        assert_eq!(ts.len(), 6);
        for pair in ts.windows(2) {
            assert!(pair[0].total_probability >= pair[1].total_probability);
        }
        for t in &ts {
            let drift = t.initial_state.drift_to(&start());
            assert!(drift <= PERTURBATION_SPREAD + 1e-12);
        }
    }

    #[test]
    fn test_train_agent_reports_best() {
        let p = predictor();
        let report = p
            .train_agent("explorer", |_| Action::new(ActionType::Query, "explorer"), 4, 6)
            .unwrap();
        assert_eq!(report.episodes, 4);
        assert!(report.average_reward > 0.0);
        let best = report.best_trajectory.unwrap();
        assert!(best.horizon <= 6);
        assert!(report.best_reward >= report.average_reward);
        assert!((report.best_reward - best.total_probability * best.horizon as f64).abs() < 1e-9);
    }
}
