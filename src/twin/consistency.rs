//! # Consistency Auditing
//!
//! Four independent checks over a twin's state:
//!
//! | Check | Fails when |
//! |-------|------------|
//! | state | a step in the last 5 history entries jumps by more than 0.5 drift |
//! | temporal | history timestamps are not strictly increasing |
//! | causal | a verified prediction has cosine similarity below 0.3 to reality |
//! | entity | the twin is disconnected from its real system |
//!
//! Failures are reported as issues, never as errors.

use serde::{Deserialize, Serialize};

use crate::model::LatentState;

use super::{PredictionRecord, TwinId, TwinStatus};

/// History entries inspected by the state check.
pub const STATE_WINDOW: usize = 5;
/// Largest tolerated single-step drift.
pub const MAX_STEP_DRIFT: f64 = 0.5;
/// Minimum similarity a verified prediction must reach.
pub const MIN_CAUSAL_SIMILARITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.1,
            Severity::Medium => 0.3,
            Severity::High => 0.6,
            Severity::Critical => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    State,
    Temporal,
    Causal,
    Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    pub affected: Vec<String>,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub twin_id: TwinId,
    pub passed: bool,
    pub state_consistent: bool,
    pub temporal_consistent: bool,
    pub causal_consistent: bool,
    pub entity_consistent: bool,
    pub issues: Vec<ConsistencyIssue>,
    /// Severity-weighted issue sum, clamped to [0, 1].
    pub inconsistency_score: f64,
}

pub(crate) fn check(
    twin_id: TwinId,
    status: TwinStatus,
    history: &[&LatentState],
    predictions: &[&PredictionRecord],
) -> ConsistencyCheck {
    let state = check_state(history);
    let temporal = check_temporal(history);
    let causal = check_causal(predictions);
    let entity = check_entity(&twin_id, status);

    let state_consistent = state.is_empty();
    let temporal_consistent = temporal.is_empty();
    let causal_consistent = causal.is_empty();
    let entity_consistent = entity.is_empty();

    let issues: Vec<ConsistencyIssue> = [state, temporal, causal, entity].into_iter().flatten().collect();
    let inconsistency_score = issues
        .iter()
        .map(|i| i.severity.weight())
        .sum::<f64>()
        .min(1.0);

    ConsistencyCheck {
        twin_id,
        passed: issues.is_empty(),
        state_consistent,
        temporal_consistent,
        causal_consistent,
        entity_consistent,
        issues,
        inconsistency_score,
    }
}

fn check_state(history: &[&LatentState]) -> Vec<ConsistencyIssue> {
    let start = history.len().saturating_sub(STATE_WINDOW);
    history[start..]
        .windows(2)
        .filter_map(|w| {
            let jump = w[0].drift_to(w[1]);
            (jump > MAX_STEP_DRIFT).then(|| ConsistencyIssue {
                kind: IssueKind::State,
                severity: Severity::High,
                description: format!("state discontinuity of {jump:.3} between consecutive history entries"),
                affected: vec![w[0].source_id.clone(), w[1].source_id.clone()],
                suggested_fix: Some("take a snapshot and re-sync from the real system".into()),
            })
        })
        .collect()
}

fn check_temporal(history: &[&LatentState]) -> Vec<ConsistencyIssue> {
    let violations: Vec<String> = history
        .windows(2)
        .filter(|w| w[1].timestamp <= w[0].timestamp)
        .map(|w| w[1].source_id.clone())
        .collect();

    if violations.is_empty() {
        return Vec::new();
    }
    vec![ConsistencyIssue {
        kind: IssueKind::Temporal,
        severity: Severity::Critical,
        description: format!("{} history entries are out of timestamp order", violations.len()),
        affected: violations,
        suggested_fix: Some("ensure sync cycles do not overlap".into()),
    }]
}

fn check_causal(predictions: &[&PredictionRecord]) -> Vec<ConsistencyIssue> {
    predictions
        .iter()
        .filter_map(|p| {
            let similarity = p.similarity?;
            (similarity < MIN_CAUSAL_SIMILARITY).then(|| ConsistencyIssue {
                kind: IssueKind::Causal,
                severity: Severity::Medium,
                description: format!("prediction diverged from reality (similarity {similarity:.3})"),
                affected: vec![p.id.to_string()],
                suggested_fix: Some("review the transition model for the actions involved".into()),
            })
        })
        .collect()
}

fn check_entity(twin_id: &TwinId, status: TwinStatus) -> Vec<ConsistencyIssue> {
    if status != TwinStatus::Disconnected {
        return Vec::new();
    }
    vec![ConsistencyIssue {
        kind: IssueKind::Entity,
        severity: Severity::High,
        description: "twin is disconnected from its real system".into(),
        affected: vec![twin_id.to_string()],
        suggested_fix: Some("restart sync with a working state fetcher".into()),
    }]
}
