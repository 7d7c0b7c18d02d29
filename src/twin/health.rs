//! Twin health assessment.
//!
//! Health is derived on demand from the twin's state; nothing here mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::LatentState;

use super::{PredictionRecord, TwinId, TwinStatus};

/// Entries per comparison window for the drift trend.
pub const TREND_WINDOW: usize = 5;
pub const TREND_RISING_RATIO: f64 = 1.2;
pub const TREND_FALLING_RATIO: f64 = 0.8;

/// Accuracy reported before any prediction has been verified.
pub const DEFAULT_ACCURACY: f64 = 0.5;

pub const LOW_SYNC_HEALTH: f64 = 0.5;
pub const LOW_ACCURACY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTrend {
    Stable,
    Increasing,
    Decreasing,
}

impl std::fmt::Display for DriftTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftTrend::Stable => write!(f, "stable"),
            DriftTrend::Increasing => write!(f, "increasing"),
            DriftTrend::Decreasing => write!(f, "decreasing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinHealth {
    pub twin_id: TwinId,
    pub status: TwinStatus,
    /// `1 - min(1, sync_drift / max_drift)`.
    pub sync_health: f64,
    /// Mean of `(cos + 1) / 2` over verified predictions.
    pub prediction_accuracy: f64,
    pub drift_trend: DriftTrend,
    pub last_sync: Option<DateTime<Utc>>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl TwinHealth {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub(crate) struct HealthInputs<'a> {
    pub twin_id: TwinId,
    pub status: TwinStatus,
    pub sync_drift: f64,
    pub max_drift: f64,
    pub last_sync: Option<DateTime<Utc>>,
    pub history: Vec<&'a LatentState>,
    pub predictions: Vec<&'a PredictionRecord>,
}

pub(crate) fn assess(inputs: HealthInputs<'_>) -> TwinHealth {
    let sync_health = 1.0 - (inputs.sync_drift / inputs.max_drift).min(1.0);
    let prediction_accuracy = prediction_accuracy(&inputs.predictions);
    let drift_trend = drift_trend(&inputs.history);

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    match inputs.status {
        TwinStatus::Disconnected => {
            issues.push("twin is disconnected from its real system".to_owned());
            recommendations.push("check the state fetcher and restart sync".to_owned());
        }
        TwinStatus::Drifting => {
            issues.push("twin state is drifting from the real system".to_owned());
            recommendations.push("shorten the sync interval or raise max_drift if drift is expected".to_owned());
        }
        TwinStatus::Initializing | TwinStatus::Synced => {}
    }

    if sync_health < LOW_SYNC_HEALTH {
        issues.push(format!("low sync health ({sync_health:.2})"));
        recommendations.push("force a sync to re-anchor the twin".to_owned());
    }

    if prediction_accuracy < LOW_ACCURACY {
        issues.push(format!("low prediction accuracy ({prediction_accuracy:.2})"));
        recommendations.push("review transition parameters for the actions in use".to_owned());
    }

    if drift_trend == DriftTrend::Increasing {
        issues.push("drift is increasing".to_owned());
        recommendations.push("investigate changes in the real system's dynamics".to_owned());
    }

    TwinHealth {
        twin_id: inputs.twin_id,
        status: inputs.status,
        sync_health,
        prediction_accuracy,
        drift_trend,
        last_sync: inputs.last_sync,
        issues,
        recommendations,
    }
}

pub(crate) fn prediction_accuracy(records: &[&PredictionRecord]) -> f64 {
    let scores: Vec<f64> = records
        .iter()
        .filter_map(|r| r.similarity)
        .map(|s| (s + 1.0) / 2.0)
        .collect();
    if scores.is_empty() {
        return DEFAULT_ACCURACY;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Mean step-to-step drift across consecutive states.
pub(crate) fn mean_step_drift(window: &[&LatentState]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let total: f64 = window.windows(2).map(|w| w[0].drift_to(w[1])).sum();
    total / (window.len() - 1) as f64
}

/// Compare the last [`TREND_WINDOW`] entries against the window before them.
pub(crate) fn drift_trend(history: &[&LatentState]) -> DriftTrend {
    let n = history.len();
    if n < 2 * TREND_WINDOW {
        return DriftTrend::Stable;
    }
    let previous = mean_step_drift(&history[n - 2 * TREND_WINDOW..n - TREND_WINDOW]);
    let recent = mean_step_drift(&history[n - TREND_WINDOW..]);

    if previous == 0.0 {
        return if recent > 0.0 { DriftTrend::Increasing } else { DriftTrend::Stable };
    }

    let ratio = recent / previous;
    if ratio > TREND_RISING_RATIO {
        DriftTrend::Increasing
    } else if ratio < TREND_FALLING_RATIO {
        DriftTrend::Decreasing
    } else {
        DriftTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Modality;

    /// Scalar history whose consecutive gaps are `steps`.
    fn history(steps: &[f64]) -> Vec<LatentState> {
        let mut x = 0.0;
        let mut out = vec![LatentState::new(vec![x], Modality::State, "h")];
        for s in steps {
            x += s;
            out.push(LatentState::new(vec![x], Modality::State, "h"));
        }
        out
    }

    fn refs(h: &[LatentState]) -> Vec<&LatentState> {
        h.iter().collect()
    }

    fn verified(similarity: f64) -> PredictionRecord {
        let predicted = LatentState::new(vec![1.0, 0.0], Modality::State, "forecast");
        PredictionRecord {
            id: uuid::Uuid::new_v4(),
            made_at: Utc::now(),
            horizon: 1,
            actual: Some(predicted.clone()),
            predicted,
            similarity: Some(similarity),
        }
    }

    fn inputs<'a>(
        sync_drift: f64,
        history: &'a [LatentState],
        predictions: &'a [PredictionRecord],
    ) -> HealthInputs<'a> {
        HealthInputs {
            twin_id: TwinId::new(),
            status: TwinStatus::Synced,
            sync_drift,
            max_drift: 0.1,
            last_sync: Some(Utc::now()),
            history: history.iter().collect(),
            predictions: predictions.iter().collect(),
        }
    }

    #[test]
    fn test_trend_short_history_stable() {
        let h = history(&[1.0; 8]);
        assert_eq!(drift_trend(&refs(&h)), DriftTrend::Stable);
    }

    #[test]
    fn test_trend_increasing() {
        let h = history(&[0.1, 0.1, 0.1, 0.1, 0.1, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(h.len(), 10);
        assert_eq!(drift_trend(&refs(&h)), DriftTrend::Increasing);
    }

    #[test]
    fn test_trend_decreasing() {
        let h = history(&[0.5, 0.5, 0.5, 0.5, 0.5, 0.1, 0.1, 0.1, 0.1]);
        assert_eq!(drift_trend(&refs(&h)), DriftTrend::Decreasing);
    }

    #[test]
    fn test_trend_steady() {
        let h = history(&[0.2; 11]);
        assert_eq!(drift_trend(&refs(&h)), DriftTrend::Stable);
    }

    #[test]
    fn test_accuracy_default_without_verification() {
        assert_eq!(prediction_accuracy(&[]), DEFAULT_ACCURACY);
    }

    #[test]
    fn test_low_sync_health_reported() {
        let h = assess(inputs(0.08, &[], &[]));
        assert!((h.sync_health - 0.2).abs() < 1e-9);
        assert!(h.issues.iter().any(|i| i.starts_with("low sync health")));
        assert!(!h.is_healthy());
    }

    #[test]
    fn test_sync_health_floors_at_zero() {
        let h = assess(inputs(0.5, &[], &[]));
        assert_eq!(h.sync_health, 0.0);
    }

    #[test]
    fn test_low_accuracy_reported() {
        let records = [verified(-0.6), verified(-0.2)];
        let h = assess(inputs(0.0, &[], &records));
        // ((-0.6 + 1) / 2 + (-0.2 + 1) / 2) / 2
        assert!((h.prediction_accuracy - 0.3).abs() < 1e-9);
        assert_eq!(h.issues, vec!["low prediction accuracy (0.30)".to_owned()]);
        assert_eq!(h.recommendations.len(), 1);
    }

    #[test]
    fn test_accurate_predictions_are_healthy() {
        let records = [verified(1.0), verified(0.8)];
        let h = assess(inputs(0.0, &[], &records));
        assert!((h.prediction_accuracy - 0.95).abs() < 1e-9);
        assert!(h.is_healthy());
    }

    #[test]
    fn test_increasing_trend_reported() {
        let history = history(&[0.1, 0.1, 0.1, 0.1, 0.1, 0.5, 0.5, 0.5, 0.5]);
        let h = assess(inputs(0.0, &history, &[]));
        assert_eq!(h.drift_trend, DriftTrend::Increasing);
        assert_eq!(h.issues, vec!["drift is increasing".to_owned()]);
    }
}
