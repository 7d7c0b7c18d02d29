//! Twin configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for one digital twin.
///
/// Every field has a default, so partial JSON documents deserialize:
///
/// ```rust
/// use latent_twin::TwinConfig;
///
/// let config = TwinConfig::from_json(r#"{ "max_drift": 0.25, "sync_interval_ms": 500 }"#).unwrap();
/// assert_eq!(config.max_drift, 0.25);
/// assert_eq!(config.history_limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Period of the background sync timer.
    pub sync_interval_ms: u64,
    /// Drift above which the twin is marked drifting and corrected.
    pub max_drift: f64,
    /// Default horizon for forecasts.
    pub prediction_horizon: usize,
    /// Branches per high-uncertainty prediction.
    pub branching_factor: usize,
    /// Step uncertainty above which forecasts stop early.
    pub uncertainty_threshold: f64,
    /// Maximum retained history entries; oldest are evicted first.
    pub history_limit: usize,
    /// Maximum retained prediction records awaiting or holding verification.
    pub prediction_log_limit: usize,
    /// Latent dimensionality of this twin's states.
    pub dimensions: usize,
    /// Fetches slower than this count as failures.
    pub fetch_timeout_ms: u64,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 1000,
            max_drift: 0.1,
            prediction_horizon: 10,
            branching_factor: 3,
            uncertainty_threshold: 0.7,
            history_limit: 1000,
            prediction_log_limit: 500,
            dimensions: 64,
            fetch_timeout_ms: 5000,
        }
    }
}

impl TwinConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TwinConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_ms == 0 {
            return Err(Error::InvalidConfig("sync_interval_ms must be > 0".into()));
        }
        if self.max_drift.is_nan() || self.max_drift <= 0.0 {
            return Err(Error::InvalidConfig(format!("max_drift must be > 0, got {}", self.max_drift)));
        }
        if !(0.0..=1.0).contains(&self.uncertainty_threshold) {
            return Err(Error::InvalidConfig(format!(
                "uncertainty_threshold must be in [0, 1], got {}",
                self.uncertainty_threshold
            )));
        }
        if self.history_limit == 0 {
            return Err(Error::InvalidConfig("history_limit must be > 0".into()));
        }
        if self.prediction_log_limit == 0 {
            return Err(Error::InvalidConfig("prediction_log_limit must be > 0".into()));
        }
        if self.dimensions == 0 {
            return Err(Error::InvalidConfig("dimensions must be > 0".into()));
        }
        if self.branching_factor == 0 {
            return Err(Error::InvalidConfig("branching_factor must be >= 1".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfig("fetch_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Predictions older than this are eligible for verification.
    pub fn verification_age(&self) -> Duration {
        self.sync_interval() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        TwinConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_interval() {
        let c = TwinConfig { sync_interval_ms: 0, ..Default::default() };
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_nan_drift() {
        let c = TwinConfig { max_drift: f64::NAN, ..Default::default() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let c = TwinConfig { uncertainty_threshold: 1.5, ..Default::default() };
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_bad_document() {
        assert!(matches!(TwinConfig::from_json("{ not json"), Err(Error::Serialization(_))));
    }
}
