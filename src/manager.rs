//! Registry over many digital twins.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::twin::{DigitalTwin, Encoder, TwinConfig, TwinId, TwinStatus};
use crate::Result;

/// Status counts across all registered twins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetHealth {
    pub total: usize,
    pub initializing: usize,
    pub synced: usize,
    pub drifting: usize,
    pub disconnected: usize,
    /// Mean per-twin sync health; 1.0 for an empty fleet.
    pub average_sync_health: f64,
}

/// Owns twins by id. Lookups hand out shared handles.
#[derive(Default)]
pub struct DigitalTwinManager {
    twins: DashMap<TwinId, Arc<DigitalTwin>>,
}

impl DigitalTwinManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a twin using the reference vector encoder.
    #[instrument(skip_all, fields(dimensions = config.dimensions))]
    pub fn create_twin(
        &self,
        real_system_id: impl Into<String>,
        name: impl Into<String>,
        config: TwinConfig,
    ) -> Result<Arc<DigitalTwin>> {
        let twin = DigitalTwin::new(real_system_id, name, config)?;
        Ok(self.register(twin))
    }

    #[instrument(skip_all, fields(dimensions = config.dimensions))]
    pub fn create_twin_with_encoder(
        &self,
        real_system_id: impl Into<String>,
        name: impl Into<String>,
        config: TwinConfig,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Arc<DigitalTwin>> {
        let twin = DigitalTwin::with_encoder(real_system_id, name, config, encoder)?;
        Ok(self.register(twin))
    }

    fn register(&self, twin: DigitalTwin) -> Arc<DigitalTwin> {
        let twin = Arc::new(twin);
        info!(twin_id = %twin.id(), real_system_id = twin.real_system_id(), "Twin created");
        self.twins.insert(*twin.id(), Arc::clone(&twin));
        twin
    }

    pub fn get_twin(&self, id: &TwinId) -> Option<Arc<DigitalTwin>> {
        self.twins.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_all_twins(&self) -> Vec<Arc<DigitalTwin>> {
        self.twins.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// All twins mirroring `real_system_id`.
    pub fn find_by_system(&self, real_system_id: &str) -> Vec<Arc<DigitalTwin>> {
        self.twins
            .iter()
            .filter(|entry| entry.value().real_system_id() == real_system_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Stop a twin's sync and drop it from the registry. Returns `false` for
    /// an unknown id.
    #[instrument(skip(self, id), fields(twin_id = %id))]
    pub fn remove_twin(&self, id: &TwinId) -> bool {
        match self.twins.remove(id) {
            Some((_, twin)) => {
                twin.stop_sync();
                info!(twin_id = %id, "Twin removed");
                true
            }
            None => false,
        }
    }

    /// Stop sync on every twin. Twins stay registered.
    #[instrument(skip(self), fields(twins = self.twins.len()))]
    pub fn stop_all(&self) {
        for twin in self.get_all_twins() {
            twin.stop_sync();
        }
    }

    pub fn len(&self) -> usize {
        self.twins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.twins.is_empty()
    }

    pub fn get_overall_health(&self) -> FleetHealth {
        let twins = self.get_all_twins();
        let mut fleet = FleetHealth { total: twins.len(), ..Default::default() };
        let mut sync_health = 0.0;

        for twin in &twins {
            match twin.status() {
                TwinStatus::Initializing => fleet.initializing += 1,
                TwinStatus::Synced => fleet.synced += 1,
                TwinStatus::Drifting => fleet.drifting += 1,
                TwinStatus::Disconnected => fleet.disconnected += 1,
            }
            sync_health += twin.get_health().sync_health;
        }

        fleet.average_sync_health = if twins.is_empty() { 1.0 } else { sync_health / twins.len() as f64 };
        fleet
    }
}

impl std::fmt::Debug for DigitalTwinManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwinManager").field("twins", &self.twins.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwinConfig {
        TwinConfig { dimensions: 4, ..Default::default() }
    }

    #[test]
    fn test_create_and_get() {
        let m = DigitalTwinManager::new();
        let twin = m.create_twin("sys-1", "One", config()).unwrap();
        assert_eq!(m.len(), 1);
        let fetched = m.get_twin(twin.id()).unwrap();
        assert!(Arc::ptr_eq(&twin, &fetched));
    }

    #[test]
    fn test_get_unknown() {
        let m = DigitalTwinManager::new();
        assert!(m.get_twin(&TwinId::new()).is_none());
        assert!(!m.remove_twin(&TwinId::new()));
    }

    #[test]
    fn test_invalid_config_not_registered() {
        let m = DigitalTwinManager::new();
        let bad = TwinConfig { max_drift: -1.0, ..config() };
        assert!(m.create_twin("sys", "bad", bad).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn test_remove_disconnects() {
        let m = DigitalTwinManager::new();
        let twin = m.create_twin("sys-1", "One", config()).unwrap();
        assert!(m.remove_twin(twin.id()));
        assert!(m.is_empty());
        assert_eq!(twin.status(), TwinStatus::Disconnected);
    }

    #[test]
    fn test_empty_fleet_health() {
        let h = DigitalTwinManager::new().get_overall_health();
        assert_eq!(h.total, 0);
        assert_eq!(h.average_sync_health, 1.0);
    }

    #[test]
    fn test_fleet_counts() {
        let m = DigitalTwinManager::new();
        m.create_twin("a", "A", config()).unwrap();
        let b = m.create_twin("b", "B", config()).unwrap();
        b.stop_sync();

        let h = m.get_overall_health();
        assert_eq!(h.total, 2);
        assert_eq!(h.initializing, 1);
        assert_eq!(h.disconnected, 1);
        assert_eq!(m.find_by_system("a").len(), 1);
    }
}
