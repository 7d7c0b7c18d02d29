//! End-to-end tests for the twin registry.

use std::sync::Arc;

use latent_twin::{
    DigitalTwinManager, Error, RawObservation, StateFetcher, TwinConfig, TwinStatus, VectorEncoder,
};
use pretty_assertions::assert_eq;

struct Steady;

#[async_trait::async_trait]
impl StateFetcher for Steady {
    async fn fetch(&self) -> latent_twin::Result<RawObservation> {
        Ok(RawObservation::new("line-a", serde_json::json!({ "vector": [0.05, 0.05, 0.05, 0.05] })))
    }
}

struct Offline;

#[async_trait::async_trait]
impl StateFetcher for Offline {
    async fn fetch(&self) -> latent_twin::Result<RawObservation> {
        Err(Error::FetchFailed("no route to host".into()))
    }
}

fn config() -> TwinConfig {
    TwinConfig { dimensions: 4, sync_interval_ms: 60_000, ..Default::default() }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_fleet_health_counts_statuses() {
    init_tracing();
    let manager = DigitalTwinManager::new();
    let synced = manager.create_twin("line-a", "Line A", config()).unwrap();
    let offline = manager.create_twin("line-b", "Line B", config()).unwrap();
    manager.create_twin("line-c", "Line C", config()).unwrap();

    synced.start_sync(Arc::new(Steady)).await.unwrap();
    offline.start_sync(Arc::new(Offline)).await.unwrap();

    let health = manager.get_overall_health();
    assert_eq!(health.total, 3);
    assert_eq!(health.synced, 1);
    assert_eq!(health.disconnected, 1);
    assert_eq!(health.initializing, 1);
    assert_eq!(health.drifting, 0);
    assert!(health.average_sync_health > 0.0 && health.average_sync_health <= 1.0);

    manager.stop_all();
    assert!(manager.get_all_twins().iter().all(|t| t.status() == TwinStatus::Disconnected));
    assert_eq!(manager.len(), 3);
}

#[tokio::test]
async fn test_remove_twin_stops_and_forgets() {
    init_tracing();
    let manager = DigitalTwinManager::new();
    let twin = manager.create_twin("line-a", "Line A", config()).unwrap();
    twin.start_sync(Arc::new(Steady)).await.unwrap();
    assert!(twin.is_syncing());

    let id = *twin.id();
    assert!(manager.remove_twin(&id));
    assert!(!twin.is_syncing());
    assert_eq!(twin.status(), TwinStatus::Disconnected);
    assert!(manager.get_twin(&id).is_none());
    assert!(!manager.remove_twin(&id));
}

#[tokio::test]
async fn test_custom_encoder_must_match_dimensions() {
    let manager = DigitalTwinManager::new();
    let err = manager
        .create_twin_with_encoder("line-a", "Line A", config(), Arc::new(VectorEncoder::new(6)))
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 4, got: 6 }));
    assert!(manager.is_empty());

    let twin = manager
        .create_twin_with_encoder("line-a", "Line A", config(), Arc::new(VectorEncoder::new(4).normalized()))
        .unwrap();
    assert_eq!(manager.find_by_system("line-a").len(), 1);
    assert_eq!(twin.name(), "Line A");
}
