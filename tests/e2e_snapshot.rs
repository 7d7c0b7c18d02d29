//! End-to-end tests for snapshot capture and rollback.

use std::collections::HashMap;
use std::sync::Arc;

use latent_twin::{
    DigitalTwin, Error, RawObservation, StateFetcher, TwinConfig, TwinEvent, TwinSnapshot,
    TwinStatus,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

struct Scripted(Mutex<Vec<f64>>);

#[async_trait::async_trait]
impl StateFetcher for Scripted {
    async fn fetch(&self) -> latent_twin::Result<RawObservation> {
        Ok(RawObservation::new("press-3", serde_json::json!(self.0.lock().clone())))
    }
}

fn twin() -> Arc<DigitalTwin> {
    let config = TwinConfig { dimensions: 3, sync_interval_ms: 60_000, ..Default::default() };
    Arc::new(DigitalTwin::new("press-3", "Press 3", config).unwrap())
}

#[tokio::test]
async fn test_restore_rolls_back_state() {
    let t = twin();
    let fetcher = Arc::new(Scripted(Mutex::new(vec![0.02, 0.04, 0.06])));
    t.start_sync(fetcher.clone()).await.unwrap();

    let metadata = HashMap::from([("reason".to_owned(), serde_json::json!("before maintenance"))]);
    let snapshot = t.take_snapshot(metadata);
    assert_eq!(snapshot.twin_id(), t.id());
    assert_eq!(snapshot.status(), TwinStatus::Synced);
    assert_eq!(snapshot.metadata()["reason"], "before maintenance");

    *fetcher.0.lock() = vec![0.9, 0.9, 0.9];
    t.sync_now().await.unwrap();
    assert!(t.current_state().vector != snapshot.state().vector);
    let history_before = t.history().len();

    let mut events = t.subscribe();
    t.restore_snapshot(&snapshot).unwrap();

    let restored = t.current_state();
    assert_eq!(restored.vector, snapshot.state().vector);
    assert!(restored.timestamp >= snapshot.taken_at());
    assert_eq!(t.sync_drift(), snapshot.drift());
    assert_eq!(t.history().len(), history_before);

    assert_eq!(
        events.try_recv().unwrap(),
        TwinEvent::SnapshotRestored { twin_id: *t.id(), snapshot_id: snapshot.id() }
    );

    t.stop_sync();
}

#[tokio::test]
async fn test_restore_onto_other_twin_rejected() {
    let a = twin();
    let b = twin();
    let before = b.current_state();

    let snapshot = a.take_snapshot(HashMap::new());
    let err = b.restore_snapshot(&snapshot).unwrap_err();

    match &err {
        Error::SnapshotMismatch { snapshot_twin, target_twin } => {
            assert_eq!(snapshot_twin, a.id());
            assert_eq!(target_twin, b.id());
        }
        other => panic!("expected SnapshotMismatch, got {other:?}"),
    }
    assert!(err.is_configuration());
    assert_eq!(b.current_state(), before);
}

#[tokio::test]
async fn test_snapshot_survives_json() {
    let t = twin();
    let snapshot = t.take_snapshot(HashMap::new());

    let restored = TwinSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    t.restore_snapshot(&restored).unwrap();
    assert_eq!(t.current_state().vector, vec![0.0; 3]);
}
