//! Point-in-time captures of a twin for explicit rollback.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::LatentState;

use super::{TwinId, TwinStatus};

/// Immutable capture of a twin's state. Restorable only onto the twin
/// that took it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinSnapshot {
    id: Uuid,
    twin_id: TwinId,
    taken_at: DateTime<Utc>,
    state: LatentState,
    drift: f64,
    status: TwinStatus,
    metadata: HashMap<String, serde_json::Value>,
}

impl TwinSnapshot {
    pub(crate) fn capture(
        twin_id: TwinId,
        state: LatentState,
        drift: f64,
        status: TwinStatus,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            twin_id,
            taken_at: Utc::now(),
            state,
            drift,
            status,
            metadata,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn twin_id(&self) -> &TwinId { &self.twin_id }
    pub fn taken_at(&self) -> DateTime<Utc> { self.taken_at }
    pub fn state(&self) -> &LatentState { &self.state }
    pub fn drift(&self) -> f64 { self.drift }
    pub fn status(&self) -> TwinStatus { self.status }
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> { &self.metadata }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
