//! # Real-System Collaborators
//!
//! The twin touches the real system through exactly two seams:
//!
//! | Trait | Direction | Notes |
//! |-------|-----------|-------|
//! | [`StateFetcher`] | real system → raw observation | async, supplied per twin to `start_sync` |
//! | [`Encoder`] | raw observation → latent state | sync, fixed dimensionality per deployment |
//!
//! [`VectorEncoder`] is the reference encoder: it reads a numeric vector
//! straight out of the observation payload.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{normalize, vector_entropy, LatentState, Modality};
use crate::{Error, Result};

/// One raw reading from the real system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub source_id: String,
    pub modality: Modality,
    pub observed_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl RawObservation {
    pub fn new(source_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            source_id: source_id.into(),
            modality: Modality::State,
            observed_at: Utc::now(),
            payload,
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }
}

/// Fetches the current state of the real system.
///
/// Errors are operational: the twin degrades to disconnected and keeps
/// accepting future sync attempts.
#[async_trait]
pub trait StateFetcher: Send + Sync + 'static {
    async fn fetch(&self) -> Result<RawObservation>;
}

/// Turns a raw observation into a latent state.
pub trait Encoder: Send + Sync + 'static {
    fn encode(&self, observation: &RawObservation) -> Result<LatentState>;

    /// Output dimensionality.
    fn dimensions(&self) -> usize;
}

/// Reads `payload` as either a bare numeric array or an object
/// `{ "vector": [...], "confidence"?: f64, "entropy"?: f64 }`.
///
/// Short vectors are zero-padded and long ones truncated to `dimensions`.
#[derive(Debug, Clone)]
pub struct VectorEncoder {
    dimensions: usize,
    normalize: bool,
}

impl VectorEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, normalize: false }
    }

    /// Scale encoded vectors to unit length.
    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }
}

impl Encoder for VectorEncoder {
    fn encode(&self, observation: &RawObservation) -> Result<LatentState> {
        let payload = &observation.payload;
        let raw = match payload {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(map) => map
                .get("vector")
                .and_then(|v| v.as_array())
                .ok_or_else(|| Error::EncodeFailed("payload object has no 'vector' array".into()))?,
            other => {
                return Err(Error::EncodeFailed(format!("unsupported payload: {other}")));
            }
        };

        let mut vector = raw
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| Error::EncodeFailed(format!("non-numeric component: {v}")))
            })
            .collect::<Result<Vec<f64>>>()?;
        vector.resize(self.dimensions, 0.0);
        if self.normalize {
            vector = normalize(&vector);
        }

        let confidence = payload.get("confidence").and_then(|c| c.as_f64()).unwrap_or(1.0);
        let entropy = payload
            .get("entropy")
            .and_then(|e| e.as_f64())
            .unwrap_or_else(|| vector_entropy(&vector));

        Ok(LatentState::new(vector, observation.modality, observation.source_id.clone())
            .with_confidence(confidence)
            .with_entropy(entropy)
            .with_timestamp(observation.observed_at))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
