//! Latent state: the vector every other component operates on.
//!
//! A `LatentState` is a fixed-length numeric vector summarizing one
//! observation of the real system, plus provenance and quality metadata.
//!
//! The free functions in this module are the shared vector math:
//!
//! | Function | Meaning |
//! |----------|---------|
//! | [`normalize`] | scale to unit Euclidean norm (zero vector unchanged) |
//! | [`rms_distance`] | drift: RMS of per-dimension differences |
//! | [`lerp`] | per-dimension linear interpolation |
//! | [`cosine_similarity`] | angle agreement in [-1, 1] |
//! | [`vector_entropy`] | normalized Shannon entropy of the squared components |
//!
//! # Truncation policy
//!
//! Upstream encoders produce a fixed dimensionality per deployment. When two
//! vectors of different length meet anyway, `rms_distance`, `lerp` and
//! `cosine_similarity` operate on the overlapping prefix and ignore the tail.
//! This keeps drift values stable across encoder upgrades instead of failing
//! the sync cycle.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// Modality
// ============================================================================

/// Where the observation behind a latent state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Code,
    State,
    Audio,
    Sensor,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Code => "code",
            Modality::State => "state",
            Modality::Audio => "audio",
            Modality::Sensor => "sensor",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Features
// ============================================================================

/// A named sparse group of vector indices with an activation score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFeature {
    pub name: String,
    pub indices: Vec<usize>,
    pub activation: f64,
}

// ============================================================================
// LatentState
// ============================================================================

/// Compressed vector representation of the real system at one instant.
///
/// `confidence` and `entropy` are only writable through the builders, which
/// clamp them into [0, 1]. The getters clamp again so deserialized states
/// obey the same bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentState {
    pub vector: Vec<f64>,
    pub source_modality: Modality,
    /// Opaque provenance string.
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub(crate) confidence: f64,
    pub(crate) entropy: f64,
    #[serde(default)]
    pub features: Vec<LatentFeature>,
}

impl LatentState {
    /// Build a state from a raw vector, stamped now, full confidence and
    /// entropy computed from the vector.
    pub fn new(vector: Vec<f64>, source_modality: Modality, source_id: impl Into<String>) -> Self {
        let entropy = vector_entropy(&vector);
        Self {
            vector,
            source_modality,
            source_id: source_id.into(),
            timestamp: Utc::now(),
            confidence: 1.0,
            entropy,
            features: Vec::new(),
        }
    }

    /// All-zero state with zero confidence. Twins start here.
    pub fn zeros(dimensions: usize, source_id: impl Into<String>) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            source_modality: Modality::State,
            source_id: source_id.into(),
            timestamp: Utc::now(),
            confidence: 0.0,
            entropy: 0.0,
            features: Vec::new(),
        }
    }

    /// Unit-norm state with components drawn uniformly from [-1, 1].
    pub fn random<R: Rng + ?Sized>(dimensions: usize, rng: &mut R, source_id: impl Into<String>) -> Self {
        let raw: Vec<f64> = (0..dimensions).map(|_| rng.gen_range(-1.0..=1.0)).collect();
        Self::new(normalize(&raw), Modality::State, source_id)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_entropy(mut self, entropy: f64) -> Self {
        self.entropy = clamp_unit(entropy);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_feature(mut self, feature: LatentFeature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn confidence(&self) -> f64 {
        clamp_unit(self.confidence)
    }

    /// Normalized information content of the vector.
    pub fn entropy(&self) -> f64 {
        clamp_unit(self.entropy)
    }

    /// Vector length.
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Drift between two states (see [`rms_distance`]).
    pub fn drift_to(&self, other: &LatentState) -> f64 {
        rms_distance(&self.vector, &other.vector)
    }

    /// Cosine similarity between the two vectors.
    pub fn similarity(&self, other: &LatentState) -> f64 {
        cosine_similarity(&self.vector, &other.vector)
    }

    /// Linear blend toward `other` by weight `t` (0 = self, 1 = other).
    ///
    /// Vector, confidence and entropy are interpolated; provenance and
    /// modality are taken from `other` once `t > 0`. The timestamp is kept
    /// from whichever side dominates the blend.
    pub fn blend(&self, other: &LatentState, t: f64) -> LatentState {
        let t = clamp_unit(t);
        let toward_other = t > 0.0;
        LatentState {
            vector: lerp(&self.vector, &other.vector, t),
            source_modality: if toward_other { other.source_modality } else { self.source_modality },
            source_id: if toward_other { other.source_id.clone() } else { self.source_id.clone() },
            timestamp: if t >= 0.5 { other.timestamp } else { self.timestamp },
            confidence: clamp_unit(self.confidence * (1.0 - t) + other.confidence * t),
            entropy: clamp_unit(self.entropy * (1.0 - t) + other.entropy * t),
            features: if t >= 0.5 { other.features.clone() } else { self.features.clone() },
        }
    }

    /// Seconds elapsed since this state was stamped (never negative).
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.timestamp).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Euclidean norm of the vector.
    pub fn norm(&self) -> f64 {
        norm(&self.vector)
    }
}

// ============================================================================
// Vector math
// ============================================================================

pub(crate) fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Euclidean norm.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Scale to unit length. The zero vector is returned unchanged.
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / n).collect()
}

/// Root-mean-square of per-dimension differences over the overlapping prefix.
///
/// Zero when either vector is empty.
pub fn rms_distance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (sum_sq / n as f64).sqrt()
}

/// `a * (1 - t) + b * t` per dimension over the overlapping prefix.
pub fn lerp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * (1.0 - t) + y * t).collect()
}

/// Cosine similarity over the overlapping prefix; 0 if either side is zero.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / denom).clamp(-1.0, 1.0)
}

/// Shannon entropy of the squared, mass-normalized components divided by
/// `ln(n)`, so a uniform spread is 1 and a single spike is 0.
pub fn vector_entropy(v: &[f64]) -> f64 {
    if v.len() <= 1 {
        return 0.0;
    }
    let mass: f64 = v.iter().map(|x| x * x).sum();
    if mass == 0.0 {
        return 0.0;
    }
    let h: f64 = v
        .iter()
        .map(|x| x * x / mass)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    clamp_unit(h / (v.len() as f64).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(v: Vec<f64>) -> LatentState {
        LatentState::new(v, Modality::Sensor, "test")
    }

    #[test]
    fn test_normalize_unit_norm() {
        let v = normalize(&[3.0, 4.0]);
        assert!((norm(&v) - 1.0).abs() < 1e-12);
        assert!((v[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_drift_known_value() {
        let a = state(vec![0.0, 0.0, 0.0, 0.0]);
        let b = state(vec![1.0, 1.0, 1.0, 1.0]);
        assert!((a.drift_to(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_lengths_truncate() {
        // Only the first two dimensions take part.
        let a = [1.0, 2.0, 100.0];
        let b = [1.0, 2.0];
        assert_eq!(rms_distance(&a, &b), 0.0);
        assert_eq!(lerp(&a, &b, 0.5), vec![1.0, 2.0]);
    }

    #[test]
    fn test_builders_clamp() {
        let s = state(vec![1.0]).with_confidence(1.7).with_entropy(-0.2);
        assert_eq!(s.confidence(), 1.0);
        assert_eq!(s.entropy(), 0.0);
    }

    #[test]
    fn test_getters_clamp_deserialized_values() {
        let mut json = serde_json::to_value(state(vec![1.0, 0.0])).unwrap();
        json["confidence"] = serde_json::json!(4.2);
        json["entropy"] = serde_json::json!(-1.0);
        let s: LatentState = serde_json::from_value(json).unwrap();
        assert_eq!(s.confidence(), 1.0);
        assert_eq!(s.entropy(), 0.0);
    }

    #[test]
    fn test_entropy_extremes() {
        assert_eq!(vector_entropy(&[1.0, 0.0, 0.0, 0.0]), 0.0);
        assert!((vector_entropy(&[0.5, 0.5, 0.5, 0.5]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_orthogonal_and_parallel() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    fn vec_strategy() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-10.0f64..10.0, 1..32)
    }

    proptest! {
        #[test]
        fn prop_normalize_is_unit_or_zero(v in vec_strategy()) {
            let n = normalize(&v);
            if norm(&v) == 0.0 {
                prop_assert_eq!(n, v);
            } else {
                prop_assert!((norm(&n) - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_drift_self_is_zero(v in vec_strategy()) {
            let s = state(v);
            prop_assert_eq!(s.drift_to(&s), 0.0);
        }

        #[test]
        fn prop_drift_symmetric(a in vec_strategy(), b in vec_strategy()) {
            let (a, b) = (state(a), state(b));
            prop_assert!((a.drift_to(&b) - b.drift_to(&a)).abs() < 1e-12);
        }

        #[test]
        fn prop_blend_endpoints(v in prop::collection::vec(-10.0f64..10.0, 8)) {
            let a = state(v.clone());
            let b = state(v.iter().map(|x| x * -0.5 + 1.0).collect());
            let at0 = a.blend(&b, 0.0);
            let at1 = a.blend(&b, 1.0);
            for (x, y) in at0.vector.iter().zip(&a.vector) {
                prop_assert!((x - y).abs() < 1e-12);
            }
            for (x, y) in at1.vector.iter().zip(&b.vector) {
                prop_assert!((x - y).abs() < 1e-12);
            }
        }
    }
}
