//! # World Model Data Types
//!
//! DTOs shared by the predictor and the digital twin.
//!
//! Everything here is plain data and vector math; nothing does I/O.

pub mod latent;
pub mod action;
pub mod prediction;

pub use latent::{
    LatentState, LatentFeature, Modality,
    normalize, norm, rms_distance, lerp, cosine_similarity, vector_entropy,
};
pub use action::{Action, ActionType, ActionParams, ParamValue};
pub use prediction::{PredictedState, Trajectory};
