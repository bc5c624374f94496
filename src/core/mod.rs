//! The core module of the detection pipeline.
//!
//! This module contains:
//! - Configuration structures and loading
//! - Constants used throughout the pipeline
//! - Error handling
//! - Inference engine integration
//!
//! It also re-exports the types most callers need.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

/// A 4D host tensor laid out `(N, C, H, W)`.
pub type Tensor4D = ndarray::Array4<f32>;

pub use config::{ConfigLoader, ConfigValidator, PredictorConfig};
pub use constants::*;
pub use errors::{DetError, DetResult};
pub use inference::{BackendKind, CheckpointInfer, Device, InferenceEngine, ModelOutput, OrtInfer};
pub use crate::utils::init_tracing;
