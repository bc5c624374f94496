//! ONNX Runtime engine for the precompiled detection graph.

use crate::core::inference::Device;
use ort::{session::Session, value::ValueType};
use std::path::PathBuf;
use std::sync::Mutex;

#[path = "ort_infer_builders.rs"]
mod ort_infer_builders;
#[path = "ort_infer_execution.rs"]
mod ort_infer_execution;

/// Runs a serialized ONNX graph.
///
/// The session is behind a `Mutex` because `Session::run` needs exclusive access.
pub struct OrtInfer {
    pub(super) session: Mutex<Session>,
    pub(super) input_name: String,
    pub(super) output_names: Vec<String>,
    pub(super) input_shape: Option<Vec<i64>>,
    pub(super) model_path: PathBuf,
    pub(super) device: Device,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .field("input_shape", &self.input_shape)
            .field("model_path", &self.model_path)
            .field("device", &self.device)
            .finish()
    }
}

impl OrtInfer {
    fn tensor_shape(value_type: &ValueType) -> Option<Vec<i64>> {
        match value_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        }
    }
}
