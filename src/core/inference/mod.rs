//! Inference backends for the detection network.
//!
//! Two engines implement [`InferenceEngine`]: [`CheckpointInfer`] runs the
//! network from a safetensors checkpoint with candle, and [`OrtInfer`] runs the
//! precompiled ONNX graph with ONNX Runtime. The predictor picks one at
//! construction and only talks to the trait afterwards.

pub mod checkpoint_infer;
pub mod device;
pub mod ort_infer;

pub use checkpoint_infer::CheckpointInfer;
pub use device::Device;
pub use ort_infer::OrtInfer;

use crate::core::Tensor4D;
use crate::core::errors::{DetError, DetResult};

/// Which backend produced an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Network built from checkpoint parameters and run with candle.
    Checkpoint,
    /// Precompiled graph run with ONNX Runtime.
    Compiled,
}

impl BackendKind {
    /// Short backend name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Checkpoint => "candle",
            BackendKind::Compiled => "onnxruntime",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw output of one forward pass.
///
/// Graphs exported with auxiliary heads return several maps; the probability
/// map is always the last one.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// The network produced a single map.
    Single(Tensor4D),
    /// The network produced several maps, in declaration order.
    Multiple(Vec<Tensor4D>),
}

impl ModelOutput {
    /// Selects the probability map: the only map, or the last of several.
    pub fn into_probability_map(self) -> DetResult<Tensor4D> {
        match self {
            ModelOutput::Single(map) => Ok(map),
            ModelOutput::Multiple(maps) => maps.into_iter().next_back().ok_or_else(|| {
                DetError::invalid_input("model returned an empty list of outputs")
            }),
        }
    }

    /// Wraps a list of outputs, collapsing a single element into `Single`.
    pub fn from_outputs(mut maps: Vec<Tensor4D>) -> Self {
        if maps.len() == 1
            && let Some(map) = maps.pop()
        {
            return ModelOutput::Single(map);
        }
        ModelOutput::Multiple(maps)
    }
}

/// A detection network that maps a normalized batch to probability maps.
pub trait InferenceEngine: Send + Sync {
    /// Runs one forward pass on a `(N, 3, H, W)` batch.
    fn infer(&self, input: &Tensor4D) -> DetResult<ModelOutput>;

    /// The backend behind this engine.
    fn backend(&self) -> BackendKind;

    /// Runs the network and returns the `(N, 1, h, w)` probability map.
    fn infer_probability_map(&self, input: &Tensor4D) -> DetResult<Tensor4D> {
        validate_input(input)?;
        let map = self.infer(input)?.into_probability_map()?;
        validate_probability_map(&map, input.shape()[0])?;
        Ok(map)
    }
}

/// Checks that a network input is a non-empty batch of 3-channel images.
pub fn validate_input(input: &Tensor4D) -> DetResult<()> {
    let shape = input.shape();
    if shape[0] == 0 || shape[1] != 3 || shape[2] == 0 || shape[3] == 0 {
        return Err(DetError::shape_mismatch(
            "network input",
            &[shape[0].max(1), 3, shape[2].max(1), shape[3].max(1)],
            shape,
        ));
    }
    Ok(())
}

/// Checks that a probability map has one channel and `batch` entries.
pub fn validate_probability_map(map: &Tensor4D, batch: usize) -> DetResult<()> {
    let shape = map.shape();
    if shape[0] != batch || shape[1] != 1 {
        return Err(DetError::shape_mismatch(
            "probability map",
            &[batch, 1, shape[2], shape[3]],
            shape,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    struct FixedEngine(ModelOutput);

    impl InferenceEngine for FixedEngine {
        fn infer(&self, _input: &Tensor4D) -> DetResult<ModelOutput> {
            Ok(self.0.clone())
        }

        fn backend(&self) -> BackendKind {
            BackendKind::Compiled
        }
    }

    #[test]
    fn test_multiple_outputs_select_last() {
        let first = Array4::<f32>::zeros((1, 1, 4, 4));
        let last = Array4::<f32>::ones((1, 1, 4, 4));
        let output = ModelOutput::Multiple(vec![first, last.clone()]);
        assert_eq!(output.into_probability_map().unwrap(), last);
    }

    #[test]
    fn test_empty_output_list_is_an_error() {
        assert!(ModelOutput::Multiple(Vec::new())
            .into_probability_map()
            .is_err());
    }

    #[test]
    fn test_from_outputs_collapses_single() {
        let map = Array4::<f32>::zeros((1, 1, 2, 2));
        assert!(matches!(
            ModelOutput::from_outputs(vec![map.clone()]),
            ModelOutput::Single(_)
        ));
        assert!(matches!(
            ModelOutput::from_outputs(vec![map.clone(), map]),
            ModelOutput::Multiple(_)
        ));
    }

    #[test]
    fn test_probability_map_shape_is_checked() {
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        let engine = FixedEngine(ModelOutput::Single(Array4::zeros((1, 2, 8, 8))));
        assert!(matches!(
            engine.infer_probability_map(&input),
            Err(DetError::ShapeMismatch { .. })
        ));

        let engine = FixedEngine(ModelOutput::Multiple(vec![
            Array4::zeros((1, 2, 8, 8)),
            Array4::zeros((1, 1, 8, 8)),
        ]));
        assert_eq!(
            engine.infer_probability_map(&input).unwrap().shape(),
            &[1, 1, 8, 8]
        );
    }

    #[test]
    fn test_input_must_have_three_channels() {
        let engine = FixedEngine(ModelOutput::Single(Array4::zeros((1, 1, 8, 8))));
        let gray = Array4::<f32>::zeros((1, 1, 8, 8));
        assert!(matches!(
            engine.infer_probability_map(&gray),
            Err(DetError::ShapeMismatch { .. })
        ));
    }
}
