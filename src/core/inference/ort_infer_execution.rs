use super::*;
use crate::core::Tensor4D;
use crate::core::errors::{DetError, DetResult, OpaqueError};
use crate::core::inference::{BackendKind, InferenceEngine, ModelOutput};
use ndarray::ArrayView4;
use ort::value::TensorRef;

const BACKEND: &str = "onnxruntime";

impl OrtInfer {
    /// Runs the graph and returns every output in declaration order.
    pub fn run_all(&self, x: &Tensor4D) -> DetResult<Vec<Tensor4D>> {
        if let Some(declared) = self.input_shape.as_deref() {
            check_static_dims(declared, x.shape())?;
        }

        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            DetError::inference_error(
                BACKEND,
                &format!("failed to convert input tensor with shape {:?}", x.shape()),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session = self.session.lock().map_err(|_| {
            DetError::inference_error(
                BACKEND,
                "failed to acquire session lock",
                OpaqueError("session mutex poisoned".to_string()),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            DetError::inference_error(
                BACKEND,
                &format!("forward pass failed for input '{}'", self.input_name),
                e,
            )
        })?;

        self.output_names
            .iter()
            .map(|name| {
                let (shape, data) = outputs[name.as_str()]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| {
                        DetError::inference_error(
                            BACKEND,
                            &format!("failed to extract output '{name}' as f32"),
                            e,
                        )
                    })?;
                to_tensor4(name, shape, data)
            })
            .collect()
    }
}

/// Rejects an input that contradicts a static dimension declared by the graph.
///
/// Declared dimensions that are zero or negative are dynamic and match anything.
fn check_static_dims(declared: &[i64], actual: &[usize]) -> DetResult<()> {
    let mismatch = declared.len() != actual.len()
        || declared
            .iter()
            .zip(actual)
            .any(|(&d, &a)| d > 0 && d as usize != a);
    if mismatch {
        let expected: Vec<usize> = declared.iter().map(|&d| d.max(0) as usize).collect();
        return Err(DetError::shape_mismatch("graph input", &expected, actual));
    }
    Ok(())
}

fn to_tensor4(name: &str, shape: &[i64], data: &[f32]) -> DetResult<Tensor4D> {
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    if dims.len() != 4 {
        return Err(DetError::shape_mismatch(
            format!("output '{name}'"),
            &[0, 1, 0, 0],
            &dims,
        ));
    }
    let view = ArrayView4::from_shape((dims[0], dims[1], dims[2], dims[3]), data)?;
    Ok(view.to_owned())
}

impl InferenceEngine for OrtInfer {
    fn infer(&self, input: &Tensor4D) -> DetResult<ModelOutput> {
        Ok(ModelOutput::from_outputs(self.run_all(input)?))
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_dims_accept_matching_input() {
        assert!(check_static_dims(&[1, 3, 640, 640], &[1, 3, 640, 640]).is_ok());
    }

    #[test]
    fn test_static_dims_reject_contradicting_input() {
        let err = check_static_dims(&[1, 3, 640, 640], &[1, 3, 320, 640]).unwrap_err();
        match err {
            DetError::ShapeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, vec![1, 3, 640, 640]);
                assert_eq!(actual, vec![1, 3, 320, 640]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_static_dims(&[1, 3, 640], &[1, 3, 640, 640]).is_err());
    }

    #[test]
    fn test_dynamic_dims_match_any_size() {
        assert!(check_static_dims(&[-1, 3, -1, -1], &[2, 3, 480, 800]).is_ok());
        assert!(check_static_dims(&[-1, 3, -1, -1], &[1, 1, 480, 800]).is_err());
    }

    #[test]
    fn test_to_tensor4_requires_four_dims() {
        let data = vec![0.0f32; 6];
        assert!(to_tensor4("maps", &[2, 3], &data).is_err());
        let tensor = to_tensor4("maps", &[1, 1, 2, 3], &data).unwrap();
        assert_eq!(tensor.shape(), &[1, 1, 2, 3]);
    }

    #[test]
    fn test_to_tensor4_rejects_short_buffers() {
        let data = vec![0.0f32; 5];
        assert!(matches!(
            to_tensor4("maps", &[1, 1, 2, 3], &data),
            Err(DetError::Tensor(_))
        ));
    }
}
