use super::*;
use crate::core::errors::{DetError, DetResult};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use std::path::Path;
use tracing::{debug, info};

impl OrtInfer {
    /// Loads the graph at `model_path` and registers the providers for `device`.
    ///
    /// Without the `cuda` feature a CUDA request runs on the CPU provider.
    pub fn new(model_path: impl AsRef<Path>, device: Device) -> DetResult<Self> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(DetError::model_load_error(
                path,
                "compiled graph not found",
                Some("export the checkpoint to ONNX next to it with the same file stem"),
                None::<std::io::Error>,
            ));
        }

        let device = device.effective();
        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .with_execution_providers(Self::execution_providers(device))?
            .commit_from_file(path)
            .map_err(|e| {
                DetError::model_load_error(
                    path,
                    "failed to create ONNX session",
                    Some("verify model path and compatibility with selected execution providers"),
                    Some(e),
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| {
                DetError::model_load_error(
                    path,
                    "graph declares no inputs",
                    None,
                    None::<std::io::Error>,
                )
            })?;
        let input_shape = session
            .inputs
            .first()
            .and_then(|input| Self::tensor_shape(&input.input_type));
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        if output_names.is_empty() {
            return Err(DetError::model_load_error(
                path,
                "graph declares no outputs",
                None,
                None::<std::io::Error>,
            ));
        }

        info!(
            path = %path.display(),
            %device,
            input = %input_name,
            outputs = output_names.len(),
            "loaded ONNX graph"
        );
        debug!(?input_shape, ?output_names, "graph signature");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
            input_shape,
            model_path: path.to_path_buf(),
            device,
        })
    }

    fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();
        #[cfg(feature = "cuda")]
        if let Device::Cuda(ordinal) = device {
            providers.push(
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(ordinal as i32)
                    .build(),
            );
        }
        #[cfg(not(feature = "cuda"))]
        let _ = device;
        providers.push(ort::execution_providers::CPUExecutionProvider::default().build());
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_graph_reports_model_load() {
        let err = OrtInfer::new("does/not/exist/best.onnx", Device::Cpu).unwrap_err();
        assert!(matches!(err, DetError::ModelLoad { .. }));
        assert!(err.to_string().contains("best.onnx"));
    }

    #[test]
    fn test_cpu_provider_is_always_registered() {
        assert_eq!(OrtInfer::execution_providers(Device::Cpu).len(), 1);
    }
}
