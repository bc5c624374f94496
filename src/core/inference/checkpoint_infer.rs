//! Candle engine that runs the detector from a safetensors checkpoint.

use crate::core::Tensor4D;
use crate::core::constants::CHECKPOINT_KEY_PREFIX;
use crate::core::errors::{DetError, DetResult};
use crate::core::inference::{BackendKind, Device, InferenceEngine, ModelOutput};
use crate::models::DbNet;
use candle_core::{DType, Module, Tensor};
use candle_nn::VarBuilder;
use ndarray::Array4;
use std::path::Path;
use tracing::info;

const BACKEND: &str = "candle";

/// Runs [`DbNet`] with parameters loaded from a checkpoint file.
#[derive(Debug)]
pub struct CheckpointInfer {
    model: DbNet,
    device: candle_core::Device,
}

impl CheckpointInfer {
    /// Memory-maps the checkpoint and builds the network on `device`.
    ///
    /// Parameters are expected under the `model.` key prefix.
    pub fn new(checkpoint_path: impl AsRef<Path>, device: Device) -> DetResult<Self> {
        let path = checkpoint_path.as_ref();
        if !path.exists() {
            return Err(DetError::model_load_error(
                path,
                "checkpoint not found",
                Some("pass --model_path pointing at a .safetensors checkpoint"),
                None::<std::io::Error>,
            ));
        }

        let device = device.effective();
        let candle_device = device.to_candle()?;
        // SAFETY: the file is only read and is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &candle_device)
        }
        .map_err(|e| {
            DetError::model_load_error(path, "failed to map checkpoint", None, Some(e))
        })?;

        let model = DbNet::load(vb.pp(CHECKPOINT_KEY_PREFIX)).map_err(|e| {
            DetError::model_load_error(
                path,
                "checkpoint does not match the detector layout",
                Some("expected ResNet-18 DBNet parameters under 'model.backbone', 'model.neck' and 'model.head'"),
                Some(e),
            )
        })?;

        info!(path = %path.display(), %device, "loaded detector checkpoint");
        Ok(Self {
            model,
            device: candle_device,
        })
    }

    /// Builds the engine from an already prepared variable builder.
    pub fn from_var_builder(vb: VarBuilder, device: candle_core::Device) -> DetResult<Self> {
        let model = DbNet::load(vb).map_err(|e| {
            DetError::model_load_error(
                "<variable builder>",
                "parameters do not match the detector layout",
                None,
                Some(e),
            )
        })?;
        Ok(Self { model, device })
    }

    fn to_candle(&self, x: &Tensor4D) -> DetResult<Tensor> {
        let (b, c, h, w) = x.dim();
        let data: Vec<f32> = x.iter().copied().collect();
        Tensor::from_vec(data, (b, c, h, w), &self.device).map_err(|e| {
            DetError::inference_error(BACKEND, "failed to upload input batch", e)
        })
    }

    fn to_ndarray(y: &Tensor) -> DetResult<Tensor4D> {
        let download = |e| DetError::inference_error(BACKEND, "failed to download output", e);
        let (b, c, h, w) = y.dims4().map_err(download)?;
        let data = y
            .to_device(&candle_core::Device::Cpu)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(download)?;
        Ok(Array4::from_shape_vec((b, c, h, w), data)?)
    }
}

impl InferenceEngine for CheckpointInfer {
    fn infer(&self, input: &Tensor4D) -> DetResult<ModelOutput> {
        let x = self.to_candle(input)?;
        let y = self.model.forward(&x).map_err(|e| {
            DetError::inference_error(
                BACKEND,
                &format!("forward pass failed for input {:?}", input.shape()),
                e,
            )
        })?;
        Ok(ModelOutput::Single(Self::to_ndarray(&y)?))
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Checkpoint
    }
}
