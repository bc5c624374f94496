//! DB (Differentiable Binarization) text detector.
//!
//! [`DbPredictor`] wires the pipeline together: load the image, resize and
//! normalize it, run the network, decode the probability map into polygons,
//! drop detections at or below the score threshold, draw the survivors on the
//! denormalized input and write the result to `{save_dir}/{file name}`.

use crate::core::config::{ConfigValidator, PredictorConfig};
use crate::core::errors::{DetError, DetResult};
use crate::core::inference::{CheckpointInfer, Device, InferenceEngine, OrtInfer};
use crate::domain::DetectionResult;
use crate::processors::{DBPostProcess, DetPreprocessor};
use crate::utils::visualization::Visualizer;
use crate::utils::{load_image, save_image};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

/// What one call to [`DbPredictor::predict`] produced.
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    /// Where the annotated image was written.
    pub output_path: PathBuf,
    /// Detections that passed the score threshold.
    pub detections: DetectionResult,
    /// Wall time of the forward pass alone.
    pub inference_time: Duration,
}

/// Single-image text detection predictor.
///
/// The inference backend is fixed at construction. Every call to
/// [`predict`](Self::predict) is independent of the previous ones.
pub struct DbPredictor {
    config: PredictorConfig,
    preprocessor: DetPreprocessor,
    postprocess: DBPostProcess,
    visualizer: Visualizer,
    engine: Box<dyn InferenceEngine>,
}

impl DbPredictor {
    /// Builds the predictor and loads the backend chosen by `use_jit`.
    ///
    /// With `use_jit` the ONNX graph next to `model_path` is loaded, otherwise
    /// the safetensors checkpoint at `model_path` itself.
    pub fn from_config(config: PredictorConfig) -> DetResult<Self> {
        config.validate()?;
        let device: Device = config.device.parse()?;

        let engine: Box<dyn InferenceEngine> = if config.use_jit {
            Box::new(OrtInfer::new(config.compiled_graph_path(), device)?)
        } else {
            Box::new(CheckpointInfer::new(&config.model_path, device)?)
        };
        Self::with_engine(config, engine)
    }

    /// Builds the predictor around an already constructed engine.
    pub fn with_engine(
        config: PredictorConfig,
        engine: Box<dyn InferenceEngine>,
    ) -> DetResult<Self> {
        config.validate()?;
        let preprocessor = DetPreprocessor::new(
            config.input_height(),
            config.input_width(),
            &config.normalization,
        )?;
        let postprocess = DBPostProcess::from_config(&config.postprocess);
        let visualizer = Visualizer::new(config.visualization.clone())?;

        info!(
            backend = %engine.backend(),
            height = config.input_height(),
            width = config.input_width(),
            "detector ready"
        );
        Ok(Self {
            config,
            preprocessor,
            postprocess,
            visualizer,
            engine,
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Runs the full pipeline on the image at `image_path`.
    ///
    /// A missing image fails with `NotFound` before the network runs.
    pub fn predict(&self, image_path: &Path) -> DetResult<PredictionOutput> {
        let span = info_span!("prediction", image = %image_path.display());
        let _guard = span.enter();

        let image = load_image(image_path)?;
        debug!(width = image.width(), height = image.height(), "loaded image");
        let batch = self.preprocessor.apply(&image)?;

        let start = Instant::now();
        let maps = self.engine.infer_probability_map(&batch)?;
        let inference_time = start.elapsed();
        info!(
            "Runtime of {}: {:.4}s",
            self.engine.backend(),
            inference_time.as_secs_f64()
        );

        let decoded = self.postprocess.decode(&batch, &maps, true)?;
        let detections = DetectionResult::from_decoded(decoded)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let candidates = detections.len();
        let detections = detections.filter_by_score(self.config.threshold);
        debug!(candidates, kept = detections.len(), "filtered detections");

        let canvas = self.preprocessor.denormalize(&batch, 0)?;
        let annotated = self.visualizer.draw(&canvas, &detections);

        let output_path = self.output_path_for(image_path)?;
        std::fs::create_dir_all(&self.config.save_dir).map_err(|e| {
            DetError::io_error(
                format!("creating {}", self.config.save_dir.display()),
                e,
            )
        })?;
        save_image(&annotated, &output_path)?;
        info!(
            path = %output_path.display(),
            detections = detections.len(),
            "saved prediction"
        );

        Ok(PredictionOutput {
            output_path,
            detections,
            inference_time,
        })
    }

    fn output_path_for(&self, image_path: &Path) -> DetResult<PathBuf> {
        let file_name = image_path.file_name().ok_or_else(|| {
            DetError::invalid_input(format!(
                "image path {} has no file name",
                image_path.display()
            ))
        })?;
        Ok(self.config.save_dir.join(file_name))
    }
}
