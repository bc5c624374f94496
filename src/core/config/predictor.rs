//! Predictor configuration.
//!
//! A single [`PredictorConfig`] is built once (defaults, then an optional file,
//! then command-line overrides) and passed by reference to each stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigValidator;
use crate::core::constants::*;
use crate::core::errors::{DetError, DetResult};
use crate::processors::types::{BoxType, ScoreMode};
use crate::utils::visualization::VisualizationConfig;

/// Per-channel normalization constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Channel means in RGB order, on the `[0, 1]` scale.
    pub mean: Vec<f32>,
    /// Channel standard deviations in RGB order, on the `[0, 1]` scale.
    pub std: Vec<f32>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN.to_vec(),
            std: DEFAULT_STD.to_vec(),
        }
    }
}

impl ConfigValidator for NormalizationConfig {
    fn validate(&self) -> DetResult<()> {
        if self.mean.len() != 3 {
            return Err(DetError::config_error(
                "Mean must have exactly 3 elements for RGB",
            ));
        }
        if self.std.len() != 3 {
            return Err(DetError::config_error(
                "Std must have exactly 3 elements for RGB",
            ));
        }
        for (i, &s) in self.std.iter().enumerate() {
            self.validate_positive(&format!("std[{i}]"), s)?;
        }
        if let Some(m) = self.mean.iter().find(|m| !m.is_finite()) {
            return Err(DetError::config_error(format!("Mean value is not finite: {m}")));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Decoding parameters for the probability map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Binarization threshold.
    pub thresh: f32,
    /// Minimum mean confidence of a kept candidate.
    pub box_thresh: f32,
    /// Maximum number of contours examined per image.
    pub max_candidates: usize,
    /// Unclip expansion factor.
    pub unclip_ratio: f32,
    /// Minimum short side of a candidate, in map pixels.
    pub min_size: f32,
    /// How candidates are scored.
    pub score_mode: ScoreMode,
    /// Output polygon shape.
    pub box_type: BoxType,
    /// Whether to dilate the binary mask before tracing contours.
    pub use_dilation: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            thresh: DEFAULT_THRESH,
            box_thresh: DEFAULT_BOX_THRESH,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
            min_size: DEFAULT_MIN_SIZE,
            score_mode: ScoreMode::default(),
            box_type: BoxType::default(),
            use_dilation: false,
        }
    }
}

impl ConfigValidator for PostProcessConfig {
    fn validate(&self) -> DetResult<()> {
        self.validate_unit_interval("thresh", self.thresh)?;
        self.validate_unit_interval("box_thresh", self.box_thresh)?;
        self.validate_positive("unclip_ratio", self.unclip_ratio)?;
        if !self.min_size.is_finite() || self.min_size < 0.0 {
            return Err(DetError::config_error_with_context(
                "min_size",
                &self.min_size.to_string(),
                "must be a non-negative finite number",
            ));
        }
        if self.max_candidates == 0 {
            return Err(DetError::config_error_with_context(
                "max_candidates",
                "0",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Top-level configuration for [`crate::predictor::DbPredictor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Network input shape as `[channels, height, width]`.
    pub image_shape: [usize; 3],
    /// Directory that receives annotated images.
    pub save_dir: PathBuf,
    /// Checkpoint path. The compiled graph lives next to it with an `.onnx` extension.
    pub model_path: PathBuf,
    /// Device string: `cpu`, `cuda` or `cuda:N`.
    pub device: String,
    /// Run the precompiled graph instead of the checkpoint.
    pub use_jit: bool,
    /// Confidence a detection must strictly exceed to be drawn.
    pub threshold: f32,
    /// Input normalization.
    pub normalization: NormalizationConfig,
    /// Probability map decoding.
    pub postprocess: PostProcessConfig,
    /// Drawing options.
    pub visualization: VisualizationConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            image_shape: DEFAULT_IMAGE_SHAPE,
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            device: "cuda".to_string(),
            use_jit: false,
            threshold: DEFAULT_SCORE_THRESHOLD,
            normalization: NormalizationConfig::default(),
            postprocess: PostProcessConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Input height in pixels.
    pub fn input_height(&self) -> usize {
        self.image_shape[1]
    }

    /// Input width in pixels.
    pub fn input_width(&self) -> usize {
        self.image_shape[2]
    }

    /// Path of the precompiled graph derived from `model_path`.
    pub fn compiled_graph_path(&self) -> PathBuf {
        self.model_path.with_extension(COMPILED_GRAPH_EXTENSION)
    }
}

impl ConfigValidator for PredictorConfig {
    fn validate(&self) -> DetResult<()> {
        let [channels, height, width] = self.image_shape;
        if channels != 3 {
            return Err(DetError::config_error_with_context(
                "image_shape",
                &format!("{:?}", self.image_shape),
                "only 3-channel input is supported",
            ));
        }
        if height == 0 || width == 0 {
            return Err(DetError::config_error_with_context(
                "image_shape",
                &format!("{:?}", self.image_shape),
                "height and width must be greater than 0",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(DetError::config_error_with_context(
                "threshold",
                &self.threshold.to_string(),
                "must be finite",
            ));
        }
        self.normalization.validate()?;
        self.postprocess.validate()?;
        self.visualization.validate()?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
