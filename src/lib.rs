//! # dbtext
//!
//! Text detection with DBNet (Differentiable Binarization). A pretrained
//! network turns an image into a per-pixel text probability map, and the map
//! is decoded into polygons with confidence scores.
//!
//! ## Features
//!
//! - Two inference backends behind one trait: a candle network built from a
//!   safetensors checkpoint, or a precompiled ONNX graph run with ONNX Runtime
//! - Probability map decoding into quadrilaterals or simplified polygons
//! - Fast (box mean) and slow (contour mean) confidence scoring
//! - Annotated output images with optional score labels
//! - TOML/JSON configuration
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors and inference engines
//! * [`domain`] - Detection result types
//! * [`models`] - The DBNet network for the checkpoint backend
//! * [`predictor`] - The end-to-end single image predictor
//! * [`processors`] - Preprocessing, decoding and geometry
//! * [`utils`] - Image I/O, drawing and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbtext::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PredictorConfig {
//!     device: "cpu".to_string(),
//!     ..Default::default()
//! };
//! let predictor = DbPredictor::from_config(config)?;
//! let output = predictor.predict(Path::new("page.jpg"))?;
//! for (polygon, score) in output.detections.iter() {
//!     println!("{score:.3} {:?}", polygon.points);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Decoding can also be used on its own:
//!
//! ```rust
//! use dbtext::processors::{DBPostProcess, ImageShape};
//! use ndarray::Array4;
//!
//! let maps = Array4::<f32>::zeros((1, 1, 32, 32));
//! let (boxes, scores) = DBPostProcess::default()
//!     .apply(&maps, &[ImageShape::new(32, 32)], true)
//!     .unwrap();
//! assert!(boxes[0].is_empty() && scores[0].is_empty());
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use dbtext::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::config::{ConfigLoader, PredictorConfig};
    pub use crate::core::{DetError, DetResult, Device, InferenceEngine};
    pub use crate::domain::DetectionResult;
    pub use crate::predictor::{DbPredictor, PredictionOutput};
    pub use crate::processors::{BoundingBox, DBPostProcess, Point};
    pub use crate::utils::load_image;
}
