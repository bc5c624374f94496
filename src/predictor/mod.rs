//! End-to-end prediction for a single image.

/// Text detection predictor using the DB (Differentiable Binarization) network
pub mod db_detector;

pub use db_detector::{DbPredictor, PredictionOutput};
