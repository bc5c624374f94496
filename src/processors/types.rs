//! Enumerations that select decoding behaviour.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::errors::DetError;

/// Specifies the type of bounding box used for text detection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxType {
    /// Quadrilateral bounding box (4 points)
    #[default]
    Quad,
    /// Polygonal bounding box (variable number of points)
    Poly,
}

/// Specifies how a candidate region is scored against the probability map
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Mean of the map inside the candidate polygon
    #[default]
    Fast,
    /// Mean of the map along the traced contour
    Slow,
}

/// Destination size a decoded map is rescaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    /// Height in pixels.
    pub height: u32,
    /// Width in pixels.
    pub width: u32,
}

impl ImageShape {
    /// Creates a shape from height and width.
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

impl FromStr for BoxType {
    type Err = DetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quad" => Ok(BoxType::Quad),
            "poly" => Ok(BoxType::Poly),
            other => Err(DetError::config_error_with_context(
                "box_type",
                other,
                "expected 'quad' or 'poly'",
            )),
        }
    }
}

impl FromStr for ScoreMode {
    type Err = DetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fast" => Ok(ScoreMode::Fast),
            "slow" => Ok(ScoreMode::Slow),
            other => Err(DetError::config_error_with_context(
                "score_mode",
                other,
                "expected 'fast' or 'slow'",
            )),
        }
    }
}
