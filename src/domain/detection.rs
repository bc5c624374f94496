//! Detected text regions for one image.

use crate::core::errors::{DetError, DetResult};
use crate::processors::BoundingBox;
use serde::{Deserialize, Serialize};

/// Boxes and their confidence scores, index-aligned.
///
/// The fields are private so the two lists cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    boxes: Vec<BoundingBox>,
    scores: Vec<f32>,
}

impl DetectionResult {
    /// Pairs boxes with scores. Fails when the lengths differ.
    pub fn new(boxes: Vec<BoundingBox>, scores: Vec<f32>) -> DetResult<Self> {
        if boxes.len() != scores.len() {
            return Err(DetError::shape_mismatch(
                "detection boxes and scores",
                &[boxes.len()],
                &[scores.len()],
            ));
        }
        Ok(Self { boxes, scores })
    }

    /// Splits a decoded batch into one result per image.
    pub fn from_decoded(
        (boxes, scores): (Vec<Vec<BoundingBox>>, Vec<Vec<f32>>),
    ) -> DetResult<Vec<Self>> {
        if boxes.len() != scores.len() {
            return Err(DetError::shape_mismatch(
                "decoded batch",
                &[boxes.len()],
                &[scores.len()],
            ));
        }
        boxes
            .into_iter()
            .zip(scores)
            .map(|(b, s)| Self::new(b, s))
            .collect()
    }

    /// Keeps the detections whose score is strictly above `threshold`.
    pub fn filter_by_score(self, threshold: f32) -> Self {
        let (boxes, scores) = self
            .boxes
            .into_iter()
            .zip(self.scores)
            .filter(|(_, score)| *score > threshold)
            .unzip();
        Self { boxes, scores }
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Iterates over `(box, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&BoundingBox, f32)> {
        self.boxes.iter().zip(self.scores.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
