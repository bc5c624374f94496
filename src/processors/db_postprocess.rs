//! Post-processing for DB (Differentiable Binarization) text detection models.
//!
//! The [`DBPostProcess`] struct converts probability maps into polygons by
//! thresholding, contour extraction, scoring and unclipping. Bitmap decoding,
//! scoring and mask morphology live in helper modules next to this file.

#[path = "db_bitmap.rs"]
mod db_bitmap;
#[path = "db_mask.rs"]
mod db_mask;
#[path = "db_score.rs"]
mod db_score;

use crate::core::Tensor4D;
use crate::core::config::PostProcessConfig;
use crate::core::constants::*;
use crate::core::errors::{DetError, DetResult};
use crate::processors::geometry::BoundingBox;
use crate::processors::types::{BoxType, ImageShape, ScoreMode};
use image::{GrayImage, Luma};
use ndarray::{ArrayView2, Axis};
use tracing::debug;

/// Decoded polygons and their scores, one inner vector per image.
pub type DecodedBatch = (Vec<Vec<BoundingBox>>, Vec<Vec<f32>>);

/// Post-processor for DB (Differentiable Binarization) text detection models.
///
/// Holds only parameters. Every call works on its own buffers, so one instance
/// can decode any number of maps.
#[derive(Debug, Clone)]
pub struct DBPostProcess {
    /// Threshold for binarizing the prediction map (default: 0.3).
    pub thresh: f32,
    /// Minimum mean score of a kept candidate (default: 0.5).
    pub box_thresh: f32,
    /// Maximum number of contours considered (default: 1000).
    pub max_candidates: usize,
    /// Ratio for unclipping (expanding) polygons (default: 1.5).
    pub unclip_ratio: f32,
    /// Minimum short side of a candidate, in map pixels (default: 3.0).
    pub min_size: f32,
    /// Method for calculating the score of a candidate.
    pub score_mode: ScoreMode,
    /// Type of polygon to generate (quadrilateral or polygon).
    pub box_type: BoxType,
    /// Whether to dilate the binary mask before contour detection.
    pub use_dilation: bool,
}

impl Default for DBPostProcess {
    fn default() -> Self {
        Self::new(None, None, None, None, None, None, None)
    }
}

impl DBPostProcess {
    /// Creates a new `DBPostProcess` instance with optional overrides.
    pub fn new(
        thresh: Option<f32>,
        box_thresh: Option<f32>,
        max_candidates: Option<usize>,
        unclip_ratio: Option<f32>,
        use_dilation: Option<bool>,
        score_mode: Option<ScoreMode>,
        box_type: Option<BoxType>,
    ) -> Self {
        Self {
            thresh: thresh.unwrap_or(DEFAULT_THRESH),
            box_thresh: box_thresh.unwrap_or(DEFAULT_BOX_THRESH),
            max_candidates: max_candidates.unwrap_or(DEFAULT_MAX_CANDIDATES),
            unclip_ratio: unclip_ratio.unwrap_or(DEFAULT_UNCLIP_RATIO),
            min_size: DEFAULT_MIN_SIZE,
            score_mode: score_mode.unwrap_or_default(),
            box_type: box_type.unwrap_or_default(),
            use_dilation: use_dilation.unwrap_or(false),
        }
    }

    /// Builds a post-processor from its configuration section.
    pub fn from_config(config: &PostProcessConfig) -> Self {
        Self {
            thresh: config.thresh,
            box_thresh: config.box_thresh,
            max_candidates: config.max_candidates,
            unclip_ratio: config.unclip_ratio,
            min_size: config.min_size,
            score_mode: config.score_mode,
            box_type: config.box_type,
            use_dilation: config.use_dilation,
        }
    }

    /// Decodes maps using the spatial size of the network input as the destination.
    ///
    /// `original` is the preprocessed `(N, C, H, W)` batch; every image is
    /// rescaled to its `(H, W)`.
    pub fn decode(
        &self,
        original: &Tensor4D,
        preds: &Tensor4D,
        require_confidence: bool,
    ) -> DetResult<DecodedBatch> {
        let shape = original.shape();
        let height = to_u32(shape[2], "original height")?;
        let width = to_u32(shape[3], "original width")?;
        let img_shapes = vec![ImageShape::new(height, width); shape[0]];
        self.apply(preds, &img_shapes, require_confidence)
    }

    /// Decodes a batch of `(N, 1, h, w)` probability maps.
    ///
    /// Returns one list of polygons and one index-aligned list of scores per
    /// image, with coordinates rescaled to the matching entry of `img_shapes`.
    /// When `require_confidence` is false, scores are still reported but never
    /// used to drop a candidate.
    pub fn apply(
        &self,
        preds: &Tensor4D,
        img_shapes: &[ImageShape],
        require_confidence: bool,
    ) -> DetResult<DecodedBatch> {
        let shape = preds.shape();
        if shape[1] != 1 {
            return Err(DetError::shape_mismatch(
                "probability map",
                &[shape[0], 1, shape[2], shape[3]],
                shape,
            ));
        }
        if img_shapes.len() != shape[0] {
            return Err(DetError::shape_mismatch(
                "destination shapes per map",
                &[shape[0]],
                &[img_shapes.len()],
            ));
        }

        let mut all_boxes = Vec::with_capacity(img_shapes.len());
        let mut all_scores = Vec::with_capacity(img_shapes.len());

        for (batch_idx, dest) in img_shapes.iter().enumerate() {
            let pred = preds.index_axis(Axis(0), batch_idx);
            let pred = pred.index_axis(Axis(0), 0);

            let (boxes, scores) = self.process(&pred, *dest, require_confidence);
            debug!(image = batch_idx, detections = boxes.len(), "decoded probability map");
            all_boxes.push(boxes);
            all_scores.push(scores);
        }

        Ok((all_boxes, all_scores))
    }

    fn process(
        &self,
        pred: &ArrayView2<f32>,
        dest: ImageShape,
        require_confidence: bool,
    ) -> (Vec<BoundingBox>, Vec<f32>) {
        let (height, width) = pred.dim();
        if height == 0 || width == 0 {
            return (Vec::new(), Vec::new());
        }

        let bitmap = self.binarize(pred);
        let mask = if self.use_dilation {
            self.dilate_mask(&bitmap)
        } else {
            bitmap
        };

        match self.box_type {
            BoxType::Poly => self.polygons_from_bitmap(pred, &mask, dest, require_confidence),
            BoxType::Quad => self.boxes_from_bitmap(pred, &mask, dest, require_confidence),
        }
    }

    /// Foreground where `p > thresh`, stored as 255 in a gray mask.
    fn binarize(&self, pred: &ArrayView2<f32>) -> GrayImage {
        let (height, width) = pred.dim();
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            if pred[[y as usize, x as usize]] > self.thresh {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    /// Whether a candidate with `score` passes the decoding threshold.
    fn passes_box_thresh(&self, score: f32, require_confidence: bool) -> bool {
        !require_confidence || score + SCORE_EPSILON >= self.box_thresh
    }
}

fn to_u32(value: usize, what: &str) -> DetResult<u32> {
    u32::try_from(value).map_err(|_| DetError::invalid_input(format!("{what} {value} too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn square_map(size: usize, start: usize, end: usize, value: f32) -> Tensor4D {
        let mut map = Array4::<f32>::zeros((1, 1, size, size));
        for y in start..end {
            for x in start..end {
                map[[0, 0, y, x]] = value;
            }
        }
        map
    }

    #[test]
    fn test_zero_map_yields_no_detections() {
        let post = DBPostProcess::default();
        let preds = Array4::<f32>::zeros((1, 1, 64, 64));
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].is_empty());
        assert_eq!(boxes[0].len(), scores[0].len());
    }

    #[test]
    fn test_single_square_is_detected() {
        let post = DBPostProcess::default();
        let preds = square_map(64, 20, 44, 1.0);
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();

        assert_eq!(boxes[0].len(), 1);
        assert_eq!(scores[0].len(), 1);
        assert!(scores[0][0] > 0.9);

        // The traced border runs over pixels 20..=43, so the minimum-area box
        // has side 23 and is pushed out by 23 * 23 * 1.5 / 92 on every side.
        let delta = 23.0 * 23.0 * 1.5 / 92.0;
        let (lo, hi) = (20.0 - delta, 43.0 + delta);
        let expected = [(lo, lo), (hi, lo), (hi, hi), (lo, hi)];
        let quad = &boxes[0][0];
        assert_eq!(quad.points.len(), 4);
        for (corner, (x, y)) in quad.points.iter().zip(expected) {
            assert!(
                (corner.x - x).abs() < 0.5 && (corner.y - y).abs() < 0.5,
                "corner {corner:?} expected near ({x}, {y})"
            );
        }
    }

    #[test]
    fn test_map_above_thresh_everywhere_is_one_detection() {
        let post = DBPostProcess::default();
        let preds = Array4::<f32>::ones((1, 1, 32, 32));
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(32, 32)], true)
            .unwrap();

        assert_eq!(boxes[0].len(), 1);
        assert_eq!(scores[0].len(), 1);
        assert!(scores[0][0] > 0.9);
        // The unclipped box is clamped to the destination frame.
        let (min_x, min_y, max_x, max_y) = boxes[0][0].bounds().unwrap();
        assert_eq!((min_x, min_y), (0.0, 0.0));
        assert_eq!((max_x, max_y), (32.0, 32.0));
    }

    #[test]
    fn test_low_confidence_region_is_dropped_only_when_required() {
        let post = DBPostProcess::default();
        let preds = square_map(64, 20, 44, 0.4);
        let shapes = [ImageShape::new(64, 64)];

        let (strict, _) = post.apply(&preds, &shapes, true).unwrap();
        assert!(strict[0].is_empty());

        let (lenient, scores) = post.apply(&preds, &shapes, false).unwrap();
        assert_eq!(lenient[0].len(), 1);
        assert!((scores[0][0] - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_tiny_component_is_dropped() {
        let post = DBPostProcess::default();
        let preds = square_map(32, 10, 12, 1.0);
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(32, 32)], true)
            .unwrap();
        assert!(boxes[0].is_empty());
        assert!(scores[0].is_empty());
    }

    #[test]
    fn test_rescale_to_destination_and_back() {
        let post = DBPostProcess::default();
        let preds = square_map(64, 20, 44, 1.0);
        let (map_boxes, _) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();
        let (dest_boxes, _) = post
            .apply(&preds, &[ImageShape::new(128, 256)], true)
            .unwrap();

        let restored = dest_boxes[0][0].rescale(64.0 / 256.0, 64.0 / 128.0, 64.0, 64.0);
        for (a, b) in map_boxes[0][0].points.iter().zip(&restored.points) {
            assert!((a.x - b.x).abs() < 1e-3);
            assert!((a.y - b.y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        let post = DBPostProcess::default();
        let original = Array4::<f32>::zeros((1, 3, 64, 64));
        let preds = square_map(64, 8, 30, 0.9);
        let first = post.decode(&original, &preds, true).unwrap();
        let second = post.decode(&original, &preds, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_poly_mode_produces_polygon() {
        let post = DBPostProcess::new(None, None, None, None, None, None, Some(BoxType::Poly));
        let preds = square_map(64, 20, 44, 1.0);
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();
        assert_eq!(boxes[0].len(), 1);
        assert!(boxes[0][0].points.len() >= 4);
        assert!(scores[0][0] > 0.9);
    }

    #[test]
    fn test_slow_score_mode_averages_contour() {
        let post = DBPostProcess::new(None, None, None, None, None, Some(ScoreMode::Slow), None);
        let preds = square_map(64, 20, 44, 0.8);
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();
        assert_eq!(boxes[0].len(), 1);
        assert!((scores[0][0] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_dilation_grows_the_scored_region() {
        let post = DBPostProcess::new(None, None, None, None, Some(true), None, None);
        let preds = square_map(64, 20, 44, 0.8);
        let (boxes, scores) = post
            .apply(&preds, &[ImageShape::new(64, 64)], true)
            .unwrap();
        assert_eq!(boxes[0].len(), 1);
        // The dilated rectangle also covers a ring of zero background.
        assert!(scores[0][0] > 0.5 && scores[0][0] < 0.8);
    }

    #[test]
    fn test_rejects_multi_channel_maps() {
        let post = DBPostProcess::default();
        let preds = Array4::<f32>::zeros((1, 2, 16, 16));
        let err = post
            .apply(&preds, &[ImageShape::new(16, 16)], true)
            .unwrap_err();
        assert!(matches!(err, DetError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_mismatched_shape_count() {
        let post = DBPostProcess::default();
        let preds = Array4::<f32>::zeros((2, 1, 16, 16));
        assert!(post.apply(&preds, &[ImageShape::new(16, 16)], true).is_err());
    }
}
