use crate::core::constants::GEOMETRY_EPSILON;
use crate::processors::geometry::{BoundingBox, Point};
use crate::processors::types::{ImageShape, ScoreMode};
use clipper2::{EndType, JoinType, Path as ClipperPath};
use image::{GrayImage, imageops};
use imageproc::contours::{Contour, find_contours};
use ndarray::ArrayView2;
use std::cmp::Ordering;

use super::DBPostProcess;

/// Scale factors from map resolution to a destination shape.
#[derive(Debug, Clone, Copy)]
struct Rescale {
    scale_x: f32,
    scale_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Rescale {
    fn new(bitmap: &GrayImage, dest: ImageShape) -> Self {
        Self {
            scale_x: dest.width as f32 / bitmap.width() as f32,
            scale_y: dest.height as f32 / bitmap.height() as f32,
            max_x: dest.width as f32,
            max_y: dest.height as f32,
        }
    }

    fn apply(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.rescale(self.scale_x, self.scale_y, self.max_x, self.max_y)
    }
}

impl DBPostProcess {
    /// Poly mode: each contour is simplified, scored, unclipped and kept as a polygon.
    pub(super) fn polygons_from_bitmap(
        &self,
        pred: &ArrayView2<f32>,
        bitmap: &GrayImage,
        dest: ImageShape,
        require_confidence: bool,
    ) -> (Vec<BoundingBox>, Vec<f32>) {
        let rescale = Rescale::new(bitmap, dest);
        let mut boxes = Vec::new();
        let mut scores = Vec::new();

        for contour in trace_contours(bitmap)
            .into_iter()
            .take(self.max_candidates)
        {
            if contour.points.len() < 4 {
                continue;
            }

            let bbox = BoundingBox::from_contour(&contour);
            let approx = bbox.approx_poly_dp(0.002 * bbox.perimeter());
            if approx.points.len() < 4 {
                continue;
            }

            let score = self.candidate_score(pred, &approx, &contour);
            if !self.passes_box_thresh(score, require_confidence) {
                continue;
            }

            let Some(unclipped) = self.unclip(&approx) else {
                continue;
            };
            let Some((_, short_side)) = Self::mini_box(&unclipped.points) else {
                continue;
            };
            if short_side + GEOMETRY_EPSILON < self.min_size + 2.0 {
                continue;
            }

            boxes.push(rescale.apply(&unclipped));
            scores.push(score);
        }

        (boxes, scores)
    }

    /// Quad mode: each contour becomes an ordered four-point rectangle.
    pub(super) fn boxes_from_bitmap(
        &self,
        pred: &ArrayView2<f32>,
        bitmap: &GrayImage,
        dest: ImageShape,
        require_confidence: bool,
    ) -> (Vec<BoundingBox>, Vec<f32>) {
        let rescale = Rescale::new(bitmap, dest);
        let mut boxes = Vec::new();
        let mut scores = Vec::new();

        for contour in trace_contours(bitmap)
            .into_iter()
            .take(self.max_candidates)
        {
            let Some((corners, short_side)) = Self::mini_box_from_contour(&contour) else {
                continue;
            };
            if short_side + GEOMETRY_EPSILON < self.min_size {
                continue;
            }
            let mini_box = BoundingBox::new(corners);

            let score = self.candidate_score(pred, &mini_box, &contour);
            if !self.passes_box_thresh(score, require_confidence) {
                continue;
            }

            let Some(unclipped) = self.unclip(&mini_box) else {
                continue;
            };
            let Some((corners, short_side)) = Self::mini_box(&unclipped.points) else {
                continue;
            };
            if short_side + GEOMETRY_EPSILON < self.min_size + 2.0 {
                continue;
            }

            boxes.push(rescale.apply(&BoundingBox::new(corners)));
            scores.push(score);
        }

        (boxes, scores)
    }

    fn candidate_score(
        &self,
        pred: &ArrayView2<f32>,
        polygon: &BoundingBox,
        contour: &Contour<u32>,
    ) -> f32 {
        match self.score_mode {
            ScoreMode::Fast => self.box_score_fast(pred, polygon),
            ScoreMode::Slow => self.box_score_slow(pred, contour),
        }
    }

    /// Minimum-area rectangle of a traced contour.
    ///
    /// The contour is first reduced to its turning points, which leaves the
    /// hull unchanged and keeps the caliper loop short.
    fn mini_box_from_contour(contour: &Contour<u32>) -> Option<(Vec<Point>, f32)> {
        let points = BoundingBox::from_contour(contour).points;
        let simplified = Self::simplify_chain_points(&points);
        Self::mini_box(&simplified)
    }

    /// Ordered corners and short side of the minimum-area rectangle of `points`.
    ///
    /// `None` for fewer than 3 points or a degenerate rectangle.
    fn mini_box(points: &[Point]) -> Option<(Vec<Point>, f32)> {
        if points.len() < 3 {
            return None;
        }

        let rect = BoundingBox::new(points.to_vec()).get_min_area_rect();
        let short_side = rect.min_side();
        if !short_side.is_finite() || short_side <= GEOMETRY_EPSILON {
            return None;
        }

        Some((Self::order_corners(rect.corners()), short_side))
    }

    /// Keeps only the points where the chain changes direction.
    fn simplify_chain_points(points: &[Point]) -> Vec<Point> {
        let n = points.len();
        if n <= 2 {
            return points.to_vec();
        }

        let step = |from: &Point, to: &Point| {
            (
                (to.x - from.x).partial_cmp(&0.0),
                (to.y - from.y).partial_cmp(&0.0),
            )
        };

        let turning: Vec<Point> = (0..n)
            .filter(|&i| {
                let prev = &points[(i + n - 1) % n];
                let curr = &points[i];
                let next = &points[(i + 1) % n];
                step(prev, curr) != step(curr, next)
            })
            .map(|i| points[i])
            .collect();

        if turning.len() < 3 {
            points.to_vec()
        } else {
            turning
        }
    }

    /// Orders rectangle corners as top-left, top-right, bottom-right, bottom-left.
    ///
    /// Corners are sorted by x; of the two leftmost the upper one is top-left,
    /// of the two rightmost the upper one is top-right.
    fn order_corners(corners: [Point; 4]) -> Vec<Point> {
        let mut points = corners;
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        let (top_left, bottom_left) = if points[1].y > points[0].y {
            (points[0], points[1])
        } else {
            (points[1], points[0])
        };
        let (top_right, bottom_right) = if points[3].y > points[2].y {
            (points[2], points[3])
        } else {
            (points[3], points[2])
        };

        vec![top_left, top_right, bottom_right, bottom_left]
    }

    /// Offsets `bbox` outward by `area * unclip_ratio / perimeter` with round joins.
    ///
    /// `None` unless the offset yields exactly one path with at least 3 points.
    fn unclip(&self, bbox: &BoundingBox) -> Option<BoundingBox> {
        if bbox.points.len() < 3 {
            return None;
        }

        let area = bbox.area() as f64;
        let perimeter = bbox.perimeter() as f64;
        if area <= GEOMETRY_EPSILON as f64 || perimeter <= GEOMETRY_EPSILON as f64 {
            return None;
        }
        let delta = area * self.unclip_ratio as f64 / perimeter;

        let clipper_path: ClipperPath = bbox
            .points
            .iter()
            .map(|point| (point.x as f64, point.y as f64))
            .collect::<Vec<_>>()
            .into();

        let offset_paths = clipper_path.inflate(delta, JoinType::Round, EndType::Polygon, 2.0);
        if offset_paths.len() != 1 {
            return None;
        }
        let path = offset_paths.into_iter().next()?;

        let mut points: Vec<Point> = path
            .iter()
            .map(|pt| Point::new(pt.x() as f32, pt.y() as f32))
            .collect();

        // Drop a repeated closing vertex.
        if points.len() > 1
            && let (Some(first), Some(last)) = (points.first(), points.last())
            && first.distance(last) < f32::EPSILON
        {
            points.pop();
        }

        (points.len() >= 3).then(|| BoundingBox::new(points))
    }
}

/// Outer and hole contours of `mask` in mask coordinates.
///
/// The tracer starts from a background pixel, so the mask is traced inside a
/// one pixel zero border. Without it a mask that is foreground everywhere has
/// no contour at all.
fn trace_contours(mask: &GrayImage) -> Vec<Contour<u32>> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut padded = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut padded, mask, 1, 1);

    let mut contours = find_contours::<u32>(&padded);
    for contour in &mut contours {
        for point in &mut contour.points {
            point.x = point.x.saturating_sub(1).min(width - 1);
            point.y = point.y.saturating_sub(1).min(height - 1);
        }
    }
    contours
}
