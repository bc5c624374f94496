//! Geometric primitives used while decoding probability maps.
//!
//! Points, polygons and minimum-area rectangles, plus the scanline helper the
//! fast scorer uses to rasterize a polygon over the probability map.

use imageproc::contours::Contour;
use itertools::Itertools;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns true when both coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// An ordered, implicitly closed polygon in image space.
///
/// Quad detections carry four points ordered top-left, top-right, bottom-right,
/// bottom-left. Poly detections carry however many points the simplified
/// contour kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The polygon vertices.
    pub points: Vec<Point>,
}

impl BoundingBox {
    /// Creates a new polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates an axis-aligned rectangle from two corners.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ])
    }

    /// Creates a polygon from the border pixels of a traced contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Area by the shoelace formula. Zero for fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let twice: f32 = self
            .points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        twice.abs() / 2.0
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.distance(b))
            .sum()
    }

    /// Returns true when every vertex has finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let (min_x, max_x) = self.points.iter().map(|p| p.x).minmax().into_option()?;
        let (min_y, max_y) = self.points.iter().map(|p| p.y).minmax().into_option()?;
        Some((min_x, min_y, max_x, max_y))
    }

    /// Scales every vertex by `(scale_x, scale_y)` and clamps the result to
    /// `[0, max_x] x [0, max_y]`. Coordinates are not rounded.
    pub fn rescale(&self, scale_x: f32, scale_y: f32, max_x: f32, max_y: f32) -> BoundingBox {
        let points = self
            .points
            .iter()
            .map(|p| {
                Point::new(
                    (p.x * scale_x).clamp(0.0, max_x),
                    (p.y * scale_y).clamp(0.0, max_y),
                )
            })
            .collect();
        BoundingBox::new(points)
    }

    /// Convex hull by Graham scan. Collinear points are dropped.
    fn convex_hull(&self) -> BoundingBox {
        if self.points.len() < 3 {
            return self.clone();
        }

        let mut points = self.points.clone();

        // Pivot: lowest y, then lowest x.
        let pivot_idx = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.y.partial_cmp(&b.y)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        points.swap(0, pivot_idx);
        let pivot = points[0];

        points[1..].sort_by(|a, b| {
            let cross = Self::cross_product(&pivot, a, b);
            if cross == 0.0 {
                pivot
                    .distance(a)
                    .partial_cmp(&pivot.distance(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            } else if cross > 0.0 {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::with_capacity(points.len());
        for point in points {
            while hull.len() > 1
                && Self::cross_product(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }

        BoundingBox::new(hull)
    }

    /// Positive for a counter-clockwise turn p1 -> p2 -> p3, negative for clockwise.
    fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
        (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
    }

    /// Minimum-area enclosing rectangle.
    ///
    /// Runs rotating calipers over the convex hull: for each hull edge, all hull
    /// points are projected onto the edge direction and its normal and the
    /// smallest resulting box wins. Fewer than 3 points yields a zero rectangle;
    /// a collinear hull yields the axis-aligned bounds.
    pub fn get_min_area_rect(&self) -> MinAreaRect {
        if self.points.len() < 3 {
            return MinAreaRect::default();
        }

        let hull = self.convex_hull();
        let hull_points = &hull.points;

        if hull_points.len() < 3 {
            let Some((min_x, min_y, max_x, max_y)) = self.bounds() else {
                return MinAreaRect::default();
            };
            return MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            };
        }

        let mut min_area = f32::MAX;
        let mut min_rect = MinAreaRect::default();

        for (origin, next) in hull_points.iter().circular_tuple_windows() {
            let edge_x = next.x - origin.x;
            let edge_y = next.y - origin.y;
            let edge_length = (edge_x * edge_x + edge_y * edge_y).sqrt();
            if edge_length < f32::EPSILON {
                continue;
            }

            // Unit edge direction (nx, ny) and its normal (px, py).
            let nx = edge_x / edge_length;
            let ny = edge_y / edge_length;
            let px = -ny;
            let py = nx;

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;

            for point in hull_points {
                let dx = point.x - origin.x;
                let dy = point.y - origin.y;
                let proj_n = nx * dx + ny * dy;
                let proj_p = px * dx + py * dy;
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;

            if area < min_area {
                min_area = area;
                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;
                min_rect = MinAreaRect {
                    center: Point::new(
                        origin.x + center_n * nx + center_p * px,
                        origin.y + center_n * ny + center_p * py,
                    ),
                    width,
                    height,
                    angle: f32::atan2(ny, nx) * 180.0 / PI,
                };
            }
        }

        min_rect
    }

    /// Douglas-Peucker simplification with tolerance `epsilon`.
    ///
    /// Polygons with 2 or fewer points are returned unchanged.
    pub fn approx_poly_dp(&self, epsilon: f32) -> BoundingBox {
        if self.points.len() <= 2 {
            return self.clone();
        }

        let points = &self.points;
        let last = points.len() - 1;
        let mut keep = vec![false; points.len()];
        keep[0] = true;
        keep[last] = true;

        let mut stack = vec![(0usize, last)];
        while let Some((start, end)) = stack.pop() {
            if end - start <= 1 {
                continue;
            }

            let (max_index, max_dist) = ((start + 1)..end)
                .map(|i| {
                    (
                        i,
                        Self::point_to_line_distance(&points[i], &points[start], &points[end]),
                    )
                })
                .fold((start, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

            if max_dist > epsilon {
                keep[max_index] = true;
                stack.push((start, max_index));
                stack.push((max_index, end));
            }
        }

        let simplified = points
            .iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(*p))
            .collect();
        BoundingBox::new(simplified)
    }

    /// Perpendicular distance from `point` to the line through `line_start` and `line_end`.
    ///
    /// When the two line points coincide, falls back to the distance to that point.
    fn point_to_line_distance(point: &Point, line_start: &Point, line_end: &Point) -> f32 {
        let a = line_end.y - line_start.y;
        let b = line_start.x - line_end.x;
        let c = line_end.x * line_start.y - line_start.x * line_end.y;

        let denominator = (a * a + b * b).sqrt();
        if denominator == 0.0 {
            return point.distance(line_start);
        }

        (a * point.x + b * point.y + c).abs() / denominator
    }
}

/// A rotated rectangle: center, side lengths and rotation in degrees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinAreaRect {
    /// The center point of the rectangle.
    pub center: Point,
    /// Extent along the rotated x axis.
    pub width: f32,
    /// Extent along the rotated y axis.
    pub height: f32,
    /// The rotation angle of the rectangle in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// The four corners in rotation order, without any reordering.
    pub fn corners(&self) -> [Point; 4] {
        let (sin_a, cos_a) = (self.angle * PI / 180.0).sin_cos();
        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;

        [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Reusable intersection buffer for rasterizing a polygon one scanline at a time.
pub(crate) struct ScanlineBuffer {
    intersections: Vec<f32>,
}

impl ScanlineBuffer {
    /// Creates a buffer sized for polygons of up to `max_polygon_points` vertices.
    pub(crate) fn new(max_polygon_points: usize) -> Self {
        Self {
            intersections: Vec::with_capacity(max_polygon_points),
        }
    }

    /// Sums the map values inside `bbox` along the scanline at height `y`.
    ///
    /// Only columns in `[start_x, end_x)` are visited. Returns the summed value
    /// and the number of pixels that contributed.
    pub(crate) fn process_scanline(
        &mut self,
        y: f32,
        bbox: &BoundingBox,
        start_x: usize,
        end_x: usize,
        pred: &ArrayView2<f32>,
    ) -> (f32, usize) {
        self.intersections.clear();

        for (p1, p2) in bbox.points.iter().circular_tuple_windows() {
            if ((p1.y <= y && y < p2.y) || (p2.y <= y && y < p1.y))
                && (p2.y - p1.y).abs() > f32::EPSILON
            {
                self.intersections
                    .push(p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
            }
        }

        self.intersections
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let (rows, cols) = pred.dim();
        let row = y as usize;
        if row >= rows {
            return (0.0, 0);
        }

        let mut line_score = 0.0;
        let mut line_pixels = 0;
        for span in self.intersections.chunks_exact(2) {
            let x1 = span[0].max(start_x as f32) as usize;
            let x2 = (span[1].min(end_x as f32) as usize).min(cols);
            for x in x1..x2 {
                line_score += pred[[row, x]];
                line_pixels += 1;
            }
        }

        (line_score, line_pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_area_and_perimeter_of_rectangle() {
        let rect = BoundingBox::from_coords(0.0, 0.0, 10.0, 5.0);
        assert!((rect.area() - 50.0).abs() < 1e-4);
        assert!((rect.perimeter() - 30.0).abs() < 1e-4);
        assert_eq!(BoundingBox::new(vec![Point::new(1.0, 1.0)]).area(), 0.0);
    }

    #[test]
    fn test_min_area_rect_of_rotated_square() {
        // A diamond with side length sqrt(2) * 10.
        let diamond = BoundingBox::new(vec![
            Point::new(10.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 20.0),
            Point::new(0.0, 10.0),
        ]);
        let rect = diamond.get_min_area_rect();
        let expected_side = 200.0f32.sqrt();
        assert!((rect.width - expected_side).abs() < 1e-3);
        assert!((rect.height - expected_side).abs() < 1e-3);
        assert!((rect.center.x - 10.0).abs() < 1e-3);
        assert!((rect.center.y - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_area_rect_of_collinear_points() {
        let line = BoundingBox::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ]);
        let rect = line.get_min_area_rect();
        assert_eq!(rect.min_side(), 0.0);
    }

    #[test]
    fn test_approx_poly_dp_drops_points_on_straight_edges() {
        let chain = BoundingBox::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let simplified = chain.approx_poly_dp(0.5);
        assert_eq!(simplified.points.len(), 4);
        assert_eq!(simplified.points[0], Point::new(0.0, 0.0));
        assert_eq!(simplified.points[1], Point::new(10.0, 0.0));
    }

    #[test]
    fn test_rescale_clamps_without_rounding() {
        let bbox = BoundingBox::new(vec![Point::new(1.25, 3.5), Point::new(90.0, -4.0)]);
        let scaled = bbox.rescale(2.0, 0.5, 100.0, 100.0);
        assert_eq!(scaled.points[0], Point::new(2.5, 1.75));
        assert_eq!(scaled.points[1], Point::new(100.0, 0.0));
    }

    #[test]
    fn test_scanline_counts_pixels_inside_polygon() {
        let pred = Array2::<f32>::ones((10, 10));
        let bbox = BoundingBox::from_coords(2.0, 2.0, 6.0, 6.0);
        let mut buffer = ScanlineBuffer::new(4);
        let (score, pixels) = buffer.process_scanline(3.5, &bbox, 0, 10, &pred.view());
        assert_eq!(pixels, 4);
        assert!((score - 4.0).abs() < 1e-6);

        let (_, outside) = buffer.process_scanline(8.5, &bbox, 0, 10, &pred.view());
        assert_eq!(outside, 0);
    }
}
