use super::DBPostProcess;
use crate::core::constants::PARALLEL_SCORE_PIXEL_THRESHOLD;
use crate::processors::geometry::{BoundingBox, ScanlineBuffer};
use imageproc::contours::Contour;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Pixel rectangle `[start_y, end_y) x [start_x, end_x)` enclosing a polygon.
#[derive(Debug, Clone, Copy)]
struct Region {
    start_y: usize,
    end_y: usize,
    start_x: usize,
    end_x: usize,
}

impl Region {
    /// Bounding pixels of `bbox`, clamped to a `height x width` map.
    fn enclosing(bbox: &BoundingBox, height: usize, width: usize) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = bbox.bounds()?;
        let clamp_x = |v: f32| v.clamp(0.0, width as f32 - 1.0) as usize;
        let clamp_y = |v: f32| v.clamp(0.0, height as f32 - 1.0) as usize;

        Some(Self {
            start_y: clamp_y(min_y),
            end_y: clamp_y(max_y) + 1,
            start_x: clamp_x(min_x),
            end_x: clamp_x(max_x) + 1,
        })
    }

    fn area(&self) -> usize {
        (self.end_y - self.start_y) * (self.end_x - self.start_x)
    }
}

impl DBPostProcess {
    /// Mean of the map over the pixels whose centers fall inside `bbox`.
    ///
    /// Regions of at least 8000 pixels are rasterized with one rayon task per
    /// scanline. Partial sums are combined in scanline order either way, so both
    /// paths produce the same value.
    pub fn box_score_fast(&self, pred: &ArrayView2<f32>, bbox: &BoundingBox) -> f32 {
        let (height, width) = pred.dim();
        if height == 0 || width == 0 || !bbox.is_finite() {
            return 0.0;
        }
        let Some(region) = Region::enclosing(bbox, height, width) else {
            return 0.0;
        };

        let max_polygon_points = bbox.points.len();
        let rows: Vec<(f32, usize)> = if region.area() < PARALLEL_SCORE_PIXEL_THRESHOLD {
            let mut buffer = ScanlineBuffer::new(max_polygon_points);
            (region.start_y..region.end_y)
                .map(|y| {
                    buffer.process_scanline(y as f32 + 0.5, bbox, region.start_x, region.end_x, pred)
                })
                .collect()
        } else {
            (region.start_y..region.end_y)
                .into_par_iter()
                .map(|y| {
                    let mut buffer = ScanlineBuffer::new(max_polygon_points);
                    buffer.process_scanline(y as f32 + 0.5, bbox, region.start_x, region.end_x, pred)
                })
                .collect()
        };

        mean_of(&rows)
    }

    /// Mean of the map sampled at the contour pixels.
    pub(super) fn box_score_slow(&self, pred: &ArrayView2<f32>, contour: &Contour<u32>) -> f32 {
        let (height, width) = pred.dim();
        let samples: Vec<(f32, usize)> = contour
            .points
            .iter()
            .map(|p| (p.x as usize, p.y as usize))
            .filter(|&(x, y)| y < height && x < width)
            .map(|(x, y)| (pred[[y, x]], 1))
            .collect();

        mean_of(&samples)
    }
}

fn mean_of(partials: &[(f32, usize)]) -> f32 {
    let (total, count) = partials
        .iter()
        .fold((0.0f32, 0usize), |(s, n), &(ds, dn)| (s + ds, n + dn));
    if count > 0 { total / count as f32 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_fast_score_is_mean_inside_polygon() {
        let mut pred = Array2::<f32>::zeros((20, 20));
        for y in 0..20 {
            for x in 0..10 {
                pred[[y, x]] = 1.0;
            }
        }
        let post = DBPostProcess::default();
        // Half of the box lies on ones, half on zeros.
        let bbox = BoundingBox::from_coords(5.0, 5.0, 15.0, 15.0);
        let score = post.box_score_fast(&pred.view(), &bbox);
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parallel_and_sequential_paths_agree() {
        let pred = Array2::from_shape_fn((200, 200), |(y, x)| ((x * 31 + y * 17) % 100) as f32 / 100.0);
        let post = DBPostProcess::default();

        let large = BoundingBox::from_coords(10.0, 10.0, 190.0, 190.0);
        let score = post.box_score_fast(&pred.view(), &large);

        let mut buffer = ScanlineBuffer::new(4);
        let rows: Vec<(f32, usize)> = (10..191)
            .map(|y| buffer.process_scanline(y as f32 + 0.5, &large, 10, 191, &pred.view()))
            .collect();
        assert_eq!(score, mean_of(&rows));
    }

    #[test]
    fn test_fast_score_outside_map_is_zero() {
        let pred = Array2::<f32>::ones((8, 8));
        let post = DBPostProcess::default();
        let empty = BoundingBox::new(Vec::new());
        assert_eq!(post.box_score_fast(&pred.view(), &empty), 0.0);
    }
}
