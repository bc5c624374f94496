//! Drawing detection results.
//!
//! Polygons are drawn as closed outlines on a copy of the input image. Score
//! labels are optional and need a TrueType font, either configured through
//! `font_path` or found among common system font locations.
//!
//! # Examples
//!
//! ```rust
//! use dbtext::processors::BoundingBox;
//! use dbtext::utils::visualization::{VisualizationConfig, draw_polygons};
//! use image::RgbImage;
//!
//! let image = RgbImage::new(64, 64);
//! let boxes = vec![BoundingBox::from_coords(8.0, 8.0, 40.0, 24.0)];
//! let annotated = draw_polygons(&image, &boxes, &VisualizationConfig::default());
//! assert_eq!(annotated.dimensions(), image.dimensions());
//! ```

use crate::core::config::ConfigValidator;
use crate::core::errors::{DetError, DetResult};
use crate::domain::DetectionResult;
use crate::processors::BoundingBox;

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SYSTEM_FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Styling of the annotated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Outline color as RGB.
    pub color: [u8; 3],
    /// Outline thickness in pixels.
    pub thickness: u32,
    /// Draw the score next to each polygon. Needs a font.
    pub show_scores: bool,
    /// TrueType font for score labels. When unset, system fonts are tried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    /// Label height in pixels.
    pub font_scale: f32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            thickness: 2,
            show_scores: false,
            font_path: None,
            font_scale: 16.0,
        }
    }
}

impl ConfigValidator for VisualizationConfig {
    fn validate(&self) -> DetResult<()> {
        if self.thickness == 0 {
            return Err(DetError::config_error_with_context(
                "visualization.thickness",
                "0",
                "must be at least 1",
            ));
        }
        self.validate_positive("visualization.font_scale", self.font_scale)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Draws each polygon as a closed outline on a copy of `image`.
///
/// Parts of a polygon outside the image are clipped. Polygons with fewer
/// than 2 points or with non-finite coordinates are skipped.
pub fn draw_polygons(
    image: &RgbImage,
    polygons: &[BoundingBox],
    config: &VisualizationConfig,
) -> RgbImage {
    let mut canvas = image.clone();
    let color = Rgb(config.color);
    for polygon in polygons {
        draw_outline(&mut canvas, polygon, color, config.thickness);
    }
    canvas
}

fn draw_outline(canvas: &mut RgbImage, polygon: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    if polygon.points.len() < 2 || !polygon.is_finite() {
        return;
    }
    let thickness = thickness.max(1) as i32;
    let offsets = -(thickness / 2)..=(thickness - 1) / 2;

    let n = polygon.points.len();
    for i in 0..n {
        let a = polygon.points[i];
        let b = polygon.points[(i + 1) % n];
        for dy in offsets.clone() {
            for dx in offsets.clone() {
                let (dx, dy) = (dx as f32, dy as f32);
                draw_line_segment_mut(canvas, (a.x + dx, a.y + dy), (b.x + dx, b.y + dy), color);
            }
        }
    }
}

/// Draws detections, with score labels when a font is available.
pub struct Visualizer {
    config: VisualizationConfig,
    font: Option<FontVec>,
}

impl Visualizer {
    /// Creates a visualizer and loads the label font if scores are shown.
    ///
    /// A configured `font_path` that cannot be read or parsed is an error.
    /// Without one, a missing system font only disables the labels.
    pub fn new(config: VisualizationConfig) -> DetResult<Self> {
        config.validate()?;
        let font = match (&config.font_path, config.show_scores) {
            (_, false) => None,
            (Some(path), true) => Some(load_font(path)?),
            (None, true) => system_font(),
        };
        Ok(Self { config, font })
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Returns true when score labels will be drawn.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws `detections` on a copy of `image`.
    pub fn draw(&self, image: &RgbImage, detections: &DetectionResult) -> RgbImage {
        let mut canvas = draw_polygons(image, detections.boxes(), &self.config);
        let Some(font) = &self.font else {
            return canvas;
        };

        let color = Rgb(self.config.color);
        for (polygon, score) in detections.iter() {
            let Some((min_x, min_y, _, _)) = polygon.bounds() else {
                continue;
            };
            let x = min_x.max(0.0) as i32;
            let y = (min_y - self.config.font_scale).max(0.0) as i32;
            draw_text_mut(
                &mut canvas,
                color,
                x,
                y,
                self.config.font_scale,
                font,
                &format!("{score:.3}"),
            );
        }
        canvas
    }
}

fn load_font(path: &Path) -> DetResult<FontVec> {
    let data = std::fs::read(path)
        .map_err(|e| DetError::io_error(format!("reading font {}", path.display()), e))?;
    FontVec::try_from_vec(data).map_err(|_| {
        DetError::config_error_with_context(
            "visualization.font_path",
            &path.display().to_string(),
            "not a valid TrueType/OpenType font",
        )
    })
}

fn system_font() -> Option<FontVec> {
    for path in SYSTEM_FONT_PATHS {
        if let Ok(data) = std::fs::read(path)
            && let Ok(font) = FontVec::try_from_vec(data)
        {
            info!("Loaded system font: {}", path);
            return Some(font);
        }
    }
    debug!("No system font found, score labels will be skipped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Point;

    #[test]
    fn test_draw_does_not_mutate_input() {
        let image = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
        let boxes = vec![BoundingBox::from_coords(4.0, 4.0, 20.0, 20.0)];
        let annotated = draw_polygons(&image, &boxes, &VisualizationConfig::default());

        assert!(image.pixels().all(|p| *p == Rgb([10, 10, 10])));
        assert_eq!(annotated.get_pixel(12, 4), &Rgb([0, 255, 0]));
        assert_eq!(annotated.get_pixel(12, 12), &Rgb([10, 10, 10]));
    }

    #[test]
    fn test_out_of_bounds_points_are_clipped() {
        let image = RgbImage::new(20, 20);
        let boxes = vec![BoundingBox::from_coords(-15.0, 5.0, 40.0, 60.0)];
        let annotated = draw_polygons(&image, &boxes, &VisualizationConfig::default());
        assert_eq!(annotated.dimensions(), (20, 20));
        assert_eq!(annotated.get_pixel(10, 5), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_degenerate_polygons_are_skipped() {
        let image = RgbImage::new(16, 16);
        let boxes = vec![
            BoundingBox::new(vec![Point::new(3.0, 3.0)]),
            BoundingBox::new(vec![
                Point::new(1.0, 1.0),
                Point::new(f32::NAN, 8.0),
                Point::new(8.0, 8.0),
            ]),
        ];
        let annotated = draw_polygons(&image, &boxes, &VisualizationConfig::default());
        assert_eq!(annotated, image);
    }

    #[test]
    fn test_custom_color_and_single_pixel_outline() {
        let image = RgbImage::new(16, 16);
        let config = VisualizationConfig {
            color: [255, 0, 0],
            thickness: 1,
            ..Default::default()
        };
        let boxes = vec![BoundingBox::from_coords(2.0, 2.0, 10.0, 10.0)];
        let annotated = draw_polygons(&image, &boxes, &config);
        assert_eq!(annotated.get_pixel(2, 6), &Rgb([255, 0, 0]));
        assert_eq!(annotated.get_pixel(1, 6), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_validate_rejects_zero_thickness() {
        let config = VisualizationConfig {
            thickness: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(VisualizationConfig::get_defaults().validate().is_ok());
    }

    #[test]
    fn test_unreadable_font_path_is_an_error() {
        let config = VisualizationConfig {
            show_scores: true,
            font_path: Some(PathBuf::from("no/such/font.ttf")),
            ..Default::default()
        };
        assert!(Visualizer::new(config).is_err());
    }

    #[test]
    fn test_visualizer_without_scores_skips_font() {
        let visualizer = Visualizer::new(VisualizationConfig::default()).unwrap();
        assert!(!visualizer.has_font());
        let image = RgbImage::new(16, 16);
        let detections = DetectionResult::new(
            vec![BoundingBox::from_coords(2.0, 2.0, 10.0, 10.0)],
            vec![0.9],
        )
        .unwrap();
        let annotated = visualizer.draw(&image, &detections);
        assert_ne!(annotated, image);
    }
}
