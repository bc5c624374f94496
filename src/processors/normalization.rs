//! Image normalization for the detection network.
//!
//! [`NormalizeImage`] maps 8-bit pixels to `pixel * alpha + beta` per channel
//! (with `alpha = scale / std` and `beta = -mean / std`), and [`DetPreprocessor`]
//! combines a fixed-size bilinear resize with that normalization to produce the
//! `(1, 3, H, W)` network input.

use crate::core::Tensor4D;
use crate::core::config::{ConfigValidator, NormalizationConfig};
use crate::core::errors::{DetError, DetResult};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{Array4, Axis};

/// Normalizes images for the detection network.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0)
    /// * `mean` - Optional mean values for each channel (defaults to [0.485, 0.456, 0.406])
    /// * `std` - Optional standard deviation values for each channel (defaults to [0.229, 0.224, 0.225])
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the scale is not positive, if mean or std do not
    /// have exactly 3 elements, or if any standard deviation is not positive.
    pub fn new(
        scale: Option<f32>,
        mean: Option<Vec<f32>>,
        std: Option<Vec<f32>>,
    ) -> DetResult<Self> {
        let scale = scale.unwrap_or(1.0 / 255.0);
        let defaults = NormalizationConfig::default();
        let config = NormalizationConfig {
            mean: mean.unwrap_or(defaults.mean),
            std: std.unwrap_or(defaults.std),
        };

        if !scale.is_finite() || scale <= 0.0 {
            return Err(DetError::config_error("Scale must be greater than 0"));
        }
        config.validate()?;

        let alpha = [0, 1, 2].map(|c| scale / config.std[c]);
        let beta = [0, 1, 2].map(|c| -config.mean[c] / config.std[c]);

        Ok(Self { alpha, beta })
    }

    /// Builds the normalizer from a configuration section.
    pub fn from_config(config: &NormalizationConfig) -> DetResult<Self> {
        Self::new(None, Some(config.mean.clone()), Some(config.std.clone()))
    }

    /// Normalizes a single image into a `(1, 3, H, W)` tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> DetResult<Tensor4D> {
        let (width, height) = img.dimensions();
        let (h, w) = (height as usize, width as usize);

        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));

        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                tensor[[0, c, y, x]] = pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }

        Ok(tensor)
    }

    /// Inverts [`NormalizeImage::normalize_to`] for one image of a batch.
    ///
    /// Values are rounded and saturated to `[0, 255]`.
    pub fn denormalize(&self, tensor: &Tensor4D, batch_index: usize) -> DetResult<RgbImage> {
        let shape = tensor.shape();
        if shape[1] != 3 || batch_index >= shape[0] {
            return Err(DetError::shape_mismatch(
                "denormalize",
                &[batch_index + 1, 3, 0, 0],
                shape,
            ));
        }

        let image = tensor.index_axis(Axis(0), batch_index);
        let (height, width) = (shape[2], shape[3]);
        let mut rgb = RgbImage::new(width as u32, height as u32);

        for (x, y, pixel) in rgb.enumerate_pixels_mut() {
            let (xu, yu) = (x as usize, y as usize);
            *pixel = Rgb([0, 1, 2].map(|c| {
                let value = (image[[c, yu, xu]] - self.beta[c]) / self.alpha[c];
                value.round().clamp(0.0, 255.0) as u8
            }));
        }

        Ok(rgb)
    }
}

/// Resize plus normalization for the detection network.
///
/// Holds no per-call state; one instance can serve any number of images.
#[derive(Debug, Clone)]
pub struct DetPreprocessor {
    target_height: u32,
    target_width: u32,
    normalize: NormalizeImage,
}

impl DetPreprocessor {
    /// Creates a preprocessor that resizes to `(target_height, target_width)`.
    pub fn new(
        target_height: usize,
        target_width: usize,
        normalization: &NormalizationConfig,
    ) -> DetResult<Self> {
        if target_height == 0 || target_width == 0 {
            return Err(DetError::config_error_with_context(
                "image_shape",
                &format!("[{target_height}, {target_width}]"),
                "target size must be greater than 0",
            ));
        }
        let target_height = u32::try_from(target_height)
            .map_err(|_| DetError::config_error("target height does not fit in u32"))?;
        let target_width = u32::try_from(target_width)
            .map_err(|_| DetError::config_error("target width does not fit in u32"))?;

        Ok(Self {
            target_height,
            target_width,
            normalize: NormalizeImage::from_config(normalization)?,
        })
    }

    /// Resizes bilinearly, normalizes and returns a `(1, 3, H, W)` tensor.
    pub fn apply(&self, img: &RgbImage) -> DetResult<Tensor4D> {
        if img.width() == 0 || img.height() == 0 {
            return Err(DetError::invalid_input("input image has zero size"));
        }

        let resized = if img.dimensions() == (self.target_width, self.target_height) {
            img.clone()
        } else {
            imageops::resize(
                img,
                self.target_width,
                self.target_height,
                FilterType::Triangle,
            )
        };

        self.normalize.normalize_to(&resized)
    }

    /// Converts a preprocessed tensor back to an 8-bit RGB image.
    pub fn denormalize(&self, tensor: &Tensor4D, batch_index: usize) -> DetResult<RgbImage> {
        self.normalize.denormalize(tensor, batch_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_output_shape_is_fixed() {
        let pre = DetPreprocessor::new(64, 96, &NormalizationConfig::default()).unwrap();
        for (w, h) in [(10, 10), (200, 50), (96, 64)] {
            let tensor = pre.apply(&gradient_image(w, h)).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 64, 96]);
        }
    }

    #[test]
    fn test_normalize_uses_mean_and_std() {
        let normalize = NormalizeImage::new(None, None, None).unwrap();
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 128]));
        let tensor = normalize.normalize_to(&img).unwrap();

        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        assert!((tensor[[0, 0, 0, 0]] - expected_r).abs() < 1e-4);
        assert!((tensor[[0, 1, 0, 0]] - expected_g).abs() < 1e-4);
    }

    #[test]
    fn test_denormalize_inverts_normalize() {
        let pre = DetPreprocessor::new(32, 48, &NormalizationConfig::default()).unwrap();
        let img = gradient_image(48, 32);
        let tensor = pre.apply(&img).unwrap();
        let restored = pre.denormalize(&tensor, 0).unwrap();

        assert_eq!(restored.dimensions(), img.dimensions());
        for (a, b) in img.pixels().zip(restored.pixels()) {
            for c in 0..3 {
                assert!((a[c] as i32 - b[c] as i32).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_invalid_configuration() {
        let bad_std = NormalizationConfig {
            mean: vec![0.5, 0.5, 0.5],
            std: vec![0.5, -1.0, 0.5],
        };
        assert!(matches!(
            DetPreprocessor::new(32, 32, &bad_std),
            Err(DetError::ConfigError { .. })
        ));
        assert!(DetPreprocessor::new(0, 32, &NormalizationConfig::default()).is_err());
        assert!(NormalizeImage::new(None, Some(vec![0.5; 2]), None).is_err());
    }
}
