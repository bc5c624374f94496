//! Reading and writing images.

use crate::core::errors::{DetError, DetResult};
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Converts a DynamicImage of any color type to 8-bit RGB.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// * `DetError::NotFound` if `path` does not exist. Nothing is decoded.
/// * `DetError::ImageLoad` if the file cannot be decoded.
pub fn load_image(path: &Path) -> DetResult<RgbImage> {
    if !path.exists() {
        return Err(DetError::not_found(path));
    }
    let img = image::open(path).map_err(DetError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Writes `img` to `path`, choosing the encoder from the extension.
pub fn save_image(img: &RgbImage, path: &Path) -> DetResult<()> {
    img.save(path).map_err(|source| DetError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    #[test]
    fn test_missing_path_is_not_found() {
        let err = load_image(Path::new("no/such/image.jpg")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_gray_image_is_converted_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 3, Luma([90])).save(&path).unwrap();

        let rgb = load_image(&path).unwrap();
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([90, 90, 90]));
    }

    #[test]
    fn test_undecodable_file_is_image_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(load_image(&path), Err(DetError::ImageLoad(_))));
    }

    #[test]
    fn test_unknown_extension_is_image_write() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(2, 2);
        let err = save_image(&img, &dir.path().join("out.unknownext")).unwrap_err();
        assert!(matches!(err, DetError::ImageWrite { .. }));
    }
}
