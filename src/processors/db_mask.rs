use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;

use super::DBPostProcess;

impl DBPostProcess {
    /// 3x3 dilation of the binary mask (Chebyshev radius 1).
    pub(super) fn dilate_mask(&self, mask: &GrayImage) -> GrayImage {
        if mask.width() == 0 || mask.height() == 0 {
            return mask.clone();
        }
        morphology::dilate(mask, Norm::LInf, 1)
    }
}
