use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::close;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma)
}

/// Estimate the slowly varying background with a wide median filter.
/// Structures narrower than the radius do not survive the filter.
pub fn estimate_background(img: &GrayImage, radius: u32) -> GrayImage {
    median_filter(img, radius, radius)
}

/// Absolute per-pixel difference between an image and its background.
pub fn contrast_map(img: &GrayImage, background: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let a = img.get_pixel(x, y)[0];
        let b = background.get_pixel(x, y)[0];
        Luma([a.abs_diff(b)])
    })
}

/// Binary mask (255 = foreground) of pixels whose contrast exceeds `threshold`.
pub fn threshold_mask(contrast: &GrayImage, threshold: f32) -> GrayImage {
    GrayImage::from_fn(contrast.width(), contrast.height(), |x, y| {
        if contrast.get_pixel(x, y)[0] as f32 > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Morphological closing to bridge thin gaps such as graduation ticks
pub fn close_gaps(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    close(mask, Norm::LInf, radius)
}
