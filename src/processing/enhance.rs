use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::processing::{decode, encode_jpeg, normalize_rgb, ProcessingError, ENHANCE_OUTPUT_QUALITY};

const CONTRAST_FACTOR: f32 = 1.2;
const SHARPNESS_FACTOR: f32 = 1.1;
const DENOISE_BLUR_SIGMA: f32 = 0.5;
const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_PERCENT: f32 = 120.0;
const UNSHARP_THRESHOLD: i32 = 2;

/// 3x3 smoothing kernel used as the "blurry" reference for sharpening.
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// Which enhancements to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceOptions {
    pub contrast: bool,
    pub sharpness: bool,
    pub denoise: bool,
}

impl EnhanceOptions {
    pub fn all() -> Self {
        Self {
            contrast: true,
            sharpness: true,
            denoise: true,
        }
    }
}

/// Apply contrast, sharpness and denoise passes in that order, then encode
/// as JPEG at quality 92.
pub fn enhance(data: &[u8], options: EnhanceOptions) -> Result<Vec<u8>, ProcessingError> {
    let mut img = normalize_rgb(decode(data)?);

    if options.contrast {
        img = adjust_contrast(&img, CONTRAST_FACTOR);
    }
    if options.sharpness {
        img = adjust_sharpness(&img, SHARPNESS_FACTOR);
    }
    if options.denoise {
        img = imageops::blur(&img, DENOISE_BLUR_SIGMA);
        img = unsharp_mask(&img, UNSHARP_SIGMA, UNSHARP_PERCENT, UNSHARP_THRESHOLD);
    }

    encode_jpeg(&img, ENHANCE_OUTPUT_QUALITY)
}

fn blend_channel(base: f32, value: f32, factor: f32) -> u8 {
    (base + factor * (value - base)).round().clamp(0.0, 255.0) as u8
}

/// Stretch every channel away from the image's mean luminance.
pub fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let pixel_count = (img.width() as u64 * img.height() as u64).max(1);
    let luma_sum: u64 = imageops::grayscale(img)
        .pixels()
        .map(|p| p.0[0] as u64)
        .sum();
    let mean = (luma_sum as f32 / pixel_count as f32).round();

    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgb(px) = *img.get_pixel(x, y);
        Rgb(px.map(|c| blend_channel(mean, c as f32, factor)))
    })
}

/// Extrapolate away from a smoothed copy. Border pixels are left as is.
pub fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return img.clone();
    }

    let smoothed = imageops::filter3x3(img, &SMOOTH_KERNEL);
    let mut out = img.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let Rgb(orig) = *img.get_pixel(x, y);
            let Rgb(smooth) = *smoothed.get_pixel(x, y);
            let mut px = [0u8; 3];
            for c in 0..3 {
                px[c] = blend_channel(smooth[c] as f32, orig[c] as f32, factor);
            }
            out.put_pixel(x, y, Rgb(px));
        }
    }
    out
}

/// Classic unsharp mask: add back `percent` of the difference from a
/// gaussian-blurred copy wherever it is at least `threshold`.
pub fn unsharp_mask(img: &RgbImage, sigma: f32, percent: f32, threshold: i32) -> RgbImage {
    let blurred = imageops::blur(img, sigma);
    let amount = percent / 100.0;

    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgb(orig) = *img.get_pixel(x, y);
        let Rgb(soft) = *blurred.get_pixel(x, y);
        let mut px = orig;
        for c in 0..3 {
            let diff = orig[c] as i32 - soft[c] as i32;
            if diff.abs() >= threshold {
                px[c] = (orig[c] as f32 + diff as f32 * amount).round().clamp(0.0, 255.0) as u8;
            }
        }
        Rgb(px)
    })
}
