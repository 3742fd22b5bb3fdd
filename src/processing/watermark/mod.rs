//! Watermark detection and removal.
//!
//! Each strategy builds a binary mask of likely watermark pixels (255 =
//! watermark) and inpaints the masked region. Output is always a JPEG at
//! quality 90.

pub mod cluster;
pub mod inpaint;

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, dilate, grayscale_close, grayscale_open, open, Mask};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::processing::{decode, encode_jpeg, normalize_rgb, ProcessingError, WATERMARK_OUTPUT_QUALITY};

/// Inpainting neighbourhood radius shared by all strategies.
pub const INPAINT_RADIUS: u32 = 3;

const THRESHOLD_INTENSITY: u8 = 200;
const THRESHOLD_DILATE_ITERATIONS: usize = 2;

const HSV_MAX_SATURATION: u8 = 30;
const HSV_MIN_VALUE: u8 = 200;
const LAB_MIN_LIGHTNESS: u8 = 200;
/// 5x5 elliptical structuring element, row by row.
const ELLIPSE_5X5: [[u8; 5]; 5] = [
    [0, 0, 1, 0, 0],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1],
    [0, 0, 1, 0, 0],
];
const TELEA_WEIGHT: f32 = 0.7;
const NAVIER_STOKES_WEIGHT: f32 = 0.3;

const CLUSTER_MIN_BRIGHTNESS: f64 = 180.0;
const CLUSTER_COLOR_TOLERANCE: i32 = 30;

/// How watermark pixels are detected.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WatermarkStrategy {
    /// Bright grayscale threshold, dilated, fast marching inpaint.
    Threshold,
    /// HSV and Lab lightness masks, cleaned up, blended dual inpaint.
    #[default]
    Advanced,
    /// Bright k-means colour clusters, fast marching inpaint.
    Cluster,
}

/// Detect and erase a watermark, returning JPEG bytes at quality 90.
pub fn remove_watermark(data: &[u8], strategy: WatermarkStrategy) -> Result<Vec<u8>, ProcessingError> {
    let img = normalize_rgb(decode(data)?);
    let mask = build_mask(&img, strategy);

    let masked = mask.pixels().filter(|p| p.0[0] > 0).count();
    tracing::debug!(
        strategy = %strategy,
        masked_pixels = masked,
        total_pixels = img.width() as u64 * img.height() as u64,
        "Built watermark mask"
    );

    let result = match strategy {
        WatermarkStrategy::Threshold | WatermarkStrategy::Cluster => {
            inpaint::inpaint_telea(&img, &mask, INPAINT_RADIUS)
        }
        WatermarkStrategy::Advanced => {
            let telea = inpaint::inpaint_telea(&img, &mask, INPAINT_RADIUS);
            let navier_stokes = inpaint::inpaint_navier_stokes(&img, &mask, INPAINT_RADIUS);
            inpaint::blend(&telea, &navier_stokes, TELEA_WEIGHT, NAVIER_STOKES_WEIGHT)
        }
    };

    encode_jpeg(&result, WATERMARK_OUTPUT_QUALITY)
}

pub fn build_mask(img: &RgbImage, strategy: WatermarkStrategy) -> GrayImage {
    match strategy {
        WatermarkStrategy::Threshold => threshold_mask(img),
        WatermarkStrategy::Advanced => colorspace_mask(img),
        WatermarkStrategy::Cluster => cluster_mask(img),
    }
}

fn binary(hit: bool) -> Luma<u8> {
    Luma([if hit { 255 } else { 0 }])
}

/// Rec.601 luma in 14-bit fixed point, rounded.
pub fn intensity(px: [u8; 3]) -> u8 {
    let [r, g, b] = px.map(u32::from);
    ((r * 4899 + g * 9617 + b * 1868 + (1 << 13)) >> 14) as u8
}

/// Bright pixels of the intensity image, grown to cover soft edges.
pub fn threshold_mask(img: &RgbImage) -> GrayImage {
    let mut mask = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        binary(intensity(img.get_pixel(x, y).0) >= THRESHOLD_INTENSITY)
    });
    for _ in 0..THRESHOLD_DILATE_ITERATIONS {
        mask = dilate(&mask, Norm::LInf, 1);
    }
    mask
}

/// Saturation and value on OpenCV's 8-bit HSV scale.
fn saturation_value(px: [u8; 3]) -> (u8, u8) {
    let max = px.into_iter().max().unwrap_or(0);
    let min = px.into_iter().min().unwrap_or(0);
    let saturation = if max == 0 {
        0
    } else {
        ((max - min) as f32 * 255.0 / max as f32).round() as u8
    };
    (saturation, max)
}

fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE L* scaled to 0..=255 as in 8-bit Lab images.
pub fn lab_lightness(px: [u8; 3]) -> u8 {
    let y = 0.212671 * srgb_to_linear(px[0])
        + 0.715160 * srgb_to_linear(px[1])
        + 0.072169 * srgb_to_linear(px[2]);
    let l = if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

fn ellipse_kernel() -> Mask {
    let shape = GrayImage::from_fn(5, 5, |x, y| binary(ELLIPSE_5X5[y as usize][x as usize] == 1));
    Mask::from_image(&shape, 2, 2)
}

/// Union of washed-out HSV pixels and high Lab lightness, closed then opened.
pub fn colorspace_mask(img: &RgbImage) -> GrayImage {
    let raw = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y).0;
        let (saturation, value) = saturation_value(px);
        let light_hsv = saturation <= HSV_MAX_SATURATION && value >= HSV_MIN_VALUE;
        let bright_lab = lab_lightness(px) >= LAB_MIN_LIGHTNESS;
        binary(light_hsv || bright_lab)
    });
    let kernel = ellipse_kernel();
    let closed = grayscale_close(&raw, &kernel);
    grayscale_open(&closed, &kernel)
}

/// Centers of the bright k-means clusters, truncated to integers.
pub fn watermark_colors(img: &RgbImage) -> Vec<[i32; 3]> {
    let pixels: Vec<[u8; 3]> = img.pixels().map(|p| p.0).collect();
    cluster::cluster_centers(&pixels, cluster::CLUSTER_COUNT, cluster::CLUSTER_SEED)
        .into_iter()
        .map(|c| [c[0] as i32, c[1] as i32, c[2] as i32])
        .filter(|c| (c[0] + c[1] + c[2]) as f64 / 3.0 > CLUSTER_MIN_BRIGHTNESS)
        .collect()
}

/// Pixels within the colour tolerance of any bright cluster center.
pub fn cluster_mask(img: &RgbImage) -> GrayImage {
    let ranges: Vec<([i32; 3], [i32; 3])> = watermark_colors(img)
        .into_iter()
        .map(|c| {
            (
                c.map(|v| (v - CLUSTER_COLOR_TOLERANCE).max(0)),
                c.map(|v| (v + CLUSTER_COLOR_TOLERANCE).min(255)),
            )
        })
        .collect();

    let raw = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y).0.map(i32::from);
        binary(ranges.iter().any(|(lower, upper)| {
            (0..3).all(|c| px[c] >= lower[c] && px[c] <= upper[c])
        }))
    });
    let closed = close(&raw, Norm::LInf, 1);
    open(&closed, Norm::LInf, 1)
}
