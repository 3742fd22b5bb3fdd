//! Generated test images

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Smooth gradient with a bright grey diagonal band standing in for a
/// semi-transparent watermark.
pub fn watermarked_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x as i64 - y as i64).abs() < 5 {
            Rgb([245, 245, 245])
        } else {
            let r = (40 + x * 120 / width.max(1)) as u8;
            let g = (60 + y * 100 / height.max(1)) as u8;
            Rgb([r, g, 110])
        }
    })
}

/// Noisy photo-like content so JPEG re-encoding at lower quality shrinks it.
pub fn noisy_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let n = x.wrapping_mul(7919) ^ y.wrapping_mul(104729);
        Rgb([(n % 256) as u8, ((n >> 3) % 256) as u8, ((n >> 5) % 256) as u8])
    })
}

pub fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, format)
        .expect("encode fixture");
    buf.into_inner()
}

pub fn jpeg_with_quality(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .expect("encode fixture");
    buf
}

/// 100x100 JPEG saved at maximum quality.
pub fn jpeg_photo() -> Vec<u8> {
    jpeg_with_quality(&noisy_image(100, 100), 100)
}

pub fn watermarked_jpeg() -> Vec<u8> {
    encode(&watermarked_image(64, 64), ImageFormat::Jpeg)
}

pub fn watermarked_png() -> Vec<u8> {
    encode(&watermarked_image(64, 64), ImageFormat::Png)
}

/// Valid JPEG header followed by nothing decodable.
pub fn truncated_jpeg() -> Vec<u8> {
    let mut bytes = jpeg_photo();
    bytes.truncate(64);
    bytes
}

pub const NOT_AN_IMAGE: &[u8] = b"definitely not an image";
