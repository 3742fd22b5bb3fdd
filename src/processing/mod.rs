//! Image engines used by the photo pipeline.
//!
//! Every engine takes encoded image bytes and returns freshly encoded JPEG
//! bytes. Engines are synchronous and CPU-bound; the orchestrator runs them on
//! the blocking thread pool.

pub mod compression;
pub mod enhance;
pub mod resize;
pub mod watermark;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};

pub use enhance::EnhanceOptions;
pub use watermark::WatermarkStrategy;

/// JPEG quality used for watermark removal output.
pub const WATERMARK_OUTPUT_QUALITY: u8 = 90;

/// JPEG quality used for enhancement output.
pub const ENHANCE_OUTPUT_QUALITY: u8 = 92;

/// JPEG quality used for resize output.
pub const RESIZE_OUTPUT_QUALITY: u8 = 85;

/// Source formats accepted by the pipeline.
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unable to decode image: {0}")]
    Decode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Unable to encode image: {0}")]
    Encode(String),

    #[error("Image has zero width or height")]
    EmptyImage,
}

/// Result of one optional pipeline step.
#[derive(Debug)]
pub enum StepOutcome {
    Produced(Vec<u8>),
    Skipped,
    Failed(ProcessingError),
}

impl StepOutcome {
    pub fn from_result(result: Result<Vec<u8>, ProcessingError>) -> Self {
        match result {
            Ok(bytes) => StepOutcome::Produced(bytes),
            Err(e) => StepOutcome::Failed(e),
        }
    }
}

/// Check that the bytes are an image in one of the accepted formats.
pub fn sniff_format(data: &[u8]) -> Result<ImageFormat, ProcessingError> {
    let format =
        image::guess_format(data).map_err(|e| ProcessingError::UnsupportedFormat(e.to_string()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(ProcessingError::UnsupportedFormat(format!("{:?}", format)));
    }
    Ok(format)
}

/// Read width and height without decoding pixel data.
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), ProcessingError> {
    sniff_format(data)?;
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(ProcessingError::EmptyImage);
    }
    Ok((width, height))
}

pub fn decode(data: &[u8]) -> Result<DynamicImage, ProcessingError> {
    sniff_format(data)?;
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ProcessingError::EmptyImage);
    }
    Ok(img)
}

/// Flatten any grayscale, alpha or 16-bit mode down to 8-bit RGB.
///
/// Alpha is dropped rather than composited, so transparent pixels keep
/// their stored colour.
pub fn normalize_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let quality = quality.clamp(1, 100);
    let estimated_size = (img.width() * img.height()) as usize / 4;
    let mut buffer = Vec::with_capacity(estimated_size);
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ProcessingError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// The engines the orchestrator drives. Implemented by [`StandardEngine`];
/// tests substitute their own implementations to inject faults.
pub trait ProcessingEngine: Send + Sync {
    fn probe(&self, data: &[u8]) -> Result<(u32, u32), ProcessingError>;

    fn resize(&self, data: &[u8], max_width: u32, max_height: u32)
        -> Result<Vec<u8>, ProcessingError>;

    fn compress(&self, data: &[u8], quality: u8) -> Result<Vec<u8>, ProcessingError>;

    fn remove_watermark(
        &self,
        data: &[u8],
        strategy: WatermarkStrategy,
    ) -> Result<Vec<u8>, ProcessingError>;

    fn enhance(&self, data: &[u8], options: EnhanceOptions) -> Result<Vec<u8>, ProcessingError>;
}

/// Engines backed by `image` and `imageproc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEngine;

impl ProcessingEngine for StandardEngine {
    fn probe(&self, data: &[u8]) -> Result<(u32, u32), ProcessingError> {
        probe_dimensions(data)
    }

    fn resize(
        &self,
        data: &[u8],
        max_width: u32,
        max_height: u32,
    ) -> Result<Vec<u8>, ProcessingError> {
        resize::smart_resize(data, max_width, max_height)
    }

    fn compress(&self, data: &[u8], quality: u8) -> Result<Vec<u8>, ProcessingError> {
        compression::compress(data, quality)
    }

    fn remove_watermark(
        &self,
        data: &[u8],
        strategy: WatermarkStrategy,
    ) -> Result<Vec<u8>, ProcessingError> {
        watermark::remove_watermark(data, strategy)
    }

    fn enhance(&self, data: &[u8], options: EnhanceOptions) -> Result<Vec<u8>, ProcessingError> {
        enhance::enhance(data, options)
    }
}
