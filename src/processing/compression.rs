use crate::processing::{decode, encode_jpeg, normalize_rgb, ProcessingError};

/// Re-encode an image as a lossy JPEG at `quality` (clamped to 1..=100).
///
/// Alpha, palette and grayscale inputs are flattened to RGB first.
pub fn compress(data: &[u8], quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let img = decode(data)?;
    let rgb = normalize_rgb(img);
    let output = encode_jpeg(&rgb, quality)?;

    tracing::debug!(
        quality = quality,
        input_bytes = data.len(),
        output_bytes = output.len(),
        "Compressed image"
    );

    Ok(output)
}

/// Percentage saved going from `original_size` to `compressed_size`.
pub fn calculate_savings(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }

    let savings = (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0;
    savings.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::*;
    use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

    #[test]
    fn test_output_is_decodable_jpeg() {
        let original = jpeg_bytes(&watermarked_image(100, 100));
        for quality in [1, 50, 80, 100] {
            let out = compress(&original, quality).unwrap();
            assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Jpeg);
            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!(decoded.dimensions(), (100, 100));
        }
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let original = jpeg_bytes(&watermarked_image(200, 150));
        let high = compress(&original, 95).unwrap();
        let low = compress(&original, 20).unwrap();
        assert!(low.len() < high.len());
        assert!(low.len() < original.len());
    }

    #[test]
    fn test_alpha_input_is_flattened() {
        let rgba = RgbaImage::from_pixel(40, 30, Rgba([200, 10, 10, 0]));
        let png = png_bytes(&DynamicImage::ImageRgba8(rgba));
        let out = compress(&png, 85).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_undecodable_input_fails() {
        assert!(compress(b"GIF89a-not-really", 80).is_err());
        assert!(compress(&[], 80).is_err());
    }

    #[test]
    fn test_calculate_savings() {
        assert_eq!(calculate_savings(0, 10), 0.0);
        assert_eq!(calculate_savings(100, 25), 75.0);
        assert_eq!(calculate_savings(100, 150), 0.0);
    }
}
