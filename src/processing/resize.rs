use image::imageops::FilterType;

use crate::processing::{decode, encode_jpeg, normalize_rgb, ProcessingError, RESIZE_OUTPUT_QUALITY};

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Aspect-preserving bounded size for a `width` x `height` image.
///
/// Landscape images are bounded by `max_width`, everything else by
/// `max_height`. Returns `None` when the image already fits, so callers never
/// upscale.
pub fn target_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let aspect_ratio = width as f64 / height as f64;
    let (new_width, new_height) = if aspect_ratio > 1.0 {
        let new_width = max_width.min(width);
        (new_width, (new_width as f64 / aspect_ratio) as u32)
    } else {
        let new_height = max_height.min(height);
        ((new_height as f64 * aspect_ratio) as u32, new_height)
    };

    if new_width < width || new_height < height {
        Some((new_width.max(1), new_height.max(1)))
    } else {
        None
    }
}

/// Downscale to fit the bounds and re-encode as JPEG at quality 85.
///
/// Images that already fit are only normalized and re-encoded.
pub fn smart_resize(data: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>, ProcessingError> {
    let img = decode(data)?;
    let (width, height) = (img.width(), img.height());

    let img = match target_dimensions(width, height, max_width, max_height) {
        Some((new_width, new_height)) => {
            tracing::debug!(
                from_width = width,
                from_height = height,
                to_width = new_width,
                to_height = new_height,
                "Resizing image"
            );
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
        None => img,
    };

    encode_jpeg(&normalize_rgb(img), RESIZE_OUTPUT_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_support::*;
    use image::GenericImageView;

    #[test]
    fn test_landscape_capped_by_width() {
        assert_eq!(target_dimensions(3840, 2160, 1920, 1080), Some((1920, 1080)));
        assert_eq!(target_dimensions(4000, 1000, 1920, 1080), Some((1920, 480)));
    }

    #[test]
    fn test_portrait_capped_by_height() {
        assert_eq!(target_dimensions(1000, 2000, 1920, 1080), Some((540, 1080)));
    }

    #[test]
    fn test_square_uses_height_bound() {
        assert_eq!(target_dimensions(2000, 2000, 1920, 1080), Some((1080, 1080)));
    }

    #[test]
    fn test_never_upscales() {
        assert_eq!(target_dimensions(800, 600, 1920, 1080), None);
        assert_eq!(target_dimensions(1920, 1080, 1920, 1080), None);
        assert_eq!(target_dimensions(0, 10, 1920, 1080), None);
    }

    #[test]
    fn test_aspect_ratio_preserved_within_a_pixel() {
        for (w, h) in [(3001, 1999), (1234, 4321), (2500, 2499), (5000, 7)] {
            if let Some((nw, nh)) = target_dimensions(w, h, 1920, 1080) {
                assert!(nw <= w && nh <= h);
                let expected_h = nw as f64 * h as f64 / w as f64;
                let expected_w = nh as f64 * w as f64 / h as f64;
                assert!(
                    (nh as f64 - expected_h).abs() <= 1.0 || (nw as f64 - expected_w).abs() <= 1.0,
                    "{}x{} -> {}x{}",
                    w,
                    h,
                    nw,
                    nh
                );
            }
        }
    }

    #[test]
    fn test_smart_resize_downscales() {
        let bytes = jpeg_bytes(&watermarked_image(400, 200));
        let out = smart_resize(&bytes, 100, 100).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_smart_resize_keeps_small_images() {
        let bytes = jpeg_bytes(&watermarked_image(60, 80));
        let out = smart_resize(&bytes, DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (60, 80));
    }
}
