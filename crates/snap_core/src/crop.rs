//! Cropping full-frame captures down to a fractional rect.

use crate::error::{CaptureError, CaptureResult};
use crate::geometry::FractionalRect;
use image::{imageops, RgbaImage};

/// Copy the pixels of `image` covered by `rect` into a new image.
///
/// The result is `round(rect.width * w)` x `round(rect.height * h)` pixels,
/// starting at `(round(rect.x * w), round(rect.y * h))`.
///
/// The size is clamped so the crop never reads past the source edge. This
/// also applies to rects inside `[0, 1]` whose offset and size both round
/// up, so the result can be a pixel smaller than the rounded size.
pub fn crop(image: &RgbaImage, rect: FractionalRect) -> CaptureResult<RgbaImage> {
    let (w, h) = image.dimensions();
    let x = scale(rect.x, w);
    let y = scale(rect.y, h);
    let width = scale(rect.width, w).min(w.saturating_sub(x));
    let height = scale(rect.height, h).min(h.saturating_sub(y));

    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyRegion);
    }

    Ok(imageops::crop_imm(image, x, y, width, height).to_image())
}

fn scale(fraction: f32, extent: u32) -> u32 {
    (fraction * extent as f32).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, (x / 256) as u8, 255])
        })
    }

    #[test]
    fn test_crop_scenario() {
        let frame = gradient(1000, 800);
        let cropped = crop(&frame, FractionalRect::new(0.1, 0.1, 0.2, 0.2)).unwrap();

        assert_eq!(cropped.dimensions(), (200, 160));
        assert_eq!(cropped.get_pixel(0, 0), frame.get_pixel(100, 80));
        assert_eq!(cropped.get_pixel(199, 159), frame.get_pixel(299, 239));
    }

    #[test]
    fn test_crop_size_uses_rounding() {
        let frame = gradient(10, 10);
        let cropped = crop(&frame, FractionalRect::new(0.26, 0.14, 0.37, 0.46)).unwrap();

        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(cropped.get_pixel(0, 0), frame.get_pixel(3, 1));
    }

    #[test]
    fn test_crop_full_frame() {
        let frame = gradient(64, 48);
        let cropped = crop(&frame, FractionalRect::full()).unwrap();
        assert_eq!(cropped, frame);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let frame = gradient(100, 100);
        let cropped = crop(&frame, FractionalRect::new(0.9, 0.9, 0.5, 0.5)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_crop_rounding_up_both_edges_is_clamped() {
        // x rounds 0.5 -> 1 and width rounds 1.5 -> 2 on a 2px wide frame.
        let frame = gradient(2, 1);
        let cropped = crop(&frame, FractionalRect::new(0.25, 0.0, 0.75, 1.0)).unwrap();

        assert_eq!(cropped.dimensions(), (1, 1));
        assert_eq!(cropped.get_pixel(0, 0), frame.get_pixel(1, 0));
    }

    #[test]
    fn test_crop_empty_region() {
        let frame = gradient(100, 100);
        let err = crop(&frame, FractionalRect::new(0.5, 0.5, 0.0, 0.2)).unwrap_err();
        assert!(matches!(err, CaptureError::EmptyRegion));
    }
}
