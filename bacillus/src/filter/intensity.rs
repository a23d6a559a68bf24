//! Intensity rescaling: min-max normalization and bit-depth stretching with
//! optional gamma.

use crate::error::{Error, Result};
use crate::math::min_max;
use crate::Image;

/// Linearly maps the value range onto `[0, 1]`. A constant image maps to zeros.
pub fn normalize_min_max(image: &Image) -> Image {
    let (lo, hi) = min_max(image);
    let range = hi - lo;
    if range <= 0.0 || !range.is_finite() {
        return Image::new_default(image.width(), image.height());
    }
    image.map(|v| (v - lo) / range)
}

/// Stretches the image to the full range of `bit_depth` bits, then applies
/// `gamma` relative to that range when given.
pub fn adjust_image(image: &Image, bit_depth: u32, gamma: Option<f64>) -> Result<Image> {
    if bit_depth <= 2 || bit_depth > 32 {
        return Err(Error::InvalidBitDepth { depth: bit_depth });
    }
    let max_out = ((1u64 << bit_depth) - 1) as f64;
    let scaled = normalize_min_max(image).map(|v| v * max_out);
    Ok(match gamma {
        Some(gamma) => scaled.map(|v| (v / max_out).powf(gamma) * max_out),
        None => scaled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_spans_unit_range() {
        let image = Image::new(4, 1, vec![10.0, 20.0, 30.0, 50.0]);
        let out = normalize_min_max(&image);
        assert_eq!(out.pixels(), &[0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_constant_is_zero() {
        let out = normalize_min_max(&Image::new_filled(3, 3, 4.0));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_adjust_image_stretches_to_bit_depth() {
        let image = Image::new(3, 1, vec![100.0, 150.0, 200.0]);
        let out = adjust_image(&image, 8, None).unwrap();
        assert_eq!(out.pixels(), &[0.0, 127.5, 255.0]);
        let gamma = adjust_image(&image, 8, Some(2.0)).unwrap();
        assert!((gamma[(1, 0)] - 63.75).abs() < 1e-9);
        assert_eq!(gamma[(2, 0)], 255.0);
    }

    #[test]
    fn test_adjust_image_rejects_tiny_depth() {
        let err = adjust_image(&Image::new_filled(2, 2, 1.0), 2, None).unwrap_err();
        assert_eq!(err, Error::InvalidBitDepth { depth: 2 });
    }
}
