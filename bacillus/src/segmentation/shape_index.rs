//! Koenderink shape index, quantized to 8 bits.

use std::f64::consts::FRAC_2_PI;

use crate::filter::{gaussian_filter, BoundaryMode};
use crate::math::equalize_histogram;
use crate::Image;

const EQUALIZATION_BINS: usize = 256;

/// Shape index of the Gaussian-smoothed image, histogram equalized and
/// truncated to integer levels in `[0, 255]`.
///
/// Flat regions, where both Hessian eigenvalues vanish, map to zero before
/// equalization.
pub fn shape_index_conversion(image: &Image, sigma: f64) -> Image {
    if image.is_empty() {
        return image.clone();
    }
    let raw = shape_index(image, sigma);
    let equalized = equalize_histogram(raw.pixels(), EQUALIZATION_BINS);
    Image::new(
        image.width(),
        image.height(),
        equalized.into_iter().map(|v| (v * 255.0).floor()).collect(),
    )
}

/// `(2 / π) · atan((λ₂ + λ₁) / (λ₂ − λ₁))` with `λ₁ ≥ λ₂` the Hessian
/// eigenvalues. Undefined values are zero.
pub fn shape_index(image: &Image, sigma: f64) -> Image {
    let smoothed = gaussian_filter(image, sigma, BoundaryMode::Constant);
    let d_row = gradient_rows(&smoothed);
    let d_col = gradient_cols(&smoothed);
    let h_rr = gradient_rows(&d_row);
    let h_rc = gradient_cols(&d_row);
    let h_cc = gradient_cols(&d_col);

    Image::from_fn(image.width(), image.height(), |x, y| {
        let (rr, rc, cc) = (h_rr[(x, y)], h_rc[(x, y)], h_cc[(x, y)]);
        let half_trace = 0.5 * (rr + cc);
        let radius = (0.25 * (rr - cc).powi(2) + rc * rc).sqrt();
        let l1 = half_trace + radius;
        let l2 = half_trace - radius;
        let si = FRAC_2_PI * ((l2 + l1) / (l2 - l1)).atan();
        if si.is_nan() {
            0.0
        } else {
            si
        }
    })
}

/// Central differences along `y`, one-sided at the first and last row.
pub(crate) fn gradient_rows(image: &Image) -> Image {
    let h = image.height();
    Image::from_fn(image.width(), h, |x, y| {
        if h < 2 {
            0.0
        } else if y == 0 {
            image[(x, 1)] - image[(x, 0)]
        } else if y == h - 1 {
            image[(x, h - 1)] - image[(x, h - 2)]
        } else {
            0.5 * (image[(x, y + 1)] - image[(x, y - 1)])
        }
    })
}

/// Central differences along `x`, one-sided at the first and last column.
pub(crate) fn gradient_cols(image: &Image) -> Image {
    let w = image.width();
    Image::from_fn(w, image.height(), |x, y| {
        if w < 2 {
            0.0
        } else if x == 0 {
            image[(1, y)] - image[(0, y)]
        } else if x == w - 1 {
            image[(w - 1, y)] - image[(w - 2, y)]
        } else {
            0.5 * (image[(x + 1, y)] - image[(x - 1, y)])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradients_of_linear_ramp() {
        let image = Image::from_fn(6, 5, |x, y| 3.0 * x as f64 - 2.0 * y as f64);
        assert!(gradient_cols(&image).iter().all(|&v| (v - 3.0).abs() < 1e-12));
        assert!(gradient_rows(&image).iter().all(|&v| (v + 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_dark_spot_is_cup_and_bright_spot_is_cap() {
        let dark = Image::from_fn(31, 31, |x, y| {
            let r2 = (x as f64 - 15.0).powi(2) + (y as f64 - 15.0).powi(2);
            100.0 - 50.0 * (-r2 / 18.0).exp()
        });
        let bright = dark.map(|v| 200.0 - v);
        let si_dark = shape_index(&dark, 2.0);
        let si_bright = shape_index(&bright, 2.0);
        // a minimum has two positive curvatures; sampled off-centre where the
        // eigenvalues differ
        assert!(si_dark[(16, 15)] < -0.9);
        assert!(si_bright[(16, 15)] > 0.9);
    }

    #[test]
    fn test_conversion_is_eight_bit() {
        let image = Image::from_fn(24, 20, |x, y| ((x * 7 + y * 13) % 17) as f64);
        let converted = shape_index_conversion(&image, 1.0);
        assert_eq!((converted.width(), converted.height()), (24, 20));
        assert!(converted
            .iter()
            .all(|&v| (0.0..=255.0).contains(&v) && v.fract() == 0.0));
        assert!(converted.iter().any(|&v| v == 255.0));
    }
}
