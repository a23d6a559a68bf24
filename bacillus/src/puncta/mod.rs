//! Fluorescent puncta: Laplacian-of-Gaussian blob detection inside a cell
//! mask, sub-pixel refinement and local z-scores.

pub mod peaks;

pub use peaks::{peak_local_max, subpixel_approximation_quadratic};

use serde::{Deserialize, Serialize};

use crate::config::PunctaConfig;
use crate::error::{Error, Result};
use crate::filter::{gaussian_filter, gaussian_laplace, normalize_min_max, BoundaryMode};
use crate::math::{mean, std_dev, threshold_isodata};
use crate::{Image, Mask};

/// One detected punctum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PunctaRecord {
    /// Sub-pixel column.
    pub x: f64,
    /// Sub-pixel row.
    pub y: f64,
    /// Raw intensity at the detected pixel.
    pub intensity: f64,
    /// Laplacian-of-Gaussian response at the detected pixel.
    pub log_value: f64,
    pub z_image: f64,
    pub z_log: f64,
}

/// Detects puncta of `image` inside `mask`.
///
/// Maxima that do not settle within the iteration budget, or that sit on a
/// flat top, are dropped.
pub fn find_puncta(image: &Image, mask: &Mask, config: &PunctaConfig) -> Result<Vec<PunctaRecord>> {
    config.validate();
    if !mask.same_size(image) {
        return Err(Error::ImageSizeMismatch {
            width: mask.width(),
            height: mask.height(),
            expected_width: image.width(),
            expected_height: image.height(),
        });
    }

    let smoothed = normalize_min_max(&gaussian_filter(
        image,
        config.smoothing_sigma,
        BoundaryMode::Nearest,
    ));
    let log = gaussian_laplace(&smoothed, config.log_sigma);
    let response = log.zip_map(mask, |&v, &inside| if inside { -v } else { 0.0 });

    let mut records = Vec::new();
    for (x, y) in peak_local_max(&response, config.min_distance, config.threshold_rel) {
        let centre = match subpixel_approximation_quadratic(x, y, &smoothed, config.max_iteration) {
            Ok(Some(centre)) => centre,
            Ok(None) => continue,
            Err(err) => {
                tracing::debug!(x, y, %err, "punctum dropped");
                continue;
            }
        };
        records.push(PunctaRecord {
            x: centre.x,
            y: centre.y,
            intensity: image[(x, y)],
            log_value: log[(x, y)],
            z_image: local_puncta_zscore(&smoothed, x, y, config),
            z_log: local_puncta_zscore(&log, x, y, config),
        });
    }

    tracing::debug!(puncta = records.len(), "puncta detected");
    Ok(records)
}

/// Contrast of the bright part of the window around `(x, y)` against the
/// rest, in units of the rest's standard deviation.
///
/// The lowest `trim_low_bound` values are discarded first. The split is the
/// midpoint between the isodata threshold and the mean of the four brightest
/// values; with `min_foreground` or fewer pixels above it the score is zero.
pub fn local_puncta_zscore(image: &Image, x: usize, y: usize, config: &PunctaConfig) -> f64 {
    let r = config.zscore_half_window;
    let x0 = x.saturating_sub(r);
    let y0 = y.saturating_sub(r);
    let x1 = (x + r + 1).min(image.width());
    let y1 = (y + r + 1).min(image.height());
    let mut data: Vec<f64> = (y0..y1)
        .flat_map(|sy| image.row(sy)[x0..x1].iter().copied())
        .collect();
    data.sort_unstable_by(f64::total_cmp);
    if data.len() <= config.trim_low_bound {
        return 0.0;
    }
    let data = &data[config.trim_low_bound..];

    let top = &data[data.len().saturating_sub(4)..];
    let threshold = 0.5 * (threshold_isodata(data, config.isodata_bins) + mean(top));
    let (foreground, background): (Vec<f64>, Vec<f64>) = data.iter().copied().partition(|&v| v > threshold);
    if foreground.len() <= config.min_foreground || background.is_empty() {
        return 0.0;
    }
    (mean(&foreground) - mean(&background)) / std_dev(&background)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot_image(w: usize, h: usize, spots: &[(f64, f64)]) -> Image {
        Image::from_fn(w, h, |x, y| {
            100.0
                + spots
                    .iter()
                    .map(|&(cx, cy)| {
                        let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                        900.0 * (-d2 / 4.5).exp()
                    })
                    .sum::<f64>()
        })
    }

    #[test]
    fn test_flat_image_has_no_puncta() {
        let image = Image::new_filled(32, 32, 500.0);
        let mask = Mask::new_filled(32, 32, true);
        let puncta = find_puncta(&image, &mask, &PunctaConfig::default()).unwrap();
        assert!(puncta.is_empty());
    }

    #[test]
    fn test_single_spot() {
        let image = spot_image(40, 40, &[(20.3, 15.0)]);
        let mask = Mask::new_filled(40, 40, true);
        let puncta = find_puncta(&image, &mask, &PunctaConfig::default()).unwrap();
        assert_eq!(puncta.len(), 1);
        let p = puncta[0];
        assert!((p.x - 20.3).abs() < 0.1, "{:?}", p);
        assert!((p.y - 15.0).abs() < 1e-6, "{:?}", p);
        assert!(p.log_value < 0.0);
        assert!(p.z_image > 0.0);
        assert!(p.z_log > 0.0);
    }

    #[test]
    fn test_spots_outside_mask_are_ignored() {
        let image = spot_image(40, 40, &[(10.0, 10.0), (30.0, 28.0)]);
        let mask = Mask::from_fn(40, 40, |x, _| x >= 20);
        let puncta = find_puncta(&image, &mask, &PunctaConfig::default()).unwrap();
        assert_eq!(puncta.len(), 1);
        assert!((puncta[0].x - 30.0).abs() < 1e-6);
        assert!((puncta[0].y - 28.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_topped_spot_is_skipped() {
        // two saturated pixels smooth to an exact tie, which has no vertex
        let image = Image::from_fn(48, 40, |x, y| match (x, y) {
            (15, 20) | (16, 20) | (32, 20) => 1000.0,
            _ => 0.0,
        });
        let mask = Mask::new_filled(48, 40, true);
        let puncta = find_puncta(&image, &mask, &PunctaConfig::default()).unwrap();
        assert_eq!(puncta.len(), 1);
        assert!((puncta[0].x - 32.0).abs() < 1e-9, "{:?}", puncta[0]);
        assert!((puncta[0].y - 20.0).abs() < 1e-9, "{:?}", puncta[0]);
    }

    #[test]
    fn test_mask_size_is_checked() {
        let image = Image::new_filled(16, 16, 1.0);
        let mask = Mask::new_filled(8, 16, true);
        let err = find_puncta(&image, &mask, &PunctaConfig::default()).unwrap_err();
        assert!(matches!(err, Error::ImageSizeMismatch { .. }));
    }

    #[test]
    fn test_zscore_needs_enough_foreground() {
        // a single bright pixel is not enough foreground
        let image = Image::from_fn(9, 9, |x, y| if x == 4 && y == 4 { 10.0 } else { 1.0 });
        assert_eq!(local_puncta_zscore(&image, 4, 4, &PunctaConfig::default()), 0.0);
    }
}
