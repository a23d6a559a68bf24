//! Local maxima of a response map and their sub-pixel refinement.

use glam::DVec2;

use crate::error::Result;
use crate::geometry::quadratic_maxima_approximation;
use crate::math::min_max;
use crate::Image;

/// Pixels that are the maximum of their `(2·min_distance + 1)²` window,
/// exceed `threshold_rel` times the global maximum, and are at least
/// `min_distance` from the border.
///
/// Peaks come strongest first; a peak within `min_distance` (Chebyshev) of a
/// stronger one is dropped.
pub fn peak_local_max(image: &Image, min_distance: usize, threshold_rel: f64) -> Vec<(usize, usize)> {
    let (w, h) = (image.width(), image.height());
    if w <= 2 * min_distance || h <= 2 * min_distance {
        return Vec::new();
    }
    let (lo, hi) = min_max(image);
    let threshold = lo.max(threshold_rel * hi);

    let mut candidates = Vec::new();
    for y in min_distance..h - min_distance {
        for x in min_distance..w - min_distance {
            let v = image[(x, y)];
            if v > threshold && v >= window_max(image, x, y, min_distance) {
                candidates.push((x, y));
            }
        }
    }
    // stable: equal peaks keep raster order
    candidates.sort_by(|a, b| image[*b].total_cmp(&image[*a]));

    let mut peaks: Vec<(usize, usize)> = Vec::with_capacity(candidates.len());
    for (x, y) in candidates {
        let crowded = peaks
            .iter()
            .any(|&(px, py)| px.abs_diff(x).max(py.abs_diff(y)) <= min_distance);
        if !crowded {
            peaks.push((x, y));
        }
    }
    peaks
}

fn window_max(image: &Image, x: usize, y: usize, radius: usize) -> f64 {
    let x0 = x.saturating_sub(radius);
    let x1 = (x + radius).min(image.width() - 1);
    let y0 = y.saturating_sub(radius);
    let y1 = (y + radius).min(image.height() - 1);
    (y0..=y1)
        .flat_map(|sy| image.row(sy)[x0..=x1].iter().copied())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Walks uphill on `energy` from `(x, y)` one pixel per iteration until the
/// centre of the 3x3 neighbourhood is its maximum, then fits a parabola along
/// each axis.
///
/// Returns `None` when no maximum is reached within `max_iteration` steps or
/// the walk leaves the image.
pub fn subpixel_approximation_quadratic(
    x: usize,
    y: usize,
    energy: &Image,
    max_iteration: usize,
) -> Result<Option<DVec2>> {
    let (mut x, mut y) = (x, y);
    for _ in 0..max_iteration {
        if x == 0 || y == 0 || x + 1 >= energy.width() || y + 1 >= energy.height() {
            return Ok(None);
        }
        let centre = energy[(x, y)];
        let mut best = (0, 0, f64::NEG_INFINITY);
        for dy in 0..3 {
            for dx in 0..3 {
                let v = energy[(x + dx - 1, y + dy - 1)];
                if v > best.2 {
                    best = (dx, dy, v);
                }
            }
        }
        if centre == best.2 {
            let ox = quadratic_maxima_approximation(energy[(x - 1, y)], centre, energy[(x + 1, y)])?;
            let oy = quadratic_maxima_approximation(energy[(x, y - 1)], centre, energy[(x, y + 1)])?;
            return Ok(Some(DVec2::new(x as f64 + ox, y as f64 + oy)));
        }
        x = x + best.0 - 1;
        y = y + best.1 - 1;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn blob(w: usize, h: usize, cx: f64, cy: f64, sigma: f64) -> Image {
        Image::from_fn(w, h, |x, y| {
            let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            (-d2 / (2.0 * sigma * sigma)).exp()
        })
    }

    #[test]
    fn test_peaks_strongest_first() {
        let image = blob(30, 30, 8.0, 8.0, 1.5).zip_map(&blob(30, 30, 20.0, 18.0, 1.5), |a, b| {
            a + 0.8 * b
        });
        let peaks = peak_local_max(&image, 2, 0.3);
        assert_eq!(peaks, vec![(8, 8), (20, 18)]);
    }

    #[test]
    fn test_relative_threshold_drops_weak_peak() {
        let image = blob(30, 30, 8.0, 8.0, 1.5).zip_map(&blob(30, 30, 20.0, 18.0, 1.5), |a, b| {
            a + 0.2 * b
        });
        assert_eq!(peak_local_max(&image, 2, 0.3), vec![(8, 8)]);
    }

    #[test]
    fn test_border_peaks_are_excluded() {
        let image = blob(20, 20, 1.0, 10.0, 1.0);
        assert!(peak_local_max(&image, 2, 0.3).is_empty());
    }

    #[test]
    fn test_close_plateau_keeps_one_peak() {
        let image = Image::from_fn(12, 12, |x, y| {
            if (x == 5 || x == 6) && y == 5 {
                1.0
            } else {
                0.0
            }
        });
        assert_eq!(peak_local_max(&image, 2, 0.3), vec![(5, 5)]);
    }

    #[test]
    fn test_subpixel_offset_of_shifted_blob() {
        let image = blob(20, 20, 10.3, 9.0, 1.8);
        let p = subpixel_approximation_quadratic(10, 9, &image, 2).unwrap().unwrap();
        assert!((p.x - 10.3).abs() < 0.05, "{:?}", p);
        assert!((p.y - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_subpixel_climbs_to_neighbour() {
        let image = blob(20, 20, 11.0, 9.0, 1.8);
        let p = subpixel_approximation_quadratic(10, 9, &image, 2).unwrap().unwrap();
        assert!((p - DVec2::new(11.0, 9.0)).length() < 1e-9);
        assert_eq!(subpixel_approximation_quadratic(8, 9, &image, 2).unwrap(), None);
    }

    #[test]
    fn test_subpixel_flat_top_is_an_error() {
        let image = Image::new_filled(5, 5, 1.0);
        let err = subpixel_approximation_quadratic(2, 2, &image, 2).unwrap_err();
        assert!(matches!(err, Error::NotLocalMaximum { .. }));
    }
}
