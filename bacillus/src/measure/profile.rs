//! Intensity profiles along midlines and contours, and the 1D/2D
//! normalizations applied before cells are compared.

use glam::DVec2;

use crate::error::{Error, Result};
use crate::filter::{gaussian_filter, BoundaryMode};
use crate::geometry::{bilinear_interpolate, unit_perpendicular_vector};
use crate::math::{interp, linspace, mean, min_max, percentile};
use crate::Image;

/// 3x3 scanning disk: corners weigh half.
const SCANNING_DISK: [(f64, f64, f64); 9] = [
    (-1.0, -1.0, 0.5),
    (0.0, -1.0, 1.0),
    (1.0, -1.0, 0.5),
    (-1.0, 0.0, 1.0),
    (0.0, 0.0, 1.0),
    (1.0, 0.0, 1.0),
    (-1.0, 1.0, 0.5),
    (0.0, 1.0, 1.0),
    (1.0, 1.0, 0.5),
];
const SCANNING_DISK_WEIGHT: f64 = 7.0;

/// Mean intensity across a strip of `width` pixels centred on `line`,
/// sampled every `subpixel` along the normals.
pub fn measure_along_strip(line: &[DVec2], image: &Image, width: f64, subpixel: f64) -> Vec<f64> {
    let normals = unit_perpendicular_vector(line, false);
    let steps = (width * 0.5 / subpixel) as usize;
    let samples = (2 * steps + 1) as f64;
    line.iter()
        .zip(&normals)
        .map(|(&p, &n)| {
            let mut sum = bilinear_interpolate(image, p);
            for i in 1..=steps {
                let offset = n * subpixel * i as f64;
                sum += bilinear_interpolate(image, p + offset);
                sum += bilinear_interpolate(image, p - offset);
            }
            sum / samples
        })
        .collect()
}

/// Weighted 3x3 average of the smoothed image at every contour point.
/// The closing point of `contour` is not sampled.
pub fn measure_along_contour(contour: &[DVec2], image: &Image) -> Vec<f64> {
    let smoothed = gaussian_filter(image, 1.0, BoundaryMode::Nearest);
    let open = &contour[..contour.len().saturating_sub(1)];
    open.iter()
        .map(|&p| {
            SCANNING_DISK
                .iter()
                .map(|&(dx, dy, w)| w * bilinear_interpolate(&smoothed, p + DVec2::new(dx, dy)))
                .sum::<f64>()
                / SCANNING_DISK_WEIGHT
        })
        .collect()
}

/// Running mean over `window` samples, stretched back to the input length.
pub fn moving_window_average(data: &[f64], window: usize) -> Result<Vec<f64>> {
    if data.len() <= window + 2 {
        return Err(Error::InsufficientData {
            len: data.len(),
            required: window + 2,
        });
    }
    let mut cumulative = Vec::with_capacity(data.len() + 1);
    cumulative.push(0.0);
    let mut running = 0.0;
    for &v in data {
        running += v;
        cumulative.push(running);
    }
    let averages: Vec<f64> = cumulative
        .windows(window + 1)
        .map(|w| (w[window] - w[0]) / window as f64)
        .collect();
    let xp = linspace(0.0, 1.0, averages.len());
    Ok(linspace(0.0, 1.0, data.len())
        .into_iter()
        .map(|x| interp(x, &xp, &averages))
        .collect())
}

/// `(v − min + base) / (max − min + base)`.
///
/// With `re_orient`, profiles whose second half is brighter are reversed
/// first so the bright end comes first.
pub fn normalize_data_1d(data: &[f64], re_orient: bool, base: f64) -> Vec<f64> {
    let half = data.len() / 2;
    let mut values = data.to_vec();
    if re_orient && half > 0 && mean(&data[..half]) < mean(&data[data.len() - half..]) {
        values.reverse();
    }
    let (lo, hi) = min_max(&values);
    values
        .iter()
        .map(|&v| (v - lo + base) / (hi - lo + base))
        .collect()
}

/// Rescales a straightened image to `[0, 1]` between its
/// `percentile_low_bound` percentile and its maximum.
///
/// With `re_orient`, images whose right half is brighter are mirrored.
pub fn normalize_data_2d(data: &Image, re_orient: bool, percentile_low_bound: f64) -> Image {
    let (w, h) = (data.width(), data.height());
    let half = w / 2;
    let mut image = data.clone();
    if re_orient && half > 0 {
        let left: Vec<f64> = (0..h).flat_map(|y| data.row(y)[..half].to_vec()).collect();
        let right: Vec<f64> = (0..h).flat_map(|y| data.row(y)[w - half..].to_vec()).collect();
        if mean(&left) < mean(&right) {
            image = Image::from_fn(w, h, |x, y| data[(w - 1 - x, y)]);
        }
    }
    let low = percentile(image.pixels(), percentile_low_bound);
    let (_, high) = min_max(image.pixels());
    image.map(|&v| ((v - low) / (high - low)).clamp(0.0, 1.0))
}

/// Places a profile of a cell `length` microns long on a fixed canvas of
/// `max_pixel` samples spanning `max_len` microns, centred and zero padded.
pub fn pad_data(
    data: &[f64],
    length: f64,
    max_len: f64,
    max_pixel: usize,
    normalize: bool,
    base: f64,
) -> Vec<f64> {
    let pixelated = (((length * max_pixel as f64 * 0.5 / max_len).round() as usize) * 2).min(max_pixel);
    let pad = (max_pixel - pixelated) / 2;
    let xp = linspace(0.0, 1.0, data.len());
    let mut resampled: Vec<f64> = linspace(0.0, 1.0, pixelated)
        .into_iter()
        .map(|x| interp(x, &xp, data))
        .collect();
    if normalize && !resampled.is_empty() {
        let (lo, hi) = min_max(&resampled);
        for v in &mut resampled {
            *v = (*v - lo + base) / (hi - lo + base);
        }
    }
    let mut padded = vec![0.0; pad];
    padded.extend(resampled);
    padded.extend(std::iter::repeat(0.0).take(pad));
    padded
}
