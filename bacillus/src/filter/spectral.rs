//! Frequency-domain filtering.
//!
//! [`fft`] returns a centred spectrum (zero frequency in the middle), the layout
//! [`bandpass_filter`] masks are built for. [`fft_reconstruction`] undoes the
//! centring before the inverse transform.

use glam::DVec2;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

use crate::error::{Error, Result};
use crate::math::{linspace, mean};
use crate::{Buffer2, Image};

pub type Spectrum = Buffer2<Complex<f64>>;

/// Pixels that come out of drift correction at or below zero are set to this.
const SHIFT_FLOOR: f64 = 10.0;

/// Radial high-pass and low-pass masks for a `width` x `height` centred spectrum.
///
/// Frequencies span `±(1 / pixel_microns) / 4` along both axes. The high-pass
/// mask is `exp(-(r·w_h)²)` and the low-pass mask `1 - exp(-(r·w_l)²)`; a
/// zero width yields an all-ones mask.
pub fn bandpass_filter(
    pixel_microns: f64,
    width: usize,
    height: usize,
    high_pass_width: f64,
    low_pass_width: f64,
) -> (Image, Image) {
    assert!(pixel_microns > 0.0, "pixel_microns must be positive");

    let f_max = ((1.0 / pixel_microns) * 1000.0).round() / 1000.0 / 2.0;
    let u = linspace(-f_max / 2.0, f_max / 2.0, width);
    let v = linspace(-f_max / 2.0, f_max / 2.0, height);
    let radius = Image::from_fn(width, height, |x, y| u[x].hypot(v[y]));

    let high_pass = if high_pass_width == 0.0 {
        Image::new_filled(width, height, 1.0)
    } else {
        radius.map(|r| (-(r * high_pass_width).powi(2)).exp())
    };
    let low_pass = if low_pass_width == 0.0 {
        Image::new_filled(width, height, 1.0)
    } else {
        radius.map(|r| 1.0 - (-(r * low_pass_width).powi(2)).exp())
    };
    (high_pass, low_pass)
}

/// Centred 2D FFT, optionally removing the mean first.
pub fn fft(image: &Image, subtract_mean: bool) -> Spectrum {
    let offset = if subtract_mean { mean(image) } else { 0.0 };
    let mut data: Vec<Complex<f64>> = image
        .iter()
        .map(|&v| Complex::new(v - offset, 0.0))
        .collect();
    fft_2d(&mut data, image.width(), image.height(), FftDirection::Forward);
    fftshift(&Buffer2::new(image.width(), image.height(), data))
}

/// Multiplies a centred spectrum by each filter and returns the real part of
/// the inverse transform.
pub fn fft_reconstruction(spectrum: &Spectrum, filters: &[&Image]) -> Result<Image> {
    let mut filtered = spectrum.clone();
    for (index, filter) in filters.iter().enumerate() {
        if !filter.same_size(spectrum) {
            return Err(Error::FilterShapeMismatch {
                index,
                filter_width: filter.width(),
                filter_height: filter.height(),
                width: spectrum.width(),
                height: spectrum.height(),
            });
        }
        for (c, &f) in filtered.iter_mut().zip(filter.iter()) {
            *c *= f;
        }
    }

    let (width, height) = (spectrum.width(), spectrum.height());
    let mut data = ifftshift(&filtered).into_vec();
    fft_2d(&mut data, width, height, FftDirection::Inverse);
    let scale = 1.0 / (width * height) as f64;
    Ok(Image::new(
        width,
        height,
        data.iter().map(|c| c.re * scale).collect(),
    ))
}

/// Sub-pixel translation by a Fourier phase ramp, for drift between channels.
///
/// The result is rounded; non-positive pixels are replaced by a small floor.
pub fn shift_image(image: &Image, shift: DVec2) -> Image {
    let (width, height) = (image.width(), image.height());
    let mut data: Vec<Complex<f64>> = image.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft_2d(&mut data, width, height, FftDirection::Forward);

    let fx: Vec<f64> = (0..width).map(|k| fft_frequency(k, width)).collect();
    let fy: Vec<f64> = (0..height).map(|k| fft_frequency(k, height)).collect();
    for (i, c) in data.iter_mut().enumerate() {
        let (x, y) = (i % width, i / width);
        let phase = -2.0 * std::f64::consts::PI * (fx[x] * shift.x + fy[y] * shift.y);
        *c *= Complex::from_polar(1.0, phase);
    }

    fft_2d(&mut data, width, height, FftDirection::Inverse);
    let scale = 1.0 / (width * height) as f64;
    Image::new(
        width,
        height,
        data.iter()
            .map(|c| {
                let v = (c.re * scale).round();
                if v <= 0.0 {
                    SHIFT_FLOOR
                } else {
                    v
                }
            })
            .collect(),
    )
}

/// Moves the zero-frequency sample to the centre.
pub fn fftshift<T: Clone>(buffer: &Buffer2<T>) -> Buffer2<T> {
    let (w, h) = (buffer.width(), buffer.height());
    Buffer2::from_fn(w, h, |x, y| {
        buffer[((x + w - w / 2) % w, (y + h - h / 2) % h)].clone()
    })
}

/// Inverse of [`fftshift`], also for odd sizes.
pub fn ifftshift<T: Clone>(buffer: &Buffer2<T>) -> Buffer2<T> {
    let (w, h) = (buffer.width(), buffer.height());
    Buffer2::from_fn(w, h, |x, y| buffer[((x + w / 2) % w, (y + h / 2) % h)].clone())
}

/// Sample frequency of bin `k` of an `n`-point transform, in cycles per sample.
#[inline]
fn fft_frequency(k: usize, n: usize) -> f64 {
    if k < n.div_ceil(2) {
        k as f64 / n as f64
    } else {
        (k as f64 - n as f64) / n as f64
    }
}

/// Unnormalized in-place 2D FFT of a row-major buffer.
fn fft_2d(data: &mut [Complex<f64>], width: usize, height: usize, direction: FftDirection) {
    if width == 0 || height == 0 {
        return;
    }
    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft(width, direction);
    let col_fft = planner.plan_fft(height, direction);

    data.par_chunks_exact_mut(width)
        .for_each(|row| row_fft.process(row));

    let mut transposed = transpose(data, width, height);
    transposed
        .par_chunks_exact_mut(height)
        .for_each(|col| col_fft.process(col));
    data.copy_from_slice(&transpose(&transposed, height, width));
}

fn transpose(data: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}
