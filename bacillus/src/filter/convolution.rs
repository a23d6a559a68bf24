//! Separable correlation filters on [`Image`]s.
//!
//! Every filter runs a horizontal pass followed by a vertical pass, each
//! parallelised over chunks of rows. Out-of-range samples are resolved by a
//! [`BoundaryMode`].

use rayon::prelude::*;

use crate::Image;

/// Gaussian kernels extend to `TRUNCATE` standard deviations.
const TRUNCATE: f64 = 4.0;

/// Rows handed to a worker at once; keeps threads on distinct cache lines.
const ROWS_PER_CHUNK: usize = 8;

/// How samples outside the image are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryMode {
    /// Repeat the edge pixel: `a a | a b c`.
    #[default]
    Nearest,
    /// Half-sample symmetric: `b a | a b c`.
    Reflect,
    /// Treat everything outside as zero.
    Constant,
}

impl BoundaryMode {
    #[inline]
    fn resolve(self, i: isize, n: usize) -> Option<usize> {
        let n_i = n as isize;
        if (0..n_i).contains(&i) {
            return Some(i as usize);
        }
        match self {
            BoundaryMode::Nearest => Some(i.clamp(0, n_i - 1) as usize),
            BoundaryMode::Reflect => {
                let period = 2 * n_i;
                let m = i.rem_euclid(period);
                Some(if m < n_i { m } else { period - 1 - m } as usize)
            }
            BoundaryMode::Constant => None,
        }
    }
}

/// Sampled Gaussian (`order == 0`) or its second derivative (`order == 2`).
///
/// Radius is `round(4 * sigma)`. The order-0 kernel sums to one; the order-2
/// kernel is the normalized Gaussian times `(x² - σ²) / σ⁴`.
pub fn gaussian_kernel_1d(sigma: f64, order: usize) -> Vec<f64> {
    assert!(sigma > 0.0, "Sigma must be positive");
    assert!(order == 0 || order == 2, "Only orders 0 and 2 are supported");

    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let sigma2 = sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / sigma2).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    if order == 2 {
        for (v, x) in kernel.iter_mut().zip(-radius..=radius) {
            let x2 = (x * x) as f64;
            *v *= (x2 - sigma2) / (sigma2 * sigma2);
        }
    }
    kernel
}

/// Gaussian smoothing with the given boundary handling.
pub fn gaussian_filter(image: &Image, sigma: f64, mode: BoundaryMode) -> Image {
    let kernel = gaussian_kernel_1d(sigma, 0);
    correlate_separable(image, &kernel, &kernel, mode)
}

/// Laplacian of Gaussian: sum of the second Gaussian derivatives along both axes.
pub fn gaussian_laplace(image: &Image, sigma: f64) -> Image {
    let k0 = gaussian_kernel_1d(sigma, 0);
    let k2 = gaussian_kernel_1d(sigma, 2);
    let dxx = correlate_separable(image, &k2, &k0, BoundaryMode::Reflect);
    let dyy = correlate_separable(image, &k0, &k2, BoundaryMode::Reflect);
    dxx.zip_map(&dyy, |a, b| a + b)
}

/// Sobel gradient magnitude, `sqrt((gx² + gy²) / 2)` with unit-sum smoothing.
pub fn sobel(image: &Image) -> Image {
    const SMOOTH: [f64; 3] = [0.25, 0.5, 0.25];
    const DIFF: [f64; 3] = [1.0, 0.0, -1.0];
    let gx = correlate_separable(image, &DIFF, &SMOOTH, BoundaryMode::Reflect);
    let gy = correlate_separable(image, &SMOOTH, &DIFF, BoundaryMode::Reflect);
    gx.zip_map(&gy, |a, b| ((a * a + b * b) * 0.5).sqrt())
}

/// Mean over a `size` x `size` window.
pub fn uniform_filter(image: &Image, size: usize) -> Image {
    assert!(size > 0, "window size must be positive");
    let kernel = vec![1.0 / size as f64; size];
    correlate_separable(image, &kernel, &kernel, BoundaryMode::Reflect)
}

/// Correlates rows with `kernel_x`, then columns with `kernel_y`.
///
/// Even-length kernels are centred on `len / 2`.
pub(crate) fn correlate_separable(
    image: &Image,
    kernel_x: &[f64],
    kernel_y: &[f64],
    mode: BoundaryMode,
) -> Image {
    if image.is_empty() {
        return image.clone();
    }
    let horizontal = correlate_rows(image, kernel_x, mode);
    correlate_cols(&horizontal, kernel_y, mode)
}

fn correlate_rows(input: &Image, kernel: &[f64], mode: BoundaryMode) -> Image {
    let width = input.width();
    let radius = (kernel.len() / 2) as isize;
    let mut output = vec![0.0; input.len()];

    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let in_row = input.row(y_start + local_y);
                for (x, out) in out_row.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for (k, &w) in kernel.iter().enumerate() {
                        let sx = x as isize + k as isize - radius;
                        if let Some(sx) = mode.resolve(sx, width) {
                            sum += in_row[sx] * w;
                        }
                    }
                    *out = sum;
                }
            }
        });

    Image::new(width, input.height(), output)
}

fn correlate_cols(input: &Image, kernel: &[f64], mode: BoundaryMode) -> Image {
    let width = input.width();
    let height = input.height();
    let radius = (kernel.len() / 2) as isize;
    let mut output = vec![0.0; input.len()];

    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let y = (y_start + local_y) as isize;
                for (x, out) in out_row.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for (k, &w) in kernel.iter().enumerate() {
                        if let Some(sy) = mode.resolve(y + k as isize - radius, height) {
                            sum += input[(x, sy)] * w;
                        }
                    }
                    *out = sum;
                }
            }
        });

    Image::new(width, height, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(size: usize, cx: usize, cy: usize) -> Image {
        Image::from_fn(size, size, |x, y| if x == cx && y == cy { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_kernel_normalization() {
        for sigma in [0.5, 1.0, 2.0, 3.5] {
            let kernel = gaussian_kernel_1d(sigma, 0);
            let sum: f64 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "sum {} for sigma {}", sum, sigma);
        }
    }

    #[test]
    fn test_kernel_radius_truncates_at_four_sigma() {
        assert_eq!(gaussian_kernel_1d(1.0, 0).len(), 9);
        assert_eq!(gaussian_kernel_1d(2.0, 0).len(), 17);
        assert_eq!(gaussian_kernel_1d(0.5, 2).len(), 5);
    }

    #[test]
    fn test_second_derivative_kernel_is_negative_at_center() {
        let kernel = gaussian_kernel_1d(1.0, 2);
        let center = kernel.len() / 2;
        assert!(kernel[center] < 0.0);
        assert!(kernel[0] > 0.0);
    }

    #[test]
    #[should_panic(expected = "Sigma must be positive")]
    fn test_zero_sigma_panics() {
        gaussian_kernel_1d(0.0, 0);
    }

    #[test]
    fn test_boundary_resolution() {
        assert_eq!(BoundaryMode::Nearest.resolve(-3, 5), Some(0));
        assert_eq!(BoundaryMode::Nearest.resolve(7, 5), Some(4));
        assert_eq!(BoundaryMode::Reflect.resolve(-1, 5), Some(0));
        assert_eq!(BoundaryMode::Reflect.resolve(-2, 5), Some(1));
        assert_eq!(BoundaryMode::Reflect.resolve(5, 5), Some(4));
        assert_eq!(BoundaryMode::Reflect.resolve(6, 5), Some(3));
        assert_eq!(BoundaryMode::Constant.resolve(-1, 5), None);
    }

    #[test]
    fn test_gaussian_preserves_constant_image() {
        let image = Image::new_filled(20, 13, 7.5);
        for mode in [BoundaryMode::Nearest, BoundaryMode::Reflect] {
            let out = gaussian_filter(&image, 1.5, mode);
            assert!(out.iter().all(|&v| (v - 7.5).abs() < 1e-9));
        }
    }

    #[test]
    fn test_gaussian_spreads_spot_symmetrically() {
        let out = gaussian_filter(&spot(21, 10, 10), 2.0, BoundaryMode::Constant);
        let total: f64 = out.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((out[(8, 10)] - out[(12, 10)]).abs() < 1e-12);
        assert!((out[(10, 7)] - out[(7, 10)]).abs() < 1e-12);
        assert!(out[(10, 10)] > out[(11, 10)]);
    }

    #[test]
    fn test_laplace_of_bright_spot_is_negative_at_center() {
        let image = gaussian_filter(&spot(21, 10, 10), 1.0, BoundaryMode::Nearest);
        let log = gaussian_laplace(&image, 1.0);
        assert!(log[(10, 10)] < 0.0);
        assert!(log[(10, 10)] < log[(13, 10)]);
    }

    #[test]
    fn test_sobel_peaks_on_step_edge() {
        let image = Image::from_fn(16, 8, |x, _| if x < 8 { 0.0 } else { 1.0 });
        let edges = sobel(&image);
        assert!(edges[(2, 4)].abs() < 1e-12);
        assert!(edges[(12, 4)].abs() < 1e-12);
        let expected = (0.5f64).sqrt();
        assert!((edges[(7, 4)] - expected).abs() < 1e-12);
        assert!((edges[(8, 4)] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_filter_averages_window() {
        let image = Image::from_fn(9, 9, |x, _| x as f64);
        let out = uniform_filter(&image, 3);
        assert!((out[(4, 4)] - 4.0).abs() < 1e-12);
        // reflect boundary duplicates the edge column
        assert!((out[(0, 4)] - (0.0 + 0.0 + 1.0) / 3.0).abs() < 1e-12);
    }
}
