//! Rolling-ball background subtraction.
//!
//! The image is smoothed, shrunk by a local-minimum reduction, and a trimmed
//! hemisphere is rolled under the shrunk surface. The resulting background is
//! upsampled back to full size and subtracted.
//!
//! Ball placement is split into two gather passes so both can run in parallel
//! without write conflicts:
//! 1. for every centre `p`, the lowest ball height `m[p] = min(img[q] - ball[q - p])`
//! 2. for every pixel `q`, the highest ball surface `max(m[p] + ball[q - p])`

use rayon::prelude::*;

use super::convolution::{gaussian_filter, BoundaryMode};
use crate::config::RollingBallConfig;
use crate::Image;

const ROWS_PER_CHUNK: usize = 8;

/// A trimmed hemispherical structuring element sized for a shrunk image.
#[derive(Debug, Clone)]
pub struct RollingBall {
    shrink_factor: usize,
    radius: f64,
    half_width: usize,
    /// Height of the ball surface; NaN outside the sphere.
    heights: Image,
}

impl RollingBall {
    /// Picks the shrink factor and arc trim from the radius, then builds the ball.
    pub fn new(radius: f64) -> Self {
        let (shrink_factor, arc_trim_percent) = if radius <= 10.0 {
            (1, 24.0)
        } else if radius <= 20.0 {
            (2, 24.0)
        } else if radius <= 100.0 {
            (4, 32.0)
        } else {
            (8, 40.0)
        };
        let radius = radius / shrink_factor as f64;
        let x_trim = (arc_trim_percent * radius / 100.0) as usize;
        let half_width = (radius - x_trim as f64).max(0.0) as usize;
        let width = 2 * half_width + 1;
        let r2 = radius * radius;
        let heights = Image::from_fn(width, width, |x, y| {
            let dx = x as f64 - half_width as f64;
            let dy = y as f64 - half_width as f64;
            let h2 = r2 - dx * dx - dy * dy;
            if h2 < 0.0 {
                f64::NAN
            } else {
                h2.sqrt()
            }
        });

        Self {
            shrink_factor,
            radius,
            half_width,
            heights,
        }
    }

    pub fn shrink_factor(&self) -> usize {
        self.shrink_factor
    }

    /// Ball radius in shrunk pixels.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn width(&self) -> usize {
        2 * self.half_width + 1
    }

    #[inline]
    fn height_at(&self, dx: isize, dy: isize) -> f64 {
        let hw = self.half_width as isize;
        self.heights[((dx + hw) as usize, (dy + hw) as usize)]
    }
}

/// Subtracts a rolling-ball background estimate; the result is clamped at zero.
pub fn rolling_ball_bg_subtraction(image: &Image, config: &RollingBallConfig) -> Image {
    config.validate();
    if image.is_empty() {
        return image.clone();
    }

    let ball = RollingBall::new(config.radius);
    let smoothed = gaussian_filter(image, config.smoothing_sigma, BoundaryMode::Nearest);
    let mut factor = ball.shrink_factor;
    if image.width() / factor == 0 || image.height() / factor == 0 {
        factor = 1;
    }
    let shrunk = shrink_local_min(&smoothed, factor);
    let background = rolling_ball_background(&shrunk, &ball);
    let background = resize_bilinear(&background, image.width(), image.height());

    tracing::debug!(
        radius = config.radius,
        shrink_factor = factor,
        ball_width = ball.width(),
        "rolling ball background estimated"
    );

    image.zip_map(&background, |v, bg| (v - bg).max(0.0))
}

/// Minimum over non-overlapping `factor` x `factor` blocks; partial blocks are dropped.
fn shrink_local_min(image: &Image, factor: usize) -> Image {
    let width = image.width() / factor;
    let height = image.height() / factor;
    Image::from_fn(width, height, |x, y| {
        let mut min = f64::INFINITY;
        for sy in y * factor..(y + 1) * factor {
            for &v in &image.row(sy)[x * factor..(x + 1) * factor] {
                min = min.min(v);
            }
        }
        min
    })
}

fn rolling_ball_background(image: &Image, ball: &RollingBall) -> Image {
    let lowest = ball_pass(image, ball, f64::INFINITY, |acc, v, h| acc.min(v - h));
    ball_pass(&lowest, ball, f64::NEG_INFINITY, |acc, v, h| acc.max(v + h))
}

/// Folds `f(acc, source, ball_height)` over the ball footprint around every
/// pixel, clipped to the image.
fn ball_pass(
    source: &Image,
    ball: &RollingBall,
    init: f64,
    f: impl Fn(f64, f64, f64) -> f64 + Sync,
) -> Image {
    let (width, height) = (source.width(), source.height());
    let hw = ball.half_width as isize;
    let mut output = vec![0.0; source.len()];

    output
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                let y = (y_start + local_y) as isize;
                for (x, out) in out_row.iter_mut().enumerate() {
                    let x = x as isize;
                    let mut acc = init;
                    for dy in -hw..=hw {
                        let sy = y + dy;
                        if sy < 0 || sy >= height as isize {
                            continue;
                        }
                        for dx in -hw..=hw {
                            let sx = x + dx;
                            if sx < 0 || sx >= width as isize {
                                continue;
                            }
                            let h = ball.height_at(dx, dy);
                            if h.is_nan() {
                                continue;
                            }
                            acc = f(acc, source[(sx as usize, sy as usize)], h);
                        }
                    }
                    *out = acc;
                }
            }
        });

    Image::new(width, height, output)
}

/// Bilinear resize with pixel-centre alignment.
fn resize_bilinear(image: &Image, width: usize, height: usize) -> Image {
    let sx = image.width() as f64 / width as f64;
    let sy = image.height() as f64 / height as f64;
    let max_x = (image.width() - 1) as f64;
    let max_y = (image.height() - 1) as f64;

    Image::from_fn(width, height, |x, y| {
        let fx = ((x as f64 + 0.5) * sx - 0.5).clamp(0.0, max_x);
        let fy = ((y as f64 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(image.width() - 1);
        let y1 = (y0 + 1).min(image.height() - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;
        let top = image[(x0, y0)] * (1.0 - tx) + image[(x1, y0)] * tx;
        let bottom = image[(x0, y1)] * (1.0 - tx) + image[(x1, y1)] * tx;
        top * (1.0 - ty) + bottom * ty
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::add_gaussian_noise;

    #[test]
    fn test_ball_table_by_radius() {
        assert_eq!(RollingBall::new(8.0).shrink_factor(), 1);
        assert_eq!(RollingBall::new(15.0).shrink_factor(), 2);
        assert_eq!(RollingBall::new(40.0).shrink_factor(), 4);
        assert_eq!(RollingBall::new(150.0).shrink_factor(), 8);

        // radius 40 -> 10 shrunk pixels, 32% trim -> half width 7
        let ball = RollingBall::new(40.0);
        assert_eq!(ball.radius(), 10.0);
        assert_eq!(ball.width(), 15);
        assert_eq!(ball.height_at(0, 0), 10.0);
    }

    #[test]
    fn test_small_ball_masks_corners_outside_sphere() {
        // radius 10, 24% trim -> half width 8, corner distance sqrt(128) > 10
        let ball = RollingBall::new(10.0);
        assert_eq!(ball.width(), 17);
        assert!(ball.height_at(8, 8).is_nan());
        assert!(!ball.height_at(0, 8).is_nan());
    }

    #[test]
    fn test_shrink_takes_block_minimum() {
        let image = Image::from_fn(5, 4, |x, y| (x + 10 * y) as f64);
        let shrunk = shrink_local_min(&image, 2);
        assert_eq!((shrunk.width(), shrunk.height()), (2, 2));
        assert_eq!(shrunk.pixels(), &[0.0, 2.0, 20.0, 22.0]);
    }

    #[test]
    fn test_output_is_non_negative_with_same_shape() {
        let base = Image::from_fn(64, 48, |x, y| {
            let bump = if (20..30).contains(&x) && (10..20).contains(&y) { 300.0 } else { 0.0 };
            200.0 + 2.0 * x as f64 + bump
        });
        let image = add_gaussian_noise(&base, 20.0, 3);
        let out = rolling_ball_bg_subtraction(&image, &RollingBallConfig::default());
        assert_eq!((out.width(), out.height()), (64, 48));
        assert!(out.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_flat_background_is_removed_and_peak_kept() {
        let image = Image::from_fn(40, 40, |x, y| {
            if (18..22).contains(&x) && (18..22).contains(&y) {
                1500.0
            } else {
                1000.0
            }
        });
        let config = RollingBallConfig {
            radius: 8.0,
            ..Default::default()
        };
        let out = rolling_ball_bg_subtraction(&image, &config);
        assert!(out[(2, 2)] < 1.0);
        assert!(out[(20, 20)] > 200.0);
    }

    #[test]
    fn test_tiny_image_falls_back_to_full_resolution() {
        let image = Image::new_filled(3, 3, 50.0);
        let out = rolling_ball_bg_subtraction(&image, &RollingBallConfig::default());
        assert_eq!((out.width(), out.height()), (3, 3));
        assert!(out.iter().all(|&v| v.abs() < 1e-9));
    }
}
