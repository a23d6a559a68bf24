//! Synthetic cells and noise for tests and benchmarks.

#![allow(dead_code)]

use glam::DVec2;
use rand::prelude::*;

use crate::{Image, Mask};

/// A filled ellipse, the stand-in for a rod-shaped cell.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticCell {
    pub center: DVec2,
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Rotation of the major axis from the x axis, radians.
    pub angle: f64,
}

impl SyntheticCell {
    pub fn new(center: DVec2, semi_major: f64, semi_minor: f64, angle: f64) -> Self {
        Self {
            center,
            semi_major,
            semi_minor,
            angle,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let d = DVec2::new(x, y) - self.center;
        let (sin, cos) = self.angle.sin_cos();
        let u = d.x * cos + d.y * sin;
        let v = -d.x * sin + d.y * cos;
        (u / self.semi_major).powi(2) + (v / self.semi_minor).powi(2) <= 1.0
    }

    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.semi_major * self.semi_minor
    }

    pub fn mask(&self, width: usize, height: usize) -> Mask {
        Mask::from_fn(width, height, |x, y| self.contains(x as f64, y as f64))
    }
}

/// Dark cells on a bright background, as they appear in phase contrast.
pub fn phase_contrast_frame(
    width: usize,
    height: usize,
    cells: &[SyntheticCell],
    background: f64,
    foreground: f64,
) -> Image {
    Image::from_fn(width, height, |x, y| {
        if cells.iter().any(|c| c.contains(x as f64, y as f64)) {
            foreground
        } else {
            background
        }
    })
}

/// Adds seeded zero-mean Gaussian noise (Box-Muller).
pub fn add_gaussian_noise(image: &Image, sigma: f64, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    image.map(|v| {
        let u1: f64 = rng.random_range(1e-12..1.0);
        let u2: f64 = rng.random_range(0.0..1.0);
        let r = (-2.0 * u1.ln()).sqrt() * sigma;
        v + r * (2.0 * std::f64::consts::PI * u2).cos()
    })
}

/// The 64x64 scene used by end-to-end tests: one 20x8 ellipse rotated 30°,
/// background 1000, cell 400, noise sigma 5.
pub fn single_cell_scene() -> (Image, SyntheticCell) {
    let cell = SyntheticCell::new(
        DVec2::new(32.0, 32.0),
        20.0,
        8.0,
        30f64.to_radians(),
    );
    let image = phase_contrast_frame(64, 64, &[cell], 1000.0, 400.0);
    (add_gaussian_noise(&image, 5.0, 7), cell)
}

/// Initialize tracing subscriber for tests.
/// Respects RUST_LOG env var, defaults to "info".
#[cfg(test)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
