//! Benchmark module for image filters.
//! Run with: cargo bench -p bacillus --features bench --bench filters

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput};

use super::{fft, gaussian_filter, gaussian_laplace, rolling_ball_bg_subtraction, sobel, BoundaryMode};
use crate::config::RollingBallConfig;
use crate::testing::{add_gaussian_noise, phase_contrast_frame, SyntheticCell};
use crate::Image;

const SIZES: [usize; 3] = [128, 256, 512];

/// Register filter benchmarks with Criterion.
pub fn benchmarks(c: &mut Criterion) {
    benchmark_gaussian(c);
    benchmark_edges(c);
    benchmark_rolling_ball(c);
    benchmark_fft(c);
}

fn frame(size: usize) -> Image {
    let centre = size as f64 * 0.5;
    let cells = [
        SyntheticCell::new(glam::DVec2::new(centre, centre), 20.0, 8.0, 0.4),
        SyntheticCell::new(glam::DVec2::new(centre * 0.5, centre * 0.6), 18.0, 7.0, -1.1),
    ];
    add_gaussian_noise(&phase_contrast_frame(size, size, &cells, 1000.0, 400.0), 10.0, 1)
}

fn benchmark_gaussian(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_filter");
    for size in SIZES {
        let image = frame(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        for sigma in [1.0, 2.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("sigma_{}", sigma), size),
                &image,
                |b, image| b.iter(|| black_box(gaussian_filter(black_box(image), sigma, BoundaryMode::Nearest))),
            );
        }
    }
    group.finish();
}

fn benchmark_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("edges");
    for size in SIZES {
        let image = frame(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("sobel", size), &image, |b, image| {
            b.iter(|| black_box(sobel(black_box(image))))
        });
        group.bench_with_input(BenchmarkId::new("laplace", size), &image, |b, image| {
            b.iter(|| black_box(gaussian_laplace(black_box(image), 1.0)))
        });
    }
    group.finish();
}

fn benchmark_rolling_ball(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_ball");
    group.sample_size(20);
    let config = RollingBallConfig::default();
    for size in SIZES {
        let image = frame(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| black_box(rolling_ball_bg_subtraction(black_box(image), &config)))
        });
    }
    group.finish();
}

fn benchmark_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft");
    for size in SIZES {
        let image = frame(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| black_box(fft(black_box(image), true)))
        });
    }
    group.finish();
}
