//! Benchmark module for contour and midline geometry.
//! Run with: cargo bench -p bacillus --features bench --bench geometry

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use glam::DVec2;

use super::{
    contour_optimization, direct_intersect_distance, initial_contour, intersect_matrix,
    midline_approximation, spline_approximation,
};
use crate::config::{ContourConfig, MidlineConfig};
use crate::filter::{normalize_min_max, sobel};
use crate::testing::{phase_contrast_frame, SyntheticCell};

/// Register geometry benchmarks with Criterion.
pub fn benchmarks(c: &mut Criterion) {
    benchmark_spline(c);
    benchmark_contour(c);
    benchmark_midline(c);
}

fn ellipse(n: usize) -> Vec<DVec2> {
    let mut points: Vec<DVec2> = (0..n)
        .map(|i| {
            let t = (i as f64 + 0.25) / n as f64 * std::f64::consts::TAU;
            DVec2::new(40.0 + 20.0 * t.cos(), 40.0 + 8.0 * t.sin())
        })
        .collect();
    points.push(points[0]);
    points
}

fn axis(n: usize) -> Vec<DVec2> {
    (0..n)
        .map(|i| DVec2::new(22.0 + 36.0 * i as f64 / (n - 1) as f64, 40.1))
        .collect()
}

fn benchmark_spline(c: &mut Criterion) {
    let mut group = c.benchmark_group("spline_approximation");
    for n in [50, 200, 800] {
        let contour = ellipse(n);
        group.bench_with_input(BenchmarkId::new("closed", n), &contour, |b, contour| {
            b.iter(|| black_box(spline_approximation(black_box(contour), n, 1.0, true)))
        });
        let line = axis(n);
        group.bench_with_input(BenchmarkId::new("open", n), &line, |b, line| {
            b.iter(|| black_box(spline_approximation(black_box(line), n, 1.0, false)))
        });
    }
    group.finish();
}

fn benchmark_contour(c: &mut Criterion) {
    let mut group = c.benchmark_group("contour");
    let cell = SyntheticCell::new(DVec2::new(40.0, 40.0), 20.0, 8.0, 0.3);
    let mask = cell.mask(80, 80);
    let edges = sobel(&normalize_min_max(&phase_contrast_frame(
        80,
        80,
        &[cell],
        1000.0,
        400.0,
    )));
    let config = ContourConfig::default();

    group.bench_function("initial_contour", |b| {
        b.iter(|| black_box(initial_contour(black_box(&mask), &config)))
    });
    let traced = initial_contour(&mask, &config);
    group.bench_function("contour_optimization", |b| {
        b.iter(|| black_box(contour_optimization(black_box(&traced), &edges, &config)))
    });
    group.finish();
}

fn benchmark_midline(c: &mut Criterion) {
    let mut group = c.benchmark_group("midline");
    let contour = ellipse(200);
    let config = MidlineConfig::default();
    for n in [20, 40, 80] {
        let line = axis(n);
        group.bench_with_input(BenchmarkId::new("intersect_matrix", n), &line, |b, line| {
            b.iter(|| black_box(intersect_matrix(black_box(line), &contour, None)))
        });
        group.bench_with_input(BenchmarkId::new("approximation", n), &line, |b, line| {
            b.iter(|| black_box(midline_approximation(black_box(line), &contour, &config)))
        });
        group.bench_with_input(BenchmarkId::new("width", n), &line, |b, line| {
            b.iter(|| black_box(direct_intersect_distance(black_box(line), &contour)))
        });
    }
    group.finish();
}
