//! Length, bending and rod-shape complexity.

use std::f64::consts::PI;

use glam::DVec2;
use rustfft::num_complex::Complex;

use crate::geometry::line_length;

/// Polyline length scaled to physical units.
pub fn measure_length(points: &[DVec2], pixel_microns: f64) -> f64 {
    line_length(points) * pixel_microns
}

/// Point as `row + i·column`, which fixes the sign of bend angles.
#[inline]
fn as_complex(p: DVec2) -> Complex<f64> {
    Complex::new(p.y, p.x)
}

/// Angle in degrees at every point of a closed curve between the chords to
/// the points `window` steps behind and ahead; indices wrap.
pub fn bend_angle(points: &[DVec2], window: usize) -> Vec<f64> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let p1 = as_complex(points[(i + n - window % n) % n]);
            let p2 = as_complex(points[i]);
            let p3 = as_complex(points[(i + window) % n]);
            ((p1 - p3) / (p1 - p2)).arg().to_degrees()
        })
        .collect()
}

/// Turning angle in degrees at every point of an open curve that has
/// `window` neighbours on both sides.
pub fn bend_angle_open(points: &[DVec2], window: usize) -> Vec<f64> {
    if points.len() <= 2 * window {
        return Vec::new();
    }
    (window..points.len() - window)
        .map(|i| {
            let p1 = as_complex(points[i - window]);
            let p2 = as_complex(points[i]);
            let p3 = as_complex(points[i + window]);
            ((p2 - p3) / (p1 - p2)).arg().to_degrees()
        })
        .collect()
}

/// Radius of the capsule of total `length` whose area is `area`:
/// the positive root of `(π − 4)·r² + 2·L·r − A = 0`.
pub fn estimate_r_from_area(area: f64, length: f64) -> f64 {
    let a = PI - 4.0;
    let b = 2.0 * length;
    let c = -area;
    (-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a)
}

/// Bending density of the ideal capsule with the given area and length.
///
/// A closed curve turns `180 · window` degrees in total under [`bend_angle`];
/// the density spreads that over the capsule perimeter. Cells shorter than
/// the radius of a disk of equal area fall back to the measured `perimeter`.
pub fn standard_rod_complexity(
    area: f64,
    length: f64,
    window: usize,
    perimeter: f64,
    correction_factor: f64,
) -> f64 {
    let disk_radius = (area / PI).sqrt();
    let total_bending = window as f64 * 180.0;
    let (cap_perimeter, rod_perimeter) = if length > disk_radius {
        let r = estimate_r_from_area(area, length);
        let rod = length - 2.0 * r;
        (2.0 * PI * r / correction_factor, 2.0 * rod / correction_factor)
    } else {
        (perimeter, 0.0)
    };
    total_bending / (cap_perimeter + rod_perimeter)
}

/// Mean absolute bending of `contour` per unit perimeter relative to the
/// ideal capsule. `contour` is closed and does not repeat its first point.
pub fn shape_complexity(
    contour: &[DVec2],
    area: f64,
    length: f64,
    window: usize,
    correction_factor: f64,
) -> f64 {
    let mut closed = contour.to_vec();
    if let Some(&first) = contour.first() {
        closed.push(first);
    }
    let perimeter = line_length(&closed);
    let bending: f64 = bend_angle(contour, window).iter().map(|a| a.abs()).sum();
    let ideal = standard_rod_complexity(area, length, window, perimeter, correction_factor);
    bending / perimeter / ideal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(r: f64, n: usize) -> Vec<DVec2> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                DVec2::new(20.0 + r * t.cos(), 20.0 + r * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_length_scales_with_pixel_size() {
        let line = [DVec2::ZERO, DVec2::new(3.0, 4.0), DVec2::new(3.0, 10.0)];
        assert!((measure_length(&line, 1.0) - 11.0).abs() < 1e-12);
        assert!((measure_length(&line, 0.065) - 0.715).abs() < 1e-12);
    }

    #[test]
    fn test_circle_turns_half_window_turns() {
        let points = circle(10.0, 100);
        let angles = bend_angle(&points, 10);
        assert_eq!(angles.len(), 100);
        let total: f64 = angles.iter().map(|a| a.abs()).sum();
        assert!((total - 1800.0).abs() < 1e-6, "total {}", total);
        // uniform curvature gives identical angles of one sign
        assert!(angles.iter().all(|a| (a - angles[0]).abs() < 1e-9));
    }

    #[test]
    fn test_open_bend_of_straight_and_right_angle() {
        let straight: Vec<DVec2> = (0..12).map(|i| DVec2::new(i as f64, 2.0)).collect();
        let angles = bend_angle_open(&straight, 3);
        assert_eq!(angles.len(), 6);
        assert!(angles.iter().all(|a| a.abs() < 1e-12));

        let corner = [
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
        ];
        let angles = bend_angle_open(&corner, 1);
        assert_eq!(angles.len(), 1);
        assert!((angles[0].abs() - 90.0).abs() < 1e-9);
        assert!(bend_angle_open(&corner, 2).is_empty());
    }

    #[test]
    fn test_capsule_radius_from_area() {
        // r = 4, cylinder length 12: area = π·16 + 8·12, total length 20
        let area = PI * 16.0 + 96.0;
        assert!((estimate_r_from_area(area, 20.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_cell_complexity() {
        let points = circle(10.0, 120);
        let area = PI * 100.0;
        // a disk is a capsule without a cylinder, so only the perimeter
        // correction separates it from the ideal
        let complexity = shape_complexity(&points, area, 20.0, 10, 0.75);
        assert!((complexity - 1.0 / 0.75).abs() < 0.01, "complexity {}", complexity);

        let short = standard_rod_complexity(area, 5.0, 10, 62.8, 0.75);
        assert!((short - 1800.0 / 62.8).abs() < 1e-9);
    }
}
