//! Straightened cell images.
//!
//! A straightened image has one column per midline sample. Row 0 is the
//! farthest sample along the left-hand normal, the centre row is the midline
//! itself and the last row is the farthest sample on the opposite side.

use glam::DVec2;

use crate::error::{Error, Result};
use crate::geometry::{
    bilinear_interpolate, divide_contour_by_midline, orthogonal_intersection_point,
    spline_approximation, unit_perpendicular_vector,
};
use crate::math::{interp, linspace, median};
use crate::{Buffer2, Image};

/// Samples `image` along the midline normals out to half the widest point
/// plus one pixel, in unit steps.
pub fn straighten_cell(image: &Image, midline: &[DVec2], width: &[f64]) -> Image {
    let max_width = width.iter().copied().fold(0.0, f64::max);
    let half = (max_width * 0.5 + 1.0).round() as usize;
    let normals = unit_perpendicular_vector(midline, false);
    sample_strip(image, midline, &normals, half.saturating_sub(1))
}

/// Like [`straighten_cell`], but the step along each normal is scaled by the
/// local width so that every column spans the cell from edge to edge.
///
/// The midline is resampled every `subpixel` pixels and `remove_cap` samples
/// are dropped from both ends.
pub fn straighten_cell_normalize_width(
    image: &Image,
    midline: &[DVec2],
    width: &[f64],
    subpixel: f64,
    remove_cap: usize,
) -> Result<Image> {
    let n = (midline.len() as f64 / subpixel) as usize;
    let resampled = spline_approximation(midline, n, 1.0, false);
    if resampled.len() < 2 * remove_cap + 2 || width.len() < 2 {
        return Err(Error::TooFewPoints {
            required: 2 * remove_cap + 2,
            actual: resampled.len().min(width.len()),
        });
    }

    let xp = linspace(0.0, 1.0, width.len());
    let widths: Vec<f64> = linspace(0.0, 1.0, resampled.len())
        .into_iter()
        .map(|x| interp(x, &xp, width))
        .collect();

    let range = remove_cap..resampled.len() - remove_cap;
    let decapped = &resampled[range.clone()];
    let mut decapped_width = widths[range.clone()].to_vec();
    let last = decapped_width.len() - 1;
    decapped_width[0] = decapped_width[1];
    decapped_width[last] = decapped_width[last - 1];

    let max_width = decapped_width.iter().copied().fold(0.0, f64::max);
    if max_width <= 0.0 {
        return Ok(sample_strip(image, decapped, &vec![DVec2::ZERO; decapped.len()], 0));
    }
    let normals = unit_perpendicular_vector(&resampled, false);
    let offsets: Vec<DVec2> = normals[range]
        .iter()
        .zip(&decapped_width)
        .map(|(&n, &w)| n * subpixel * (w / max_width))
        .collect();
    let steps = (0.5 * max_width / subpixel).round() as usize;
    Ok(sample_strip(image, decapped, &offsets, steps))
}

/// Samples `line ± offset·i` for `i` in `1..=steps`, outermost positive
/// offset first.
fn sample_strip(image: &Image, line: &[DVec2], offsets: &[DVec2], steps: usize) -> Image {
    let rows = 2 * steps + 1;
    Image::from_fn(line.len(), rows, |x, y| {
        let k = steps as f64 - y as f64;
        bilinear_interpolate(image, line[x] + offsets[x] * k)
    })
}

// ============================================================================
// Orthogonal profile mesh
// ============================================================================

/// Profile lines cast orthogonally from the midline to both sides of the
/// contour.
#[derive(Debug, Clone)]
pub struct ProfileMesh {
    /// Crossings with the first contour half, one per midline sample.
    pub l1: Vec<DVec2>,
    /// Crossings with the second contour half.
    pub l2: Vec<DVec2>,
    /// `mesh[(i, k)] = l1[i] + k·(l2[i] − l1[i]) / n_width`.
    pub mesh: Buffer2<DVec2>,
    /// The resampled midline.
    pub midline: Vec<DVec2>,
}

/// Builds a mesh with one column every `unit_micron` of `length` and one row
/// every `unit_micron` of the median width.
///
/// `contour` is closed; `length` and `width` share the unit of `unit_micron`.
pub fn straighten_by_orthogonal_lines(
    contour: &[DVec2],
    midline: &[DVec2],
    length: f64,
    width: &[f64],
    unit_micron: f64,
) -> Result<ProfileMesh> {
    let n_length = (length / unit_micron).round() as usize;
    let n_width = (median(width) / unit_micron).round() as usize;
    if n_length < 2 || n_width == 0 {
        return Err(Error::TooFewPoints {
            required: 2,
            actual: n_length.min(n_width),
        });
    }

    let midline = spline_approximation(midline, n_length, 0.0, false);
    let open = &contour[..contour.len().saturating_sub(1)];
    let (half1, half2) = divide_contour_by_midline(&midline, open)?;
    let normals = unit_perpendicular_vector(&midline, true);
    let l1 = orthogonal_intersection_point(&midline, &half1, Some(&normals));
    let l2 = orthogonal_intersection_point(&midline, &half2, Some(&normals));

    let mesh = Buffer2::from_fn(midline.len(), n_width + 1, |i, k| {
        let step = (l2[i] - l1[i]) / n_width as f64;
        l1[i] + step * k as f64
    });
    Ok(ProfileMesh {
        l1,
        l2,
        mesh,
        midline,
    })
}

/// Image intensity at every mesh node.
pub fn sample_profile_mesh(image: &Image, mesh: &ProfileMesh) -> Image {
    mesh.mesh.map(|&p| bilinear_interpolate(image, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal_line(x0: f64, n: usize, y: f64) -> Vec<DVec2> {
        (0..n).map(|i| DVec2::new(x0 + i as f64, y)).collect()
    }

    #[test]
    fn test_straighten_rows_follow_normal() {
        let image = Image::from_fn(40, 40, |_, y| y as f64);
        let midline = horizontal_line(10.0, 20, 20.0);
        let out = straighten_cell(&image, &midline, &[8.0; 20]);
        // half = round(8 * 0.5 + 1) = 5, so offsets -4..=4
        assert_eq!((out.width(), out.height()), (20, 9));
        assert!(out.row(0).iter().all(|&v| v == 24.0));
        assert!(out.row(4).iter().all(|&v| v == 20.0));
        assert!(out.row(8).iter().all(|&v| v == 16.0));
    }

    #[test]
    fn test_normalized_width_shape() {
        let image = Image::new_filled(40, 40, 5.0);
        let midline = horizontal_line(10.0, 20, 20.0);
        let width = [8.0; 20];

        let out = straighten_cell_normalize_width(&image, &midline, &width, 0.5, 0).unwrap();
        assert_eq!((out.width(), out.height()), (40, 17));
        assert!(out.iter().all(|&v| (v - 5.0).abs() < 1e-9));

        let decapped = straighten_cell_normalize_width(&image, &midline, &width, 0.5, 2).unwrap();
        assert_eq!(decapped.width(), 36);
    }

    #[test]
    fn test_normalized_width_spans_narrow_columns() {
        // a tapering cell: the column at the narrow end still spans its width
        let image = Image::from_fn(40, 40, |_, y| y as f64);
        let midline = horizontal_line(10.0, 20, 20.0);
        let width: Vec<f64> = (0..20).map(|i| 4.0 + 4.0 * i as f64 / 19.0).collect();
        let out = straighten_cell_normalize_width(&image, &midline, &width, 0.5, 0).unwrap();
        let last = out.width() - 1;
        assert!((out[(last, 0)] - 24.0).abs() < 0.05);
        // 4.1 px wide against a maximum of 7.9 px
        assert!(out[(1, 0)] > 21.9 && out[(1, 0)] < 22.2);
    }

    #[test]
    fn test_normalized_width_rejects_short_midline() {
        let image = Image::new_filled(10, 10, 1.0);
        let midline = horizontal_line(2.0, 3, 5.0);
        let err = straighten_cell_normalize_width(&image, &midline, &[2.0; 3], 0.5, 4).unwrap_err();
        assert!(matches!(err, Error::TooFewPoints { .. }));
    }

    fn tilted_ellipse(a: f64, b: f64, n: usize) -> Vec<DVec2> {
        let tilt: f64 = 0.05;
        let (s, c) = tilt.sin_cos();
        let mut points: Vec<DVec2> = (0..n)
            .map(|i| {
                let t = (i as f64 + 0.25) / n as f64 * std::f64::consts::TAU;
                let u = DVec2::new(a * t.cos(), b * t.sin());
                DVec2::new(30.0 + u.x * c - u.y * s, 20.0 + u.x * s + u.y * c)
            })
            .collect();
        points.push(points[0]);
        points
    }

    fn tilted_axis(half_length: f64, n: usize) -> Vec<DVec2> {
        let tilt: f64 = 0.05;
        (0..n)
            .map(|i| {
                let u = -half_length + 2.0 * half_length * i as f64 / (n - 1) as f64;
                DVec2::new(30.0 + u * tilt.cos(), 20.0 + u * tilt.sin())
            })
            .collect()
    }

    #[test]
    fn test_orthogonal_mesh_spans_cell() {
        let contour = tilted_ellipse(20.0, 8.0, 200);
        let midline = tilted_axis(18.0, 10);
        let mesh = straighten_by_orthogonal_lines(&contour, &midline, 36.0, &[16.0; 10], 1.0)
            .unwrap();
        assert_eq!(mesh.midline.len(), 36);
        assert_eq!((mesh.mesh.width(), mesh.mesh.height()), (36, 17));

        let centre = 18;
        let span = mesh.mesh[(centre, 0)].distance(mesh.mesh[(centre, 16)]);
        assert!((span - 16.0).abs() < 0.2, "span {}", span);
        // the midline sits halfway between the two crossings
        let mid = (mesh.l1[centre] + mesh.l2[centre]) * 0.5;
        assert!(mid.distance(mesh.midline[centre]) < 0.2);
    }

    #[test]
    fn test_mesh_sampling_reads_rows() {
        let contour = tilted_ellipse(20.0, 8.0, 200);
        let midline = tilted_axis(18.0, 10);
        let mesh = straighten_by_orthogonal_lines(&contour, &midline, 36.0, &[16.0; 10], 1.0)
            .unwrap();
        let image = Image::from_fn(64, 64, |_, y| y as f64);
        let sampled = sample_profile_mesh(&image, &mesh);
        assert_eq!((sampled.width(), sampled.height()), (36, 17));
        let p = mesh.mesh[(18, 8)];
        assert!((sampled[(18, 8)] - p.y).abs() < 1e-3);
    }
}
