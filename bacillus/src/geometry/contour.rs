//! Cell boundary: tracing, snapping to the edge field, and splitting into halves.
//!
//! Contours are closed (first point repeated as last) and oriented so the
//! left-hand normals of [`unit_perpendicular_vector`] point into the cell.

use glam::DVec2;

use super::primitives::{
    between_contour_points, bilinear_interpolate, distance_matrix, signed_area,
    two_smallest, unit_perpendicular_vector,
};
use super::spline::spline_approximation;
use crate::config::ContourConfig;
use crate::error::{Error, Result};
use crate::Mask;

/// Moore neighbourhood, clockwise on screen starting west.
const MOORE: [(isize, isize); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

// ============================================================================
// Tracing
// ============================================================================

/// Outer boundary pixels of the first foreground object in raster order.
///
/// Returns pixel centres as a closed, positively oriented polyline; an empty
/// mask gives an empty contour.
pub fn trace_contour(mask: &Mask) -> Vec<DVec2> {
    let Some(first) = mask.iter().position(|&v| v) else {
        return Vec::new();
    };
    let width = mask.width();
    let start = ((first % width) as isize, (first / width) as isize);
    let is_fg = |(x, y): (isize, isize)| mask.get_signed(x, y).copied().unwrap_or(false);

    let mut boundary = vec![start];
    let mut current = start;
    // raster order guarantees the west neighbour of the start is background
    let mut backtrack = 0;
    let mut second = None;
    for _ in 0..4 * mask.len() + 8 {
        let Some((next, next_backtrack)) = moore_step(current, backtrack, &is_fg) else {
            break;
        };
        if current == start && second == Some(next) {
            break;
        }
        if second.is_none() {
            second = Some(next);
        }
        boundary.push(next);
        current = next;
        backtrack = next_backtrack;
    }
    if boundary.len() > 1 && boundary.last() == boundary.first() {
        boundary.pop();
    }

    let mut contour: Vec<DVec2> = boundary
        .into_iter()
        .map(|(x, y)| DVec2::new(x as f64, y as f64))
        .collect();
    if signed_area(&contour) < 0.0 {
        contour.reverse();
    }
    contour.push(contour[0]);
    contour
}

/// Next boundary pixel clockwise from the backtrack direction, with the new
/// backtrack direction relative to it.
fn moore_step(
    current: (isize, isize),
    backtrack: usize,
    is_fg: &impl Fn((isize, isize)) -> bool,
) -> Option<((isize, isize), usize)> {
    for k in 1..=8 {
        let dir = (backtrack + k) % 8;
        let next = (current.0 + MOORE[dir].0, current.1 + MOORE[dir].1);
        if is_fg(next) {
            return Some((next, backtrack_after(dir)));
        }
    }
    None
}

/// Direction, seen from the pixel reached by stepping along `dir`, of the
/// background pixel examined just before it.
#[inline]
fn backtrack_after(dir: usize) -> usize {
    ((dir & !1) + 6) % 8
}

/// Moves every point `scale` pixels along the outward normal.
pub fn expand_contour(contour: &[DVec2], scale: f64) -> Vec<DVec2> {
    unit_perpendicular_vector(contour, true)
        .into_iter()
        .zip(contour)
        .map(|(n, &p)| p - scale * n)
        .collect()
}

/// Traced, smoothed and slightly expanded boundary of a cell mask.
pub fn initial_contour(mask: &Mask, config: &ContourConfig) -> Vec<DVec2> {
    let traced = trace_contour(mask);
    if traced.is_empty() {
        return traced;
    }
    let smoothed = spline_approximation(&traced, traced.len(), config.trace_smooth_factor, true);
    expand_contour(&smoothed, config.expansion)
}

// ============================================================================
// Snapping
// ============================================================================

/// A contour after [`contour_optimization`].
#[derive(Debug, Clone)]
pub struct SnappedContour {
    /// Resampled at twice the input point count.
    pub points: Vec<DVec2>,
    /// Per input point: whether it settled on an edge peak (or was suppressed).
    pub converged: Vec<bool>,
}

/// Pulls every contour point onto the ridge of `edge_field` along its normal.
///
/// Each pass probes the field at the point and `step` pixels inward and
/// outward. A point whose centre sample is the largest moves to the vertex of
/// the parabola through the three samples and settles; otherwise it moves half
/// a step toward the larger side and is probed again next pass. Points whose
/// best sample is below `edge_cutoff` settle without moving. Points that never
/// settle, or drift `max_displacement_sq` or more, are restored.
pub fn contour_optimization(
    contour: &[DVec2],
    edge_field: &crate::Image,
    config: &ContourConfig,
) -> SnappedContour {
    config.validate();
    let n = contour.len();
    let mut points = contour.to_vec();
    let mut unstable = vec![true; n];

    for _ in 0..config.max_passes {
        if !unstable.iter().any(|&u| u) {
            break;
        }
        let normals = unit_perpendicular_vector(&points, true);
        for i in 0..n {
            if !unstable[i] {
                continue;
            }
            let (moved, settled) = snap_point(points[i], normals[i] * config.step, edge_field, config);
            points[i] = moved;
            if settled {
                unstable[i] = false;
            }
        }
    }

    for (i, p) in points.iter_mut().enumerate() {
        if unstable[i] || contour[i].distance_squared(*p) >= config.max_displacement_sq {
            *p = contour[i];
        }
    }
    if n > 0 {
        points[n - 1] = points[0];
    }

    tracing::trace!(
        points = n,
        unsettled = unstable.iter().filter(|&&u| u).count(),
        "contour snapped"
    );

    SnappedContour {
        points: spline_approximation(&points, 2 * n, config.smooth_factor, true),
        converged: unstable.into_iter().map(|u| !u).collect(),
    }
}

fn snap_point(
    p: DVec2,
    probe: DVec2,
    edge_field: &crate::Image,
    config: &ContourConfig,
) -> (DVec2, bool) {
    let v_in = bilinear_interpolate(edge_field, p + probe);
    let v0 = bilinear_interpolate(edge_field, p);
    let v_out = bilinear_interpolate(edge_field, p - probe);
    let samples = [v_in, v0, v_out];

    // first index wins ties
    let mut best = 0;
    for (k, &v) in samples.iter().enumerate().skip(1) {
        if v > samples[best] {
            best = k;
        }
    }
    let suppressed = samples[best] < config.edge_cutoff;

    let a = 0.5 * (v_in - v_out);
    let mut b = v_in - 2.0 * v0 + v_out;
    if b == 0.0 {
        b = f64::INFINITY;
    }
    let dv = if suppressed { 0.0 } else { a / b };

    match (best, suppressed) {
        (_, true) => (p, true),
        (1, false) => (p - dv * probe, true),
        (0, false) => (p + 0.5 * probe, false),
        _ => (p - 0.5 * probe, false),
    }
}

// ============================================================================
// Division
// ============================================================================

/// Splits a closed contour at the points nearest `p1` and `p2`.
///
/// The first half runs forward between the two split points, the second half
/// wraps around through the closing point.
pub fn divide_contour(
    p1: DVec2,
    p2: DVec2,
    contour: &[DVec2],
) -> Result<(Vec<DVec2>, Vec<DVec2>)> {
    let pos1 = between_contour_points(p1, contour);
    let pos2 = between_contour_points(p2, contour);
    if pos1 == pos2 {
        return Err(Error::IdenticalEndpoints { index: pos1 });
    }
    let (pos1, pos2) = (pos1.min(pos2), pos1.max(pos2));
    let last = contour.len() - 1;
    let half1 = contour[pos1..(pos2 + 1).min(last)].to_vec();
    let mut half2 = contour[pos2..last].to_vec();
    half2.extend_from_slice(&contour[..pos1]);
    Ok((half1, half2))
}

/// Splits an open contour (closing point removed) into the two sides of a
/// midline by inserting the midline poles next to their nearest contour
/// points.
pub fn divide_contour_by_midline(
    midline: &[DVec2],
    contour: &[DVec2],
) -> Result<(Vec<DVec2>, Vec<DVec2>)> {
    if midline.len() < 2 || contour.len() < 3 {
        return Err(Error::TooFewPoints {
            required: 3,
            actual: contour.len().min(midline.len()),
        });
    }
    let first = midline[0];
    let last = midline[midline.len() - 1];
    let d1 = distance_matrix(contour, &[first]);
    let d2 = distance_matrix(contour, &[last]);
    let (id1, id2) = two_smallest(d1.pixels());
    let (id3, id4) = two_smallest(d2.pixels());

    let insert_after = |a: usize, b: usize| {
        if a.abs_diff(b) == 1 {
            a.max(b) + 1
        } else {
            a.max(b) + 2
        }
    };

    let mut cp = contour.to_vec();
    let (term1, term2) = if id1.max(id2) < id3.max(id4) {
        let term1 = id1.max(id2);
        let term2 = insert_after(id3, id4);
        cp.insert(term1, first);
        cp.insert(term2.min(cp.len()), last);
        (term1, term2)
    } else {
        let term1 = id3.max(id4);
        let term2 = insert_after(id1, id2);
        cp.insert(term1, last);
        cp.insert(term2.min(cp.len()), first);
        (term1, term2)
    };
    if term1 == term2 {
        return Err(Error::IdenticalEndpoints { index: term1 });
    }

    let (pos1, pos2) = (term1.min(term2), term1.max(term2));
    let half1 = cp[pos1..(pos2 + 1).min(cp.len() - 1)].to_vec();
    let mut half2 = cp[pos2.min(cp.len())..].to_vec();
    half2.extend_from_slice(&cp[..pos1 + 1]);
    Ok((half1, half2))
}

/// Replaces points that jump more than `tolerance` from their predecessor by
/// a linear extrapolation of the two points before them.
pub fn suppress_extreme_edge_points(edge: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    let mut out = edge.to_vec();
    let n = edge.len();
    for i in 0..n.saturating_sub(1) {
        if edge[i].distance(edge[i + 1]) > tolerance {
            let before = edge[(i + n - 1) % n];
            out[i + 1] = 2.0 * edge[i] - before;
        }
    }
    out
}

/// Largest pairwise distance between boundary points, at least the point count.
pub fn estimate_boundary_length(boundary: &[DVec2]) -> f64 {
    let mut longest = boundary.len() as f64;
    for (i, a) in boundary.iter().enumerate() {
        for b in &boundary[i + 1..] {
            longest = longest.max(a.distance(*b));
        }
    }
    longest
}
