//! Point, line and sampling kernels shared by the contour and midline code.
//!
//! Points are `DVec2 { x: column, y: row }`. Intersections of parallel lines
//! come out non-finite; callers rank them as infinitely far away.

use std::f64::consts::FRAC_PI_2;

use glam::DVec2;

use crate::error::{Error, Result};
use crate::{Buffer2, Image};

#[inline]
pub fn distance(a: DVec2, b: DVec2) -> f64 {
    a.distance(b)
}

/// Sum of segment lengths of an open polyline.
pub fn line_length(points: &[DVec2]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Shoelace area; positive when the left-hand normal points into the polygon.
///
/// The polygon is closed implicitly, a repeated closing point adds nothing.
pub fn signed_area(points: &[DVec2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    0.5 * twice
}

/// Intersection of the infinite line through `p1`, `p2` with the one through `p3`, `p4`.
#[inline]
pub fn line_intersect(p1: DVec2, p2: DVec2, p3: DVec2, p4: DVec2) -> DVec2 {
    let a1 = p2.y - p1.y;
    let b1 = p1.x - p2.x;
    let c1 = a1 * p1.x + b1 * p1.y;
    let a2 = p4.y - p3.y;
    let b2 = p3.x - p4.x;
    let c2 = a2 * p3.x + b2 * p3.y;
    DVec2::new(
        (b1 * c2 - b2 * c1) / (a2 * b1 - a1 * b2),
        (a1 * c2 - a2 * c1) / (b2 * a1 - b1 * a2),
    )
}

/// Left-hand unit normal of every segment, one per point.
///
/// Closed curves repeat the last normal at the end, open curves repeat the
/// first one at the start.
pub fn unit_perpendicular_vector(points: &[DVec2], closed: bool) -> Vec<DVec2> {
    if points.len() < 2 {
        return vec![DVec2::ZERO; points.len()];
    }
    let mut normals: Vec<DVec2> = points
        .windows(2)
        .map(|w| {
            let d = w[1] - w[0];
            let angle = d.y.atan2(d.x) + FRAC_PI_2;
            DVec2::new(angle.cos(), angle.sin())
        })
        .collect();
    if closed {
        let last = normals[normals.len() - 1];
        normals.push(last);
    } else {
        normals.insert(0, normals[0]);
    }
    normals
}

/// Intersections of every contour segment's line with the normal line cast
/// through every point of `line`.
///
/// The result is indexed `(line point, contour segment)`. Normals default to
/// the open-curve normals of `line`.
pub fn intersect_matrix(
    line: &[DVec2],
    contour: &[DVec2],
    normals: Option<&[DVec2]>,
) -> Buffer2<DVec2> {
    let owned;
    let normals = match normals {
        Some(n) => n,
        None => {
            owned = unit_perpendicular_vector(line, false);
            &owned
        }
    };
    debug_assert_eq!(normals.len(), line.len());

    let segments = contour.len().saturating_sub(1);
    Buffer2::from_fn(line.len(), segments, |j, i| {
        line_intersect(contour[i], contour[i + 1], line[j], line[j] + normals[j])
    })
}

/// Pairwise distances, indexed `(index into b, index into a)`.
pub fn distance_matrix(a: &[DVec2], b: &[DVec2]) -> Buffer2<f64> {
    Buffer2::from_fn(b.len(), a.len(), |j, i| a[i].distance(b[j]))
}

/// Componentwise `(p - v1) * (p - v2)`; negative on an axis where `p` lies
/// strictly between the segment ends.
#[inline]
pub(crate) fn segment_products(p: DVec2, v1: DVec2, v2: DVec2) -> DVec2 {
    (p - v1) * (p - v2)
}

/// Points where the line through `p1`, `p2` crosses the contour.
///
/// A crossing counts only if it lies strictly inside the segment on both
/// axes. More than two crossings are reduced to the two closest to `p1`.
pub fn line_contour_intersection(p1: DVec2, p2: DVec2, contour: &[DVec2]) -> Vec<DVec2> {
    let mut points: Vec<DVec2> = contour
        .windows(2)
        .filter_map(|seg| {
            let xy = line_intersect(seg[0], seg[1], p1, p2);
            let prod = segment_products(xy, seg[0], seg[1]);
            (prod.x < 0.0 && prod.y < 0.0).then_some(xy)
        })
        .collect();
    if points.len() > 2 {
        points.sort_by(|a, b| {
            a.distance_squared(p1)
                .total_cmp(&b.distance_squared(p1))
        });
        points.truncate(2);
    }
    points
}

/// Bilinear sample at `p`, rounded to 4 decimals.
///
/// Pixel indices are truncated toward zero; samples past the image read as
/// zero.
pub fn bilinear_interpolate(image: &Image, p: DVec2) -> f64 {
    let (row, col) = (p.y, p.x);
    let r0 = row.trunc();
    let c0 = col.trunc();
    let r1 = r0 + 1.0;
    let c1 = c0 + 1.0;

    let ia = pixel_or_zero(image, r0, c0);
    let ib = pixel_or_zero(image, r0, c1);
    let ic = pixel_or_zero(image, r1, c0);
    let id = pixel_or_zero(image, r1, c1);

    let wa = (r1 - row) * (c1 - col);
    let wb = (r1 - row) * (col - c0);
    let wc = (row - r0) * (c1 - col);
    let wd = (row - r0) * (col - c0);
    round_decimals(ia * wa + ib * wb + ic * wc + id * wd, 4)
}

#[inline]
fn pixel_or_zero(image: &Image, row: f64, col: f64) -> f64 {
    if !(row >= 0.0 && col >= 0.0) {
        return 0.0;
    }
    let (x, y) = (col as usize, row as usize);
    if x < image.width() && y < image.height() {
        image[(x, y)]
    } else {
        0.0
    }
}

#[inline]
pub(crate) fn round_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Sub-sample offset of the vertex of the parabola through three equally
/// spaced samples. The middle sample must be a strict maximum.
pub fn quadratic_maxima_approximation(q1: f64, q2: f64, q3: f64) -> Result<f64> {
    if q2 <= q1.max(q3) {
        return Err(Error::NotLocalMaximum { q1, q2, q3 });
    }
    Ok((0.5 * (q1 - q3)) / (q1 - 2.0 * q2 + q3))
}

/// Index of the contour point nearest to `p`; the first one wins ties.
pub fn between_contour_points(p: DVec2, contour: &[DVec2]) -> usize {
    argmin(contour.iter().map(|c| c.distance(p)))
}

/// Position of the smallest value, treating NaN as infinitely large.
pub(crate) fn argmin(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::INFINITY);
    for (i, v) in values.enumerate() {
        if v < best.1 {
            best = (i, v);
        }
    }
    best.0
}

/// Positions of the two smallest values in order, first index winning ties.
pub(crate) fn two_smallest(values: &[f64]) -> (usize, usize) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| rank_key(values[a]).total_cmp(&rank_key(values[b])));
    let first = order.first().copied().unwrap_or(0);
    let second = order.get(1).copied().unwrap_or(first);
    (first, second)
}

#[inline]
pub(crate) fn rank_key(v: f64) -> f64 {
    if v.is_nan() {
        f64::INFINITY
    } else {
        v
    }
}
