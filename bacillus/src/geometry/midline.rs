//! Pole extension, midline relaxation and the width profile.

use glam::DVec2;

use super::primitives::{
    argmin, intersect_matrix, line_contour_intersection, segment_products, two_smallest,
};
use super::spline::spline_approximation;
use crate::config::MidlineConfig;
use crate::error::{Error, Result};
use crate::Buffer2;

/// Smoothing applied when the extended skeleton and relaxed midline are resplined.
const RESPLINE_SMOOTHING: f64 = 1.0;

/// Distance below which an orthogonal crossing is considered the point itself.
pub const MIN_CROSSING_DISTANCE: f64 = 0.001;

/// Result of [`find_poles`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoleSearch {
    /// Contour crossings beyond the first skeleton end, or that end itself.
    pub pole1: Vec<DVec2>,
    pub pole2: Vec<DVec2>,
    /// Skeleton with the points consumed by the search removed.
    pub trimmed: Vec<DVec2>,
    pub found: [bool; 2],
}

/// Looks for the contour crossing beyond each end of the skeleton.
///
/// Up to `depth` successive point pairs are tried from each end; a crossing
/// is accepted when it lies ahead of the end along both axes. When nothing is
/// found the end point itself is kept.
pub fn find_poles(
    skeleton: &[DVec2],
    contour: &[DVec2],
    find_pole1: bool,
    find_pole2: bool,
    depth: usize,
) -> Result<PoleSearch> {
    let required = 2 * depth.max(1) + 2;
    if skeleton.len() < required {
        return Err(Error::TooFewPoints {
            required,
            actual: skeleton.len(),
        });
    }
    let len = skeleton.len();

    let search = |tip: &dyn Fn(usize) -> (DVec2, DVec2)| -> (Option<Vec<DVec2>>, usize) {
        let mut last_i = 0;
        for i in 0..depth {
            last_i = i;
            let (p1, p2) = tip(i);
            let outward = p1 - p2;
            let ahead: Vec<DVec2> = line_contour_intersection(p1, p2, contour)
                .into_iter()
                .filter(|&q| {
                    let dot = (q - p1) * outward;
                    dot.x > 0.0 && dot.y > 0.0
                })
                .collect();
            if !ahead.is_empty() {
                return (Some(ahead), i);
            }
        }
        (None, last_i)
    };

    let (pole1, i, found1) = if find_pole1 {
        let (hit, i) = search(&|i| (skeleton[i], skeleton[i + 1]));
        let found = hit.is_some();
        (hit.unwrap_or_else(|| vec![skeleton[0]]), i, found)
    } else {
        (vec![skeleton[0]], 1, false)
    };
    let (pole2, j, found2) = if find_pole2 {
        let (hit, j) = search(&|j| (skeleton[len - 1 - j], skeleton[len - 2 - j]));
        let found = hit.is_some();
        (hit.unwrap_or_else(|| vec![skeleton[len - 1]]), j, found)
    } else {
        (vec![skeleton[len - 1]], 1, false)
    };

    Ok(PoleSearch {
        pole1,
        pole2,
        trimmed: skeleton[i..len - j].to_vec(),
        found: [found1, found2],
    })
}

/// Joins the found poles to the trimmed skeleton and resplines the result.
pub fn extend_skeleton(
    skeleton: &[DVec2],
    contour: &[DVec2],
    find_pole1: bool,
    find_pole2: bool,
    config: &MidlineConfig,
) -> Result<(Vec<DVec2>, [bool; 2])> {
    let poles = find_poles(
        skeleton,
        contour,
        find_pole1,
        find_pole2,
        config.pole_search_depth,
    )?;
    let mut extended = poles.pole1;
    extended.extend_from_slice(&poles.trimmed);
    extended.extend_from_slice(&poles.pole2);
    let n = (config.interpolation_factor * poles.trimmed.len() as f64) as usize;
    Ok((
        spline_approximation(&extended, n, RESPLINE_SMOOTHING, false),
        poles.found,
    ))
}

/// Midpoint of the two nearest contour crossings of each point's normal.
///
/// A coordinate that would move more than `max_shift` keeps its old value.
pub fn direct_intersect_points(
    midline: &[DVec2],
    contour: &[DVec2],
    max_shift: f64,
) -> Vec<DVec2> {
    let crossings = intersect_matrix(midline, contour, None);
    let segments = crossings.height();

    midline
        .iter()
        .enumerate()
        .map(|(j, &p)| {
            let dist = crossing_distances(&crossings, contour, j, p, |prod| {
                prod.x > 0.0 && prod.y > 0.0
            });
            if segments == 0 {
                return p;
            }
            let (a, b) = two_smallest(&dist);
            let mid = 0.5 * (crossings[(j, a)] + crossings[(j, b)]);
            let keep = |new: f64, old: f64| {
                if (new - old).abs() <= max_shift {
                    new
                } else {
                    old
                }
            };
            DVec2::new(keep(mid.x, p.x), keep(mid.y, p.y))
        })
        .collect()
}

/// Distances from `p` to its crossings in column `j`; crossings that
/// `exclude` rejects, and unusable ones, are infinitely far.
fn crossing_distances(
    crossings: &Buffer2<DVec2>,
    contour: &[DVec2],
    j: usize,
    p: DVec2,
    exclude: impl Fn(DVec2) -> bool,
) -> Vec<f64> {
    (0..crossings.height())
        .map(|i| {
            let q = crossings[(j, i)];
            let d = p.distance(q);
            if exclude(segment_products(q, contour[i], contour[i + 1])) || !d.is_finite() {
                f64::INFINITY
            } else {
                d
            }
        })
        .collect()
}

/// Outcome of [`midline_approximation`].
#[derive(Debug, Clone, PartialEq)]
pub struct MidlineFit {
    pub points: Vec<DVec2>,
    pub converged: bool,
    pub iterations: usize,
}

/// Iteratively re-centres the midline between the two sides of the contour.
///
/// Stops once no point moves more than `tolerance` in either coordinate; after
/// `max_iteration` passes the latest midline is returned unconverged.
pub fn midline_approximation(
    skeleton: &[DVec2],
    contour: &[DVec2],
    config: &MidlineConfig,
) -> MidlineFit {
    let mut midline = skeleton.to_vec();
    let mut iterations = 0;
    while iterations < config.max_iteration {
        let updated = direct_intersect_points(&midline, contour, config.max_midpoint_shift);
        let shift = updated
            .iter()
            .zip(&midline)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f64::max);
        midline = spline_approximation(&updated, updated.len(), RESPLINE_SMOOTHING, false);
        iterations += 1;
        if shift <= config.tolerance {
            return MidlineFit {
                points: midline,
                converged: true,
                iterations,
            };
        }
    }
    tracing::debug!(iterations, "midline relaxation did not converge");
    MidlineFit {
        points: midline,
        converged: false,
        iterations,
    }
}

/// Checks that the midline advances monotonically from its first to its last
/// point.
pub fn validate_midline(midline: &[DVec2]) -> Result<()> {
    if midline.len() < 2 {
        return Err(Error::TooFewPoints {
            required: 2,
            actual: midline.len(),
        });
    }
    let origin = midline[0];
    let axis = midline[midline.len() - 1] - origin;
    let mut previous = f64::NEG_INFINITY;
    for (index, p) in midline.iter().enumerate() {
        let projection = (*p - origin).dot(axis);
        if !(projection > previous) {
            return Err(Error::NonMonotonicMidline { index });
        }
        previous = projection;
    }
    Ok(())
}

/// Cell width at every midline point: the summed distances to the two
/// nearest contour crossings of the normal. The poles are zero.
pub fn direct_intersect_distance(midline: &[DVec2], contour: &[DVec2]) -> Vec<f64> {
    if midline.len() < 3 || contour.len() < 2 {
        return vec![0.0; midline.len()];
    }
    let interior = &midline[1..midline.len() - 1];
    let crossings = intersect_matrix(interior, contour, None);
    let mut widths = Vec::with_capacity(midline.len());
    widths.push(0.0);
    for (j, &p) in interior.iter().enumerate() {
        let dist = crossing_distances(&crossings, contour, j, p, |prod| {
            prod.x > 0.0 && prod.y > 0.0
        });
        let (a, b) = two_smallest(&dist);
        widths.push(dist[a] + dist[b]);
    }
    widths.push(0.0);
    widths
}

/// For every midline point, the nearest crossing of its normal with
/// `outerline` that is at least [`MIN_CROSSING_DISTANCE`] away.
pub fn orthogonal_intersection_point(
    midline: &[DVec2],
    outerline: &[DVec2],
    normals: Option<&[DVec2]>,
) -> Vec<DVec2> {
    let crossings = intersect_matrix(midline, outerline, normals);
    if crossings.height() == 0 {
        return midline.to_vec();
    }
    midline
        .iter()
        .enumerate()
        .map(|(j, &p)| {
            let dist = crossing_distances(&crossings, outerline, j, p, |prod| {
                prod.x >= 0.0 && prod.y >= 0.0
            });
            let nearest = argmin(dist.iter().map(|&d| {
                if d <= MIN_CROSSING_DISTANCE {
                    f64::INFINITY
                } else {
                    d
                }
            }));
            crossings[(j, nearest)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned capsule-ish ellipse centred at (30, 20), tilted slightly so
    /// no contour segment is exactly horizontal or vertical.
    fn ellipse_contour(a: f64, b: f64, n: usize) -> Vec<DVec2> {
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

    fn axis_points(from: f64, to: f64, n: usize) -> Vec<DVec2> {
        let tilt: f64 = 0.05;
        (0..n)
            .map(|i| {
                let u = from + (to - from) * i as f64 / (n - 1) as f64;
                DVec2::new(30.0 + u * tilt.cos(), 20.0 + u * tilt.sin())
            })
            .collect()
    }

    #[test]
    fn test_find_poles_reaches_contour() {
        let contour = ellipse_contour(20.0, 8.0, 200);
        let skeleton = axis_points(-14.0, 14.0, 29);
        let poles = find_poles(&skeleton, &contour, true, true, 5).unwrap();
        assert_eq!(poles.found, [true, true]);
        assert_eq!(poles.pole1.len(), 1);
        let tip1 = poles.pole1[0];
        let tip2 = poles.pole2[0];
        assert!((tip1.distance(DVec2::new(30.0, 20.0)) - 20.0).abs() < 0.1);
        assert!((tip2.distance(DVec2::new(30.0, 20.0)) - 20.0).abs() < 0.1);
        assert!(tip1.x < 15.0 && tip2.x > 45.0);
        assert_eq!(poles.trimmed.len(), 29);
    }

    #[test]
    fn test_find_poles_disabled_trims_one_point() {
        let contour = ellipse_contour(20.0, 8.0, 200);
        let skeleton = axis_points(-14.0, 14.0, 29);
        let poles = find_poles(&skeleton, &contour, false, false, 5).unwrap();
        assert_eq!(poles.found, [false, false]);
        assert_eq!(poles.pole1, vec![skeleton[0]]);
        assert_eq!(poles.trimmed.len(), 27);
    }

    #[test]
    fn test_find_poles_needs_enough_points() {
        let contour = ellipse_contour(20.0, 8.0, 100);
        let err = find_poles(&axis_points(-2.0, 2.0, 5), &contour, true, true, 5).unwrap_err();
        assert_eq!(
            err,
            Error::TooFewPoints {
                required: 12,
                actual: 5
            }
        );
    }

    #[test]
    fn test_extended_midline_spans_the_cell() {
        let contour = ellipse_contour(20.0, 8.0, 200);
        let skeleton = axis_points(-14.0, 14.0, 29);
        let (extended, found) =
            extend_skeleton(&skeleton, &contour, true, true, &MidlineConfig::default()).unwrap();
        assert_eq!(found, [true, true]);
        assert_eq!(extended.len(), 29);
        let length = super::super::primitives::line_length(&extended);
        assert!((length - 40.0).abs() < 1.0, "length {}", length);
    }

    #[test]
    fn test_relaxation_centres_offset_midline() {
        let contour = ellipse_contour(20.0, 8.0, 200);
        let tilt: f64 = 0.05;
        let offset = DVec2::new(-tilt.sin(), tilt.cos()) * 0.6;
        let start: Vec<DVec2> = axis_points(-15.0, 15.0, 31)
            .into_iter()
            .map(|p| p + offset)
            .collect();
        let fit = midline_approximation(&start, &contour, &MidlineConfig::default());
        assert!(fit.converged, "{} iterations", fit.iterations);
        let centre = axis_points(-15.0, 15.0, 31);
        for (p, q) in fit.points[5..26].iter().zip(&centre[5..26]) {
            assert!(p.distance(*q) < 0.2, "{} vs {}", p, q);
        }
    }

    #[test]
    fn test_validate_midline_detects_fold() {
        let straight = axis_points(-5.0, 5.0, 11);
        assert!(validate_midline(&straight).is_ok());
        let mut folded = straight.clone();
        folded.swap(3, 4);
        assert_eq!(
            validate_midline(&folded).unwrap_err(),
            Error::NonMonotonicMidline { index: 4 }
        );
    }

    #[test]
    fn test_width_profile_matches_minor_axis() {
        let contour = ellipse_contour(20.0, 8.0, 300);
        let midline = axis_points(-20.0, 20.0, 41);
        let widths = direct_intersect_distance(&midline, &contour);
        assert_eq!(widths.len(), 41);
        assert_eq!(widths[0], 0.0);
        assert_eq!(widths[40], 0.0);
        assert!((widths[20] - 16.0).abs() < 0.1, "width {}", widths[20]);
        // width at u = 12: 2 * 8 * sqrt(1 - (12 / 20)^2) = 12.8
        assert!((widths[32] - 12.8).abs() < 0.1, "width {}", widths[32]);
    }

    #[test]
    fn test_orthogonal_points_land_on_outerline() {
        let contour = ellipse_contour(20.0, 8.0, 300);
        let midline = axis_points(-10.0, 10.0, 11);
        let hits = orthogonal_intersection_point(&midline, &contour, None);
        assert_eq!(hits.len(), 11);
        for (h, p) in hits.iter().zip(&midline) {
            let d = h.distance(*p);
            assert!(d > 6.0 && d < 8.1, "distance {}", d);
        }
    }
}
