//! Sub-pixel geometry on point sequences.
//!
//! Points are [`DVec2`](glam::DVec2) with `x` the column and `y` the row.
//! Closed contours repeat their first point at the end and are oriented so
//! the left-hand normal points into the cell.
//!
//! - [`primitives`]: intersections, normals, distance matrices, interpolation
//! - [`spline`]: smoothing cubic spline resampling
//! - [`contour`]: mask tracing, edge snapping, contour splitting
//! - [`midline`]: pole extension, midline relaxation, width profile

#[cfg(feature = "bench")]
pub mod bench;

pub mod contour;
pub mod midline;
pub mod primitives;
pub mod spline;

pub use contour::{
    contour_optimization, divide_contour, divide_contour_by_midline, estimate_boundary_length,
    expand_contour, initial_contour, suppress_extreme_edge_points, trace_contour, SnappedContour,
};
pub use midline::{
    direct_intersect_distance, direct_intersect_points, extend_skeleton, find_poles,
    midline_approximation, orthogonal_intersection_point, validate_midline, MidlineFit,
    PoleSearch,
};
pub use primitives::{
    between_contour_points, bilinear_interpolate, distance, distance_matrix, intersect_matrix,
    line_contour_intersection, line_intersect, line_length, quadratic_maxima_approximation,
    signed_area, unit_perpendicular_vector,
};
pub use spline::spline_approximation;
