//! Per-cell morphometry and intensity profiling on a fitted midline.

pub mod profile;
pub mod shape;
pub mod straighten;

pub use profile::{
    measure_along_contour, measure_along_strip, moving_window_average, normalize_data_1d,
    normalize_data_2d, pad_data,
};
pub use shape::{
    bend_angle, bend_angle_open, estimate_r_from_area, measure_length, shape_complexity,
    standard_rod_complexity,
};
pub use straighten::{
    sample_profile_mesh, straighten_by_orthogonal_lines, straighten_cell,
    straighten_cell_normalize_width, ProfileMesh,
};
