//! Primary segmentation of phase-contrast frames into candidate cells.
//!
//! Cells are dark on a bright background. A global isodata mask bounds where
//! the finer local-mean mask may detect anything; the result is cleaned by
//! size filters, a median vote and an opening, then labeled.

pub mod labeling;
pub mod morphology;
pub mod region;
pub mod shape_index;

pub use labeling::LabelMap;
pub use morphology::{
    binary_dilation, binary_erosion, binary_median, binary_opening, remove_small_holes,
    remove_small_objects, Footprint,
};
pub use region::{optimize_bbox, orientation_by_eig, regionprops, touching_edge, BoundingBox, Region};
pub use shape_index::{shape_index, shape_index_conversion};

use crate::config::SegmentationConfig;
use crate::filter::{gaussian_filter, uniform_filter, BoundaryMode};
use crate::math::threshold_isodata;
use crate::{Image, LabelImage, Mask};

const ISODATA_BINS: usize = 256;

/// Output of [`init_segmentation`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Cleaned foreground mask.
    pub mask: Mask,
    /// 8-bit shape-index image of the input.
    pub shape_index: Image,
    pub labels: LabelImage,
    pub regions: Vec<Region>,
}

impl Segmentation {
    pub fn num_labels(&self) -> usize {
        self.regions.len()
    }
}

/// Pixels darker than the isodata threshold of the smoothed image.
pub fn global_threshold_mask(smoothed: &Image) -> Mask {
    let threshold = threshold_isodata(smoothed.pixels(), ISODATA_BINS);
    smoothed.map(|&v| v < threshold)
}

/// Pixels darker than the mean of their `block_size` window.
pub fn local_threshold_mask(smoothed: &Image, block_size: usize) -> Mask {
    let local_mean = uniform_filter(smoothed, block_size);
    smoothed.zip_map(&local_mean, |&v, &m| v < m)
}

pub fn init_segmentation(image: &Image, config: &SegmentationConfig) -> Segmentation {
    config.validate();

    let shape_index = shape_index_conversion(image, config.shape_index_sigma);
    let smoothed = gaussian_filter(image, config.smoothing_sigma, BoundaryMode::Nearest);

    let global = global_threshold_mask(&smoothed);
    let plausible = binary_dilation(&global, &Footprint::disk(config.global_dilation_radius));
    let local = local_threshold_mask(&smoothed, config.local_block_size)
        .zip_map(&plausible, |&l, &p| l && p);

    let cleaned = remove_small_objects(&local, config.min_particle_size);
    let cleaned = remove_small_holes(&cleaned, config.max_hole_size);
    let cleaned = binary_median(&cleaned, &Footprint::disk(config.median_radius));
    let mask = binary_opening(&cleaned, &Footprint::disk(config.opening_radius));

    let label_map = LabelMap::from_mask(&mask);
    let regions = regionprops(&label_map);
    tracing::debug!(
        regions = regions.len(),
        foreground = mask.iter().filter(|&&v| v).count(),
        "frame segmented"
    );

    Segmentation {
        mask,
        shape_index,
        labels: label_map.into_labels(),
        regions,
    }
}
