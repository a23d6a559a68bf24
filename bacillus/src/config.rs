//! Configuration for every pipeline stage.
//!
//! Each stage takes its own immutable struct. [`Config`] bundles them for the
//! frame pipeline and can be loaded from YAML; missing fields fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Spectral / background filtering
// ============================================================================

/// Frequency-domain bandpass cutoffs, in microns (`1/f`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandpassConfig {
    /// Lower bound of the high-frequency band. Zero disables the high-pass mask.
    pub high_pass_width: f64,
    /// Upper bound of the low-frequency band. Zero disables the low-pass mask.
    pub low_pass_width: f64,
}

impl Default for BandpassConfig {
    fn default() -> Self {
        Self {
            high_pass_width: 0.2,
            low_pass_width: 20.0,
        }
    }
}

impl BandpassConfig {
    pub fn validate(&self) {
        assert!(
            self.high_pass_width >= 0.0,
            "high_pass_width must be non-negative, got {}",
            self.high_pass_width
        );
        assert!(
            self.low_pass_width >= 0.0,
            "low_pass_width must be non-negative, got {}",
            self.low_pass_width
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingBallConfig {
    /// Ball radius in full-resolution pixels.
    pub radius: f64,
    /// Sigma of the pre-smoothing Gaussian.
    pub smoothing_sigma: f64,
}

impl Default for RollingBallConfig {
    fn default() -> Self {
        Self {
            radius: 40.0,
            smoothing_sigma: 1.0,
        }
    }
}

impl RollingBallConfig {
    pub fn validate(&self) {
        assert!(
            self.radius >= 1.0,
            "rolling ball radius must be at least 1, got {}",
            self.radius
        );
        assert!(
            self.smoothing_sigma > 0.0,
            "smoothing_sigma must be positive, got {}",
            self.smoothing_sigma
        );
    }
}

// ============================================================================
// Segmentation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Gaussian scale of the Hessian used by the shape-index transform.
    pub shape_index_sigma: f64,
    /// Connected components smaller than this are dropped.
    pub min_particle_size: usize,
    /// Sigma of the smoothing applied before thresholding.
    pub smoothing_sigma: f64,
    /// Side of the square window of the local mean threshold.
    pub local_block_size: usize,
    /// Local detections outside a dilation of the global mask by this disk are discarded.
    pub global_dilation_radius: usize,
    /// Background holes smaller than this are filled.
    pub max_hole_size: usize,
    pub median_radius: usize,
    pub opening_radius: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            shape_index_sigma: 2.0,
            min_particle_size: 40,
            smoothing_sigma: 1.0,
            local_block_size: 15,
            global_dilation_radius: 5,
            max_hole_size: 80,
            median_radius: 2,
            opening_radius: 2,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) {
        assert!(
            self.shape_index_sigma > 0.0,
            "shape_index_sigma must be positive, got {}",
            self.shape_index_sigma
        );
        assert!(
            self.smoothing_sigma > 0.0,
            "smoothing_sigma must be positive, got {}",
            self.smoothing_sigma
        );
        assert!(
            self.local_block_size % 2 == 1,
            "local_block_size must be odd, got {}",
            self.local_block_size
        );
    }
}

// ============================================================================
// Skeleton
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Drop branches with at most `min_branch_length` pixels.
    pub pruning: bool,
    pub min_branch_length: usize,
    /// Branch extraction budget; exhausting it rejects the whole skeleton.
    pub max_iterations: usize,
    /// Step budget of a single branch walk.
    pub max_walk_steps: usize,
    /// Skeletons with fewer pixels than this (or equal) are not analysed.
    pub min_skeleton_pixels: usize,
    pub min_endpoints: usize,
    pub max_branch_points: usize,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            pruning: false,
            min_branch_length: 5,
            max_iterations: 30,
            max_walk_steps: 500,
            min_skeleton_pixels: 5,
            min_endpoints: 2,
            max_branch_points: 10,
        }
    }
}

impl SkeletonConfig {
    pub fn validate(&self) {
        assert!(self.max_iterations > 0, "max_iterations must be positive");
        assert!(self.max_walk_steps > 0, "max_walk_steps must be positive");
    }
}

// ============================================================================
// Geometric refinement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Smoothing factor of the spline fitted to the traced mask boundary.
    pub trace_smooth_factor: f64,
    /// Outward shift from boundary pixel centres to the pixel edge.
    pub expansion: f64,
    /// Probe distance along the normal, in pixels.
    pub step: f64,
    /// Sobel responses below this are treated as background.
    pub edge_cutoff: f64,
    pub max_passes: usize,
    /// Points that moved by at least this squared distance are restored.
    pub max_displacement_sq: f64,
    /// Smoothing factor of the final resampling spline.
    pub smooth_factor: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            trace_smooth_factor: 10.0,
            expansion: 0.5,
            step: 0.5,
            edge_cutoff: 0.2,
            max_passes: 5,
            max_displacement_sq: 1.5,
            smooth_factor: 5.0,
        }
    }
}

impl ContourConfig {
    pub fn validate(&self) {
        assert!(self.step > 0.0, "step must be positive, got {}", self.step);
        assert!(
            self.max_displacement_sq > 0.0,
            "max_displacement_sq must be positive, got {}",
            self.max_displacement_sq
        );
        assert!(
            self.smooth_factor >= 0.0 && self.trace_smooth_factor >= 0.0,
            "smoothing factors must be non-negative"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidlineConfig {
    /// Smoothing factor of the spline fitted to the raw skeleton pixels.
    pub skeleton_smooth_factor: f64,
    /// Skeleton points tried from each tip when searching for the pole.
    pub pole_search_depth: usize,
    /// Sample count of the extended skeleton relative to the trimmed one.
    pub interpolation_factor: f64,
    /// Relaxation stops once no point moves farther than this.
    pub tolerance: f64,
    pub max_iteration: usize,
    /// Candidate midpoints farther than this from the current point are ignored.
    pub max_midpoint_shift: f64,
}

impl Default for MidlineConfig {
    fn default() -> Self {
        Self {
            skeleton_smooth_factor: 10.0,
            pole_search_depth: 5,
            interpolation_factor: 1.0,
            tolerance: 0.1,
            max_iteration: 10,
            max_midpoint_shift: 1.0,
        }
    }
}

impl MidlineConfig {
    pub fn validate(&self) {
        assert!(
            self.pole_search_depth > 0,
            "pole_search_depth must be positive"
        );
        assert!(
            self.interpolation_factor > 0.0,
            "interpolation_factor must be positive, got {}",
            self.interpolation_factor
        );
        assert!(
            self.tolerance > 0.0,
            "tolerance must be positive, got {}",
            self.tolerance
        );
    }
}

// ============================================================================
// Measurement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Chord offset of the closed bend-angle estimator.
    pub bend_window: usize,
    /// Chord offset of the open bend-angle estimator.
    pub open_bend_window: usize,
    /// Perimeter correction of the ideal capsule.
    pub correction_factor: f64,
    /// Sampling step of the straightened image, in pixels.
    pub subpixel: f64,
    /// Midline samples dropped at each pole before straightening.
    pub remove_cap: usize,
    /// Physical sampling step of the orthogonal profile mesh, in microns.
    pub unit_micron: f64,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            bend_window: 10,
            open_bend_window: 5,
            correction_factor: 0.75,
            subpixel: 0.5,
            remove_cap: 0,
            unit_micron: 0.05,
        }
    }
}

impl MeasureConfig {
    pub fn validate(&self) {
        assert!(self.bend_window > 0, "bend_window must be positive");
        assert!(
            self.subpixel > 0.0 && self.subpixel <= 1.0,
            "subpixel must be in (0, 1], got {}",
            self.subpixel
        );
        assert!(
            self.unit_micron > 0.0,
            "unit_micron must be positive, got {}",
            self.unit_micron
        );
    }
}

// ============================================================================
// Puncta
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunctaConfig {
    pub smoothing_sigma: f64,
    pub log_sigma: f64,
    /// Minimum separation between peaks; also the excluded border width.
    pub min_distance: usize,
    /// Peaks below this fraction of the strongest response are ignored.
    pub threshold_rel: f64,
    /// Re-centring steps allowed before a maximum is declared unstable.
    pub max_iteration: usize,
    /// Half side of the window used for the local z-score.
    pub zscore_half_window: usize,
    /// Lowest values dropped from the z-score window.
    pub trim_low_bound: usize,
    /// Z-scores need more foreground pixels than this.
    pub min_foreground: usize,
    pub isodata_bins: usize,
}

impl Default for PunctaConfig {
    fn default() -> Self {
        Self {
            smoothing_sigma: 1.0,
            log_sigma: 1.0,
            min_distance: 2,
            threshold_rel: 0.3,
            max_iteration: 2,
            zscore_half_window: 4,
            trim_low_bound: 5,
            min_foreground: 5,
            isodata_bins: 64,
        }
    }
}

impl PunctaConfig {
    pub fn validate(&self) {
        assert!(
            self.smoothing_sigma > 0.0 && self.log_sigma > 0.0,
            "puncta sigmas must be positive"
        );
        assert!(
            (0.0..=1.0).contains(&self.threshold_rel),
            "threshold_rel must be in [0, 1], got {}",
            self.threshold_rel
        );
        assert!(self.isodata_bins >= 2, "isodata_bins must be at least 2");
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Physical size of one pixel.
    pub pixel_microns: f64,
    /// Padding added around each region's bounding box.
    pub edge_width: usize,
    /// Padded boxes this close to the frame border are rejected.
    pub edge_margin: usize,
    /// Bandpass applied to the phase frame before segmentation; off when `None`.
    pub bandpass: Option<BandpassConfig>,
    /// Background subtracted from every fluorescence channel; off when `None`.
    pub rolling_ball: Option<RollingBallConfig>,
    pub segmentation: SegmentationConfig,
    pub skeleton: SkeletonConfig,
    pub contour: ContourConfig,
    pub midline: MidlineConfig,
    pub measure: MeasureConfig,
    pub puncta: PunctaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pixel_microns: 0.065,
            edge_width: 8,
            edge_margin: 5,
            bandpass: None,
            rolling_ball: None,
            segmentation: SegmentationConfig::default(),
            skeleton: SkeletonConfig::default(),
            contour: ContourConfig::default(),
            midline: MidlineConfig::default(),
            measure: MeasureConfig::default(),
            puncta: PunctaConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) {
        assert!(
            self.pixel_microns > 0.0,
            "pixel_microns must be positive, got {}",
            self.pixel_microns
        );
        if let Some(bandpass) = &self.bandpass {
            bandpass.validate();
        }
        if let Some(rolling_ball) = &self.rolling_ball {
            rolling_ball.validate();
        }
        self.segmentation.validate();
        self.skeleton.validate();
        self.contour.validate();
        self.midline.validate();
        self.measure.validate();
        self.puncta.validate();
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("pixel_microns: 0.1\nsegmentation:\n  min_particle_size: 60\n")
            .unwrap();
        assert_eq!(config.pixel_microns, 0.1);
        assert_eq!(config.segmentation.min_particle_size, 60);
        assert_eq!(config.segmentation.shape_index_sigma, 2.0);
        assert_eq!(config.contour.edge_cutoff, 0.2);
        assert_eq!(config.midline.max_iteration, 10);
    }

    #[test]
    fn test_yaml_enables_filters() {
        let config = Config::from_yaml("rolling_ball:\n  radius: 20\nbandpass: {}\n").unwrap();
        assert_eq!(config.rolling_ball.as_ref().map(|r| r.radius), Some(20.0));
        assert_eq!(config.rolling_ball.map(|r| r.smoothing_sigma), Some(1.0));
        assert_eq!(config.bandpass, Some(BandpassConfig::default()));
        assert_eq!(Config::default().bandpass, None);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = Config::default();
        config.midline.tolerance = 0.05;
        let text = config.to_yaml().unwrap();
        assert_eq!(Config::from_yaml(&text).unwrap(), config);
    }

    #[test]
    fn test_json_accepts_stage_config() {
        let puncta: PunctaConfig = serde_json::from_str(r#"{"threshold_rel": 0.5}"#).unwrap();
        assert_eq!(puncta.threshold_rel, 0.5);
        assert_eq!(puncta.min_distance, 2);
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = Config::from_yaml("pixel_microns: [1, 2]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[should_panic(expected = "local_block_size must be odd")]
    fn test_even_block_size_panics() {
        let config = SegmentationConfig {
            local_block_size: 14,
            ..Default::default()
        };
        config.validate();
    }
}
