//! Frame-level orchestration.
//!
//! Configured filters run first: a bandpass on the phase frame and rolling-ball
//! background subtraction on fluorescence. The phase frame is then segmented
//! once and every candidate region is cropped and measured independently, in
//! parallel. A region that fails any stage is reported with the reason and
//! never aborts the frame.


use glam::DVec2;
use rayon::prelude::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{
    bandpass_filter, fft, fft_reconstruction, normalize_min_max, rolling_ball_bg_subtraction, sobel,
};
use crate::geometry::{
    contour_optimization, direct_intersect_distance, extend_skeleton, initial_contour,
    line_length, midline_approximation, spline_approximation, validate_midline,
};
use crate::math::{mean, median};
use crate::measure::{
    bend_angle_open, measure_length, sample_profile_mesh, shape_complexity,
    straighten_by_orthogonal_lines, straighten_cell_normalize_width,
};
use crate::puncta::{find_puncta, PunctaRecord};
use crate::segmentation::{
    init_segmentation, optimize_bbox, touching_edge, BoundingBox, Region, Segmentation,
};
use crate::skeleton::{skeleton_analysis, SkeletonStatus};
use crate::{Image, Mask};

/// Why a region produced no measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The padded bounding box reaches the frame margin.
    TouchingEdge,
    Skeleton(SkeletonStatus),
    /// The skeleton was accepted but pruning left nothing.
    NoBranch,
    /// The traced contour has too few points to snap.
    NoContour,
    MidlineNotConverged { iterations: usize },
    Geometry(Error),
}

/// Everything measured on one cell.
///
/// Points are in frame coordinates; widths and straightened images are in
/// pixels.
#[derive(Debug, Clone)]
pub struct CellMeasurement {
    /// Snapped closed contour.
    pub contour: Vec<DVec2>,
    pub midline: Vec<DVec2>,
    /// Width at every midline point; zero at the poles.
    pub width: Vec<f64>,
    /// Midline length in microns.
    pub length: f64,
    /// Median interior width in microns.
    pub median_width: f64,
    pub area: usize,
    pub orientation: f64,
    pub eccentricity: f64,
    pub complexity: f64,
    /// Turning angle in degrees at every midline point that has
    /// `open_bend_window` neighbours on both sides.
    pub midline_bend: Vec<f64>,
    /// Width-normalized straightened image of the phase channel followed by
    /// every fluorescence channel.
    pub straightened: Vec<Image>,
    /// Fluorescence sampled on the orthogonal profile mesh, one image per
    /// channel. Empty when the mesh could not be built.
    pub profiles: Vec<Image>,
    /// Puncta per fluorescence channel.
    pub puncta: Vec<Vec<PunctaRecord>>,
    pub midline_iterations: usize,
}

#[derive(Debug, Clone)]
pub enum CellOutcome {
    Measured(Box<CellMeasurement>),
    /// Several skeleton branches; splitting is left to the caller.
    Branched { branches: usize },
    Rejected(RejectReason),
}

#[derive(Debug, Clone)]
pub struct CellReport {
    pub label: u32,
    /// Padded bounding box the cell was cropped to.
    pub bbox: BoundingBox,
    pub outcome: CellOutcome,
}

impl CellReport {
    pub fn measurement(&self) -> Option<&CellMeasurement> {
        match &self.outcome {
            CellOutcome::Measured(m) => Some(m.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameResult {
    pub segmentation: Segmentation,
    /// One report per labeled region, in label order.
    pub cells: Vec<CellReport>,
}

impl FrameResult {
    pub fn measured(&self) -> impl Iterator<Item = &CellMeasurement> {
        self.cells.iter().filter_map(CellReport::measurement)
    }
}

/// Crops of one region, in the region's local frame.
struct CellCrop<'a> {
    region: &'a Region,
    bbox: BoundingBox,
    mask: Mask,
    phase: Image,
    fluorescence: Vec<Image>,
}

pub struct CellPipeline {
    config: Config,
}

impl CellPipeline {
    pub fn new(config: Config) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filters the frame, segments `phase` and measures every region.
    /// Fluorescence channels must match the phase frame in size.
    pub fn process_frame(&self, phase: &Image, fluorescence: &[Image]) -> Result<FrameResult> {
        for channel in fluorescence {
            if !channel.same_size(phase) {
                return Err(Error::ImageSizeMismatch {
                    width: channel.width(),
                    height: channel.height(),
                    expected_width: phase.width(),
                    expected_height: phase.height(),
                });
            }
        }

        let (phase, fluorescence) = self.prepare_frame(phase, fluorescence)?;
        let segmentation = init_segmentation(&phase, &self.config.segmentation);
        let cells: Vec<CellReport> = segmentation
            .regions
            .par_iter()
            .map(|region| self.process_region(region, &phase, &fluorescence))
            .collect();

        let measured = cells.iter().filter(|c| c.measurement().is_some()).count();
        let branched = cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Branched { .. }))
            .count();
        tracing::info!(
            regions = cells.len(),
            measured,
            branched,
            rejected = cells.len() - measured - branched,
            "frame processed"
        );

        Ok(FrameResult {
            segmentation,
            cells,
        })
    }

    /// Runs the configured frame filters. The bandpassed phase frame keeps
    /// the mean of its input; disabled filters pass images through.
    pub fn prepare_frame(&self, phase: &Image, fluorescence: &[Image]) -> Result<(Image, Vec<Image>)> {
        let phase = match &self.config.bandpass {
            Some(bandpass) => {
                let (high_pass, low_pass) = bandpass_filter(
                    self.config.pixel_microns,
                    phase.width(),
                    phase.height(),
                    bandpass.high_pass_width,
                    bandpass.low_pass_width,
                );
                let offset = mean(phase);
                let filtered = fft_reconstruction(&fft(phase, true), &[&high_pass, &low_pass])?;
                filtered.map(|&v| v + offset)
            }
            None => phase.clone(),
        };

        let fluorescence = match &self.config.rolling_ball {
            Some(rolling_ball) => fluorescence
                .par_iter()
                .map(|channel| rolling_ball_bg_subtraction(channel, rolling_ball))
                .collect(),
            None => fluorescence.to_vec(),
        };

        Ok((phase, fluorescence))
    }

    fn process_region(&self, region: &Region, phase: &Image, fluorescence: &[Image]) -> CellReport {
        let (width, height) = (phase.width(), phase.height());
        let bbox = optimize_bbox(width, height, region.bbox, self.config.edge_width);
        let outcome = if touching_edge(width, height, bbox, self.config.edge_margin) {
            CellOutcome::Rejected(RejectReason::TouchingEdge)
        } else {
            let crop_of = |image: &Image| image.crop(bbox.min_col, bbox.min_row, bbox.width(), bbox.height());
            let crop = CellCrop {
                region,
                bbox,
                mask: region.crop_mask(bbox),
                phase: crop_of(phase),
                fluorescence: fluorescence.iter().map(crop_of).collect(),
            };
            self.measure_cell(&crop)
        };

        match &outcome {
            CellOutcome::Rejected(RejectReason::Geometry(err)) => {
                tracing::warn!(label = region.label, %err, "cell rejected");
            }
            CellOutcome::Rejected(reason) => {
                tracing::debug!(label = region.label, ?reason, "cell rejected");
            }
            CellOutcome::Branched { branches } => {
                tracing::debug!(label = region.label, branches, "branched cell skipped");
            }
            CellOutcome::Measured(_) => {}
        }

        CellReport {
            label: region.label,
            bbox,
            outcome,
        }
    }

    fn measure_cell(&self, crop: &CellCrop<'_>) -> CellOutcome {
        let config = &self.config;

        let skeleton = skeleton_analysis(&crop.mask, &config.skeleton);
        if skeleton.status != SkeletonStatus::Accepted {
            return CellOutcome::Rejected(RejectReason::Skeleton(skeleton.status));
        }
        let branch = match skeleton.branches.as_slice() {
            [] => return CellOutcome::Rejected(RejectReason::NoBranch),
            [branch] => branch,
            branches => {
                return CellOutcome::Branched {
                    branches: branches.len(),
                }
            }
        };

        let traced = initial_contour(&crop.mask, &config.contour);
        if traced.len() < 4 {
            return CellOutcome::Rejected(RejectReason::NoContour);
        }
        let edge_field = sobel(&normalize_min_max(&crop.phase));
        let contour = contour_optimization(&traced, &edge_field, &config.contour).points;

        let skeleton_points: Vec<DVec2> = branch
            .points
            .iter()
            .map(|&(x, y)| DVec2::new(x as f64, y as f64))
            .collect();
        let smoothed = spline_approximation(
            &skeleton_points,
            skeleton_points.len(),
            config.midline.skeleton_smooth_factor,
            false,
        );

        match self.fit_midline(crop, &smoothed, branch.real_poles, contour) {
            Ok(outcome) => outcome,
            Err(err) => CellOutcome::Rejected(RejectReason::Geometry(err)),
        }
    }

    fn fit_midline(
        &self,
        crop: &CellCrop<'_>,
        skeleton: &[DVec2],
        real_poles: [bool; 2],
        contour: Vec<DVec2>,
    ) -> Result<CellOutcome> {
        let config = &self.config;

        let (extended, _) = extend_skeleton(
            skeleton,
            &contour,
            real_poles[0],
            real_poles[1],
            &config.midline,
        )?;
        let fit = midline_approximation(&extended, &contour, &config.midline);
        if !fit.converged {
            return Ok(CellOutcome::Rejected(RejectReason::MidlineNotConverged {
                iterations: fit.iterations,
            }));
        }
        let midline = fit.points;
        validate_midline(&midline)?;

        let width = direct_intersect_distance(&midline, &contour);
        let median_width = if width.len() > 2 {
            median(&width[1..width.len() - 1]) * config.pixel_microns
        } else {
            0.0
        };

        let length = measure_length(&midline, config.pixel_microns);
        let midline_bend = bend_angle_open(&midline, config.measure.open_bend_window);

        let area = crop.region.area;
        let open_contour = &contour[..contour.len() - 1];
        let complexity = shape_complexity(
            open_contour,
            area as f64,
            line_length(&midline),
            config.measure.bend_window,
            config.measure.correction_factor,
        );

        let mut straightened = Vec::with_capacity(crop.fluorescence.len() + 1);
        for channel in std::iter::once(&crop.phase).chain(&crop.fluorescence) {
            straightened.push(straighten_cell_normalize_width(
                channel,
                &midline,
                &width,
                config.measure.subpixel,
                config.measure.remove_cap,
            )?);
        }

        let width_microns: Vec<f64> = width.iter().map(|w| w * config.pixel_microns).collect();
        let profiles = match straighten_by_orthogonal_lines(
            &contour,
            &midline,
            length,
            &width_microns,
            config.measure.unit_micron,
        ) {
            Ok(mesh) => crop
                .fluorescence
                .iter()
                .map(|channel| sample_profile_mesh(channel, &mesh))
                .collect(),
            Err(err) => {
                tracing::debug!(label = crop.region.label, %err, "profile mesh skipped");
                Vec::new()
            }
        };

        let offset = DVec2::new(crop.bbox.min_col as f64, crop.bbox.min_row as f64);
        let mut puncta = Vec::with_capacity(crop.fluorescence.len());
        for channel in &crop.fluorescence {
            let mut records = find_puncta(channel, &crop.mask, &config.puncta)?;
            for r in &mut records {
                r.x += offset.x;
                r.y += offset.y;
            }
            puncta.push(records);
        }

        Ok(CellOutcome::Measured(Box::new(CellMeasurement {
            length,
            median_width,
            contour: contour.iter().map(|&p| p + offset).collect(),
            midline: midline.iter().map(|&p| p + offset).collect(),
            width,
            area,
            orientation: crop.region.orientation(),
            eccentricity: crop.region.eccentricity(),
            complexity,
            midline_bend,
            straightened,
            profiles,
            puncta,
            midline_iterations: fit.iterations,
        })))
    }
}
