//! Bacillus - segmentation and morphometry of rod-shaped bacteria.
//!
//! Phase-contrast frames are segmented into candidate cells; every cell is
//! skeletonized, its contour is snapped to the phase edge, and a midline is
//! fitted between the two sides of the contour. From these the crate derives:
//! - Length, width profile, orientation and shape complexity
//! - Straightened ("unrolled") images of any channel
//! - Fluorescent puncta with sub-pixel positions and local z-scores
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bacillus::{CellPipeline, Config};
//!
//! let pipeline = CellPipeline::new(Config::default());
//! let frame = pipeline.process_frame(&phase, &[gfp])?;
//!
//! for cell in frame.measured() {
//!     println!("{:.2} µm x {:.2} µm", cell.length, cell.median_width);
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod math;
pub mod measure;
pub mod pipeline;
pub mod puncta;
pub mod segmentation;
pub mod skeleton;

#[cfg(any(test, feature = "bench"))]
pub mod testing;

pub use common::Buffer2;

/// Grayscale image, one `f64` per pixel.
pub type Image = Buffer2<f64>;
/// Binary mask; `true` is foreground.
pub type Mask = Buffer2<bool>;
/// Connected-component labels; zero is background.
pub type LabelImage = Buffer2<u32>;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{
    BandpassConfig, Config, ContourConfig, MeasureConfig, MidlineConfig, PunctaConfig,
    RollingBallConfig, SegmentationConfig, SkeletonConfig,
};
pub use error::{Error, Result};

// ============================================================================
// Pipeline
// ============================================================================

pub use pipeline::{
    CellMeasurement, CellOutcome, CellPipeline, CellReport, FrameResult, RejectReason,
};
pub use puncta::{find_puncta, PunctaRecord};
pub use segmentation::{init_segmentation, Segmentation};
pub use skeleton::{skeleton_analysis, SkeletonAnalysis, SkeletonBranch, SkeletonStatus};
