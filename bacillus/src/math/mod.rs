//! Scalar statistics and histogram-based thresholds over pixel values.

#[cfg(test)]
mod tests;

mod histogram;
mod statistics;

pub use histogram::{equalize_histogram, histogram, threshold_isodata, Histogram};
pub use statistics::{interp, linspace, mean, median, min_max, percentile, std_dev};
