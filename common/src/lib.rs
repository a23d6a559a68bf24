//! Shared building blocks: the 2D pixel buffer and process-wide logging setup.

mod buffer2;
pub mod log_setup;

pub use buffer2::Buffer2;

pub const EPSILON: f64 = 1e-6;
