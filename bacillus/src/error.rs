use thiserror::Error;

/// Input-contract violations raised by the pipeline stages.
///
/// Geometric non-convergence is not an error; stages report it through their
/// return values (empty branch lists, `converged` flags, rejected cells).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Filter {index} is {filter_width}x{filter_height} but the image is {width}x{height}")]
    FilterShapeMismatch {
        index: usize,
        filter_width: usize,
        filter_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Image is {width}x{height}, expected {expected_width}x{expected_height}")]
    ImageSizeMismatch {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("Mid point must be a strict local maximum (q1={q1}, q2={q2}, q3={q3})")]
    NotLocalMaximum { q1: f64, q2: f64, q3: f64 },

    #[error("Two endpoints are identical (contour index {index})")]
    IdenticalEndpoints { index: usize },

    #[error("Need at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    #[error("Midline folds back on itself at point {index}")]
    NonMonotonicMidline { index: usize },

    #[error("Input has {len} values but more than {required} are required")]
    InsufficientData { len: usize, required: usize },

    #[error("Bit depth must be an integer greater than 2, got {depth}")]
    InvalidBitDepth { depth: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
