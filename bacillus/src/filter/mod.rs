//! Image filters that prepare phase-contrast and fluorescence frames.
//!
//! - [`convolution`]: separable Gaussian, Laplacian-of-Gaussian, Sobel and box filters
//! - [`spectral`]: centred FFT, radial bandpass masks, Fourier drift correction
//! - [`rolling_ball`]: morphological background estimate and subtraction
//! - [`intensity`]: bit-depth rescaling with optional gamma

#[cfg(feature = "bench")]
pub mod bench;

pub mod convolution;
pub mod intensity;
pub mod rolling_ball;
pub mod spectral;

pub use convolution::{
    gaussian_filter, gaussian_kernel_1d, gaussian_laplace, sobel, uniform_filter, BoundaryMode,
};
pub use intensity::{adjust_image, normalize_min_max};
pub use rolling_ball::{rolling_ball_bg_subtraction, RollingBall};
pub use spectral::{bandpass_filter, fft, fft_reconstruction, fftshift, ifftshift, shift_image};
