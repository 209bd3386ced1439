mod correlation;
pub mod fft;

pub use correlation::{conj_reflect, cross_correlation, peak_magnitude};
pub use fft::{fftn, fftshift, ifftn, ifftshift, roll, shift_subpixel};
