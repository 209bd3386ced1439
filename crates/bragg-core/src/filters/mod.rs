pub mod gaussian;
pub mod support;

pub use gaussian::{gaussian_blur, gaussian_mask};
pub use support::{ambiguity_support, loose_support, shrink_wrap, tight_support};
