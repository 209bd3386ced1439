pub mod frames;
pub mod register;
mod upsampled;

pub use frames::{align_frames, register_whole_pixel};
pub use register::{align_to, register_2d, register_3d, Registration};
