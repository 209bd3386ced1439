pub mod ambiguity;
mod engine;
pub mod modes;
pub mod phase;

pub use ambiguity::{resolve, resolve_image, Orientation};
pub use engine::{breed, prepare_member, BreedOutcome, BreedParams};
pub use modes::BreedMode;
pub use phase::{zero_phase, zero_phase_cc};
