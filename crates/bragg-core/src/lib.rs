pub mod align;
pub mod breed;
pub mod compute;
pub mod consts;
pub mod error;
pub mod filters;
pub mod io;
pub mod pipeline;
pub mod quality;
pub mod schedule;
pub mod volume;
