pub mod config;
pub mod devices;
pub mod info;
pub mod prep;
pub mod register;
pub mod run;
