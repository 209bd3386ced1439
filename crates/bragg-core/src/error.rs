use std::path::PathBuf;

use thiserror::Error;

use crate::volume::DeviceId;

#[derive(Error, Debug)]
pub enum BraggError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decode error: {0}")]
    Image(#[from] tiff::TiffError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Continuation directory {} has no data for candidate {candidate}", .dir.display())]
    ContinuationDataMissing { dir: PathBuf, candidate: usize },

    #[error("Insufficient device capacity: {desired} runs requested, {available} slots available")]
    InsufficientCapacity { desired: usize, available: usize },

    #[error("Solver failed for candidate {candidate} of data set {dataset} in generation {generation} (device {}): {source}", fmt_device(.device))]
    Solve {
        generation: usize,
        dataset: usize,
        candidate: usize,
        device: Option<DeviceId>,
        #[source]
        source: SolveError,
    },

    #[error("Generation {generation} aborted before all runs completed")]
    Aborted { generation: usize },

    #[error("Invalid volume file: {0}")]
    InvalidVolumeFile(String),

    #[error("Device query failed: {0}")]
    DeviceQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a solver for a single run.
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("reconstruction diverged (NaN in error trace)")]
    Diverged,

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_device(device: &Option<DeviceId>) -> String {
    match device {
        Some(id) => id.to_string(),
        None => "cpu".into(),
    }
}

pub type Result<T> = std::result::Result<T, BraggError>;
