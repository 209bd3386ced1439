pub mod config;
mod controller;
pub mod lowres;
pub mod prep;
pub mod process;
pub mod solver;
mod types;

pub use config::{GenerationConfig, ReconstructionConfig};
pub use controller::{Dataset, GenerationController};
pub use lowres::{low_resolution_view, SigmaAlgorithm};
pub use prep::{
    prepare_scans, prepared_file_name, stitch_scan_range, PrepConfig, PrepReport, PreparedRange,
    RangeOutcome,
};
pub use process::{ProcessSolver, ProcessSolverConfig};
pub use solver::{CancelToken, SolveContext, SolveRequest, Solver};
pub use types::{GenerationStage, ProgressReporter, RankedCandidate, TerminationReport};
