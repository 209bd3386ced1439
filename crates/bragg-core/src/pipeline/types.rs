use serde::Serialize;

use crate::quality::FitnessMetric;

/// Stage of one generation, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationStage {
    Loading,
    LowResolution,
    Scheduling,
    Solving,
    Ranking,
    Checkpointing,
    Breeding,
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading continuation"),
            Self::LowResolution => write!(f, "Filtering data"),
            Self::Scheduling => write!(f, "Scheduling devices"),
            Self::Solving => write!(f, "Solving"),
            Self::Ranking => write!(f, "Ranking"),
            Self::Checkpointing => write!(f, "Writing checkpoint"),
            Self::Breeding => write!(f, "Breeding"),
        }
    }
}

/// Thread-safe progress reporting for the generation controller.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// Generation `generation` of `total` is starting.
    fn begin_generation(&self, _generation: usize, _total: usize) {}

    /// A new stage has started. `total_items` is the number of work items
    /// (e.g. solver runs), if known.
    fn begin_stage(&self, _stage: GenerationStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, the controller's default.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// One entry of the final ranking: the population slot the candidate was
/// solved in and its fitness score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub slot: usize,
    pub score: f64,
}

/// Outcome of a completed reconstruction run. The data itself has already
/// been written through the result sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TerminationReport {
    /// Label of the data set; empty for a single-data-set run.
    pub dataset: String,
    pub generations_completed: usize,
    pub final_generation: usize,
    pub final_ranking: Vec<RankedCandidate>,
    pub metric: FitnessMetric,
    pub warnings: Vec<String>,
}
