use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SolveError;
use crate::volume::{Candidate, DeviceId, RealVolume};

/// Shared cooperative stop flag.
///
/// A [`child`](CancelToken::child) token observes its parent's cancellation
/// but can be cancelled on its own without touching the parent.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.flag));
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.ancestors.iter().any(|a| a.load(Ordering::SeqCst))
    }
}

/// One reconstruction run.
#[derive(Clone, Debug)]
pub struct SolveRequest {
    pub generation: usize,
    /// Data set the run belongs to, in the order given to the controller.
    pub dataset: usize,
    /// Position of the candidate in its data set's population.
    pub index: usize,
    /// `None` runs without an accelerator.
    pub device: Option<DeviceId>,
    pub data: Arc<RealVolume>,
    /// Warm start; `None` on a cold start.
    pub initial: Option<Candidate>,
}

/// State shared by every run of a generation.
#[derive(Clone, Debug, Default)]
pub struct SolveContext {
    /// Asks the run to stop early.
    pub cancel: CancelToken,
    /// Fired once the controller stops waiting; a run still going must end
    /// at once, killing any process it started.
    pub terminate: CancelToken,
    /// Stop-flag file shared by all runs; solvers that poll a file instead
    /// of the token are pointed here. Created once the token is cancelled.
    pub stop_file: Option<PathBuf>,
}

/// External phase-retrieval engine.
///
/// Implementations are called concurrently from several threads, once per
/// population member, and should return promptly after `ctx.cancel` fires
/// and immediately after `ctx.terminate` fires.
pub trait Solver: Send + Sync {
    fn solve(&self, request: SolveRequest, ctx: &SolveContext) -> Result<Candidate, SolveError>;
}
