#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array3;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bragg_core::error::{BraggError, SolveError};
use bragg_core::io::{FitnessSummary, ResultSink};
use bragg_core::pipeline::{SolveContext, SolveRequest, Solver};
use bragg_core::volume::{Candidate, ComplexVolume, DeviceId, RealVolume};

/// Smooth real blob centred at `centre` with Gaussian width `sigma`.
pub fn blob(shape: (usize, usize, usize), centre: [f64; 3], sigma: f64) -> RealVolume {
    Array3::from_shape_fn(shape, |(i, j, k)| {
        let d2 = (i as f64 - centre[0]).powi(2)
            + (j as f64 - centre[1]).powi(2)
            + (k as f64 - centre[2]).powi(2);
        (-d2 / (2.0 * sigma * sigma)).exp()
    })
}

/// Centred blob as a complex image with a gentle phase ramp.
pub fn complex_blob(shape: (usize, usize, usize), sigma: f64) -> ComplexVolume {
    let centre = [
        shape.0 as f64 / 2.0,
        shape.1 as f64 / 2.0,
        shape.2 as f64 / 2.0,
    ];
    let amp = blob(shape, centre, sigma);
    Array3::from_shape_fn(shape, |(i, j, k)| {
        let phase = 0.05 * (i as f64 - centre[0]) + 0.2;
        Complex64::from_polar(amp[[i, j, k]], phase)
    })
}

/// Uniform random real volume from a fixed seed.
pub fn random_volume(shape: (usize, usize, usize), seed: u64) -> RealVolume {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn(shape, |_| rng.gen::<f64>())
}

/// Binary support: 1.0 wherever the amplitude exceeds `level`.
pub fn support_of(image: &ComplexVolume, level: f64) -> RealVolume {
    image.mapv(|v| if v.norm() > level { 1.0 } else { 0.0 })
}

/// Recorded call to [`StubSolver::solve`].
#[derive(Clone, Debug, PartialEq)]
pub struct SolveCall {
    pub generation: usize,
    pub dataset: usize,
    pub index: usize,
    pub device: Option<DeviceId>,
    pub warm_start: bool,
    pub data_sum: f64,
}

/// Solver that needs no external program.
///
/// Cold starts return `images[index]` with error `errors[index]`; warm
/// starts return the initial candidate with its error halved.
pub struct StubSolver {
    pub images: Vec<ComplexVolume>,
    pub errors: Vec<f64>,
    pub calls: Mutex<Vec<SolveCall>>,
    pub diverge: Option<usize>,
    pub fail: Option<usize>,
    /// Index of a run that blocks until the token is cancelled.
    pub hang: Option<usize>,
    /// Index of a run that ignores cancellation and only ends once the
    /// controller terminates it.
    pub stubborn: Option<usize>,
    /// Number of runs that ended through termination.
    pub terminated: AtomicUsize,
}

impl StubSolver {
    pub fn new(images: Vec<ComplexVolume>, errors: Vec<f64>) -> Self {
        Self {
            images,
            errors,
            calls: Mutex::new(Vec::new()),
            diverge: None,
            fail: None,
            hang: None,
            stubborn: None,
            terminated: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<SolveCall> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_by_key(|c| (c.generation, c.dataset, c.index));
        calls
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl Solver for StubSolver {
    fn solve(&self, request: SolveRequest, ctx: &SolveContext) -> Result<Candidate, SolveError> {
        self.calls.lock().unwrap().push(SolveCall {
            generation: request.generation,
            dataset: request.dataset,
            index: request.index,
            device: request.device,
            warm_start: request.initial.is_some(),
            data_sum: request.data.sum(),
        });

        if self.fail == Some(request.index) {
            return Err(SolveError::Failed("stub failure".into()));
        }
        if self.hang == Some(request.index) {
            while !ctx.cancel.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            return Err(SolveError::Cancelled);
        }
        if self.stubborn == Some(request.index) {
            while !ctx.terminate.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            self.terminated.fetch_add(1, Ordering::SeqCst);
            return Err(SolveError::Cancelled);
        }

        let index = request.index;
        let candidate = match request.initial {
            Some(initial) => {
                let err = initial.final_error().unwrap_or(self.errors[index]) * 0.5;
                initial.with_error_trace(vec![1.0, err])
            }
            None => {
                let image = self.images[index].clone();
                let support = support_of(&image, 0.1);
                Candidate::new(image, support)
                    .map_err(|e| SolveError::Failed(e.to_string()))?
                    .with_error_trace(vec![1.0, self.errors[index]])
            }
        };
        if self.diverge == Some(index) {
            return Ok(candidate.with_error_trace(vec![1.0, f64::NAN]));
        }
        Ok(candidate)
    }
}

/// In-memory checkpoint sink.
#[derive(Default)]
pub struct MemorySink {
    pub saved: Mutex<Vec<(usize, Vec<Candidate>, FitnessSummary)>>,
}

impl MemorySink {
    pub fn generations(&self) -> Vec<usize> {
        self.saved.lock().unwrap().iter().map(|s| s.0).collect()
    }

    pub fn last(&self) -> Option<(usize, Vec<Candidate>, FitnessSummary)> {
        self.saved.lock().unwrap().last().cloned()
    }
}

impl ResultSink for MemorySink {
    fn save(
        &self,
        generation: usize,
        population: &[Candidate],
        summary: &FitnessSummary,
    ) -> Result<(), BraggError> {
        self.saved
            .lock()
            .unwrap()
            .push((generation, population.to_vec(), summary.clone()));
        Ok(())
    }
}
