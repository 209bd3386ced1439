use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::GenerationConfig;
use super::lowres::low_resolution_view;
use super::solver::{CancelToken, SolveContext, SolveRequest, Solver};
use super::types::{
    GenerationStage, NoOpReporter, ProgressReporter, RankedCandidate, TerminationReport,
};
use crate::breed::breed;
use crate::consts::{DISPATCH_POLL_MILLIS, TERMINATE_WAIT_MILLIS};
use crate::error::{BraggError, Result, SolveError};
use crate::io::{load_population, FitnessSummary, ResultSink};
use crate::quality::{order_by_scores, score_population};
use crate::schedule::{
    estimate_run_bytes, schedule_runs, split_by_directory, DeviceMonitor, StaticDeviceMonitor,
};
use crate::volume::{Candidate, DeviceId, RealVolume};

/// One measured data set (typically one prepared scan range) with the sink
/// its checkpoints go to. Every data set evolves its own population.
pub struct Dataset {
    pub label: String,
    pub data: RealVolume,
    pub sink: Arc<dyn ResultSink>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, data: RealVolume, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            label: label.into(),
            data,
            sink,
        }
    }
}

/// Per data set state carried across generations.
struct Lane {
    label: String,
    data: Arc<RealVolume>,
    view: Arc<RealVolume>,
    sink: Arc<dyn ResultSink>,
    population: Vec<Option<Candidate>>,
    final_ranking: Vec<RankedCandidate>,
}

type RunMessage = ((usize, usize), std::result::Result<Candidate, SolveError>);

/// Drives the genetic reconstruction: per generation it filters the data,
/// schedules devices, runs the solver on every candidate, ranks,
/// checkpoints and breeds.
pub struct GenerationController {
    config: GenerationConfig,
    solver: Arc<dyn Solver>,
    sink: Arc<dyn ResultSink>,
    monitor: Arc<dyn DeviceMonitor>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
    stop_file: Option<PathBuf>,
}

impl GenerationController {
    pub fn new(config: GenerationConfig, solver: Arc<dyn Solver>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            config,
            solver,
            sink,
            monitor: Arc::new(StaticDeviceMonitor::default()),
            reporter: Arc::new(NoOpReporter),
            cancel: CancelToken::new(),
            stop_file: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn DeviceMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Shared stop-flag file handed to every run. A file left over from an
    /// earlier, interrupted run is removed when [`run`](Self::run) starts.
    pub fn with_stop_file(mut self, stop_file: impl Into<PathBuf>) -> Self {
        self.stop_file = Some(stop_file.into());
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every generation on `data`, checkpointing through the
    /// controller's sink.
    pub fn run(&self, data: RealVolume) -> Result<TerminationReport> {
        let dataset = Dataset::new("", data, Arc::clone(&self.sink));
        self.run_datasets(vec![dataset])?
            .pop()
            .ok_or_else(|| BraggError::NoData("no data set reconstructed".into()))
    }

    /// Run every generation on several data sets at once.
    ///
    /// Each data set gets `samples` runs per generation; the
    /// `samples × data sets` runs are scheduled together and the device
    /// assignment is split back per data set. With more than one data set a
    /// continuation directory is read per label (`<dir>/<label>`).
    pub fn run_datasets(&self, datasets: Vec<Dataset>) -> Result<Vec<TerminationReport>> {
        if datasets.is_empty() {
            return Err(BraggError::NoData("no data sets to reconstruct".into()));
        }
        let cfg = &self.config;
        self.clear_stop_file()?;

        let multi = datasets.len() > 1;
        let mut warnings = cfg.warnings.clone();
        let per_run_bytes = cfg.per_run_bytes.unwrap_or_else(|| {
            datasets
                .iter()
                .map(|d| estimate_run_bytes(d.data.dim()))
                .max()
                .unwrap_or_default()
        });

        let mut lanes = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let population = self.initial_population(&dataset, multi)?;
            let data = Arc::new(dataset.data);
            lanes.push(Lane {
                label: dataset.label,
                view: Arc::clone(&data),
                data,
                sink: dataset.sink,
                population,
                final_ranking: Vec::new(),
            });
        }

        info!(
            generations = cfg.generations,
            samples = cfg.samples,
            datasets = lanes.len(),
            low_resolution = cfg.low_resolution_generations(),
            "Starting reconstruction"
        );

        for generation in 0..cfg.generations {
            self.reporter.begin_generation(generation, cfg.generations);
            if self.cancel.is_cancelled() {
                return Err(BraggError::Aborted { generation });
            }

            if let Some(sigma) = cfg.low_resolution_sigma(generation) {
                self.reporter.begin_stage(GenerationStage::LowResolution, Some(lanes.len()));
                debug!(generation, sigma, "Low resolution data");
                for (done, lane) in lanes.iter_mut().enumerate() {
                    lane.view = Arc::new(low_resolution_view(&lane.data, sigma));
                    self.reporter.advance(done + 1);
                }
                self.reporter.finish_stage();
            } else {
                for lane in &mut lanes {
                    lane.view = Arc::clone(&lane.data);
                }
            }

            self.reporter.begin_stage(GenerationStage::Scheduling, None);
            let per_directory = lanes[0].population.len();
            if let Some(odd) = lanes.iter().find(|l| l.population.len() != per_directory) {
                return Err(BraggError::InvalidArgument(format!(
                    "data set '{}' has {} candidates, expected {per_directory}",
                    odd.label,
                    odd.population.len()
                )));
            }
            let schedule = schedule_runs(
                per_directory * lanes.len(),
                per_run_bytes,
                &cfg.device_ids,
                self.monitor.as_ref(),
            )?;
            for w in schedule.warnings {
                if !warnings.contains(&w) {
                    warnings.push(w);
                }
            }
            let devices = split_by_directory(&schedule.assignment, per_directory);
            self.reporter.finish_stage();

            let solved = self.dispatch(generation, &mut lanes, &devices)?;

            for (lane, solved) in lanes.iter_mut().zip(solved) {
                self.reporter.begin_stage(GenerationStage::Ranking, Some(solved.len()));
                let metric = cfg.metrics[generation];
                let scores = score_population(&solved, metric);
                let order = order_by_scores(&scores, metric);
                lane.final_ranking = order
                    .iter()
                    .map(|&slot| RankedCandidate {
                        slot,
                        score: scores[slot],
                    })
                    .collect();
                let ranked = reorder(solved, &order);
                info!(
                    generation,
                    dataset = %lane.label,
                    %metric,
                    best = ?lane.final_ranking.first(),
                    "Population ranked"
                );
                self.reporter.finish_stage();

                self.reporter.begin_stage(GenerationStage::Checkpointing, None);
                let summary = FitnessSummary {
                    generation,
                    metric,
                    scores: lane.final_ranking.iter().map(|r| r.score).collect(),
                };
                lane.sink.save(generation, &ranked, &summary)?;
                self.reporter.finish_stage();

                lane.population = if generation + 1 < cfg.generations && ranked.len() > 1 {
                    self.reporter.begin_stage(GenerationStage::Breeding, Some(ranked.len()));
                    let next = self.breed_next(generation, ranked)?;
                    self.reporter.finish_stage();
                    next
                } else {
                    ranked.into_iter().map(Some).collect()
                };
            }
        }

        let final_generation = cfg.generations - 1;
        Ok(lanes
            .into_iter()
            .map(|lane| TerminationReport {
                dataset: lane.label,
                generations_completed: cfg.generations,
                final_generation,
                final_ranking: lane.final_ranking,
                metric: cfg.metrics[final_generation],
                warnings: warnings.clone(),
            })
            .collect())
    }

    fn clear_stop_file(&self) -> Result<()> {
        if let Some(stop) = &self.stop_file {
            if stop.exists() {
                info!(path = %stop.display(), "Removing stop file left by an earlier run");
                fs::remove_file(stop)?;
            }
        }
        Ok(())
    }

    fn initial_population(&self, dataset: &Dataset, multi: bool) -> Result<Vec<Option<Candidate>>> {
        let Some(root) = &self.config.continuation_dir else {
            return Ok(vec![None; self.config.samples]);
        };
        let dir = if multi {
            root.join(&dataset.label)
        } else {
            root.clone()
        };
        let shape = dataset.data.dim();
        self.reporter
            .begin_stage(GenerationStage::Loading, Some(self.config.samples));
        let loaded = load_population(&dir, self.config.samples)?;
        if let Some(bad) = loaded.iter().position(|c| c.shape() != shape) {
            return Err(BraggError::InvalidArgument(format!(
                "continuation candidate {bad} has shape {:?}, data has {shape:?}",
                loaded[bad].shape()
            )));
        }
        self.reporter.finish_stage();
        info!(dir = %dir.display(), candidates = loaded.len(), "Continuing from checkpoint");
        Ok(loaded.into_iter().map(Some).collect())
    }

    fn breed_next(&self, generation: usize, ranked: Vec<Candidate>) -> Result<Vec<Option<Candidate>>> {
        let outcome = breed(&ranked, &self.config.breed_params(generation))?;
        let Some(supports) = outcome.supports else {
            return Ok(ranked.into_iter().map(Some).collect());
        };
        outcome
            .images
            .into_iter()
            .zip(supports)
            .map(|(image, support)| Candidate::new(image, support).map(Some))
            .collect()
    }

    /// Run the solver once per candidate of every data set, one thread per
    /// run, and gather the results in population order.
    ///
    /// A failed run stops its siblings through a token local to this
    /// generation; the caller's token is only read.
    fn dispatch(
        &self,
        generation: usize,
        lanes: &mut [Lane],
        devices: &[Vec<Option<DeviceId>>],
    ) -> Result<Vec<Vec<Candidate>>> {
        let device_of = |lane: usize, index: usize| -> Option<DeviceId> {
            devices.get(lane).and_then(|d| d.get(index)).copied().flatten()
        };
        let run_cancel = self.cancel.child();
        let terminate = CancelToken::new();
        let ctx = Arc::new(SolveContext {
            cancel: run_cancel.clone(),
            terminate: terminate.clone(),
            stop_file: self.stop_file.clone(),
        });
        let (tx, rx) = mpsc::channel::<RunMessage>();

        let total: usize = lanes.iter().map(|l| l.population.len()).sum();
        let mut results: Vec<Vec<Option<Candidate>>> = Vec::with_capacity(lanes.len());
        let mut started = 0;
        self.reporter.begin_stage(GenerationStage::Solving, Some(total));
        for (dataset, lane) in lanes.iter_mut().enumerate() {
            let population = std::mem::take(&mut lane.population);
            results.push(vec![None; population.len()]);
            for (index, initial) in population.into_iter().enumerate() {
                let request = SolveRequest {
                    generation,
                    dataset,
                    index,
                    device: device_of(dataset, index),
                    data: Arc::clone(&lane.view),
                    initial,
                };
                let solver = Arc::clone(&self.solver);
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("solve-g{generation}-d{dataset}-{index}"))
                    .spawn(move || {
                        let outcome = solver.solve(request, &ctx);
                        let _ = tx.send(((dataset, index), outcome));
                    });
                if let Err(e) = spawned {
                    run_cancel.cancel();
                    self.terminate_outstanding(generation, &rx, &terminate, started);
                    return Err(e.into());
                }
                started += 1;
            }
        }
        drop(tx);

        let poll = Duration::from_millis(DISPATCH_POLL_MILLIS);
        let mut received = 0;
        let mut deadline: Option<Instant> = None;
        let mut failure: Option<BraggError> = None;

        while received < total {
            if deadline.is_none() && run_cancel.is_cancelled() {
                warn!(
                    generation,
                    outstanding = total - received,
                    grace_secs = self.config.grace_period.as_secs_f64(),
                    "Cancellation requested, waiting for running solvers"
                );
                deadline = Some(Instant::now() + self.config.grace_period);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let ((dataset, index), outcome) = match rx.recv_timeout(poll) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            received += 1;
            self.reporter.advance(received);

            if run_cancel.is_cancelled() {
                if let Err(e) = &outcome {
                    debug!(generation, dataset, candidate = index, error = %e, "Run ended after cancellation");
                }
                continue;
            }

            let expected_shape = lanes[dataset].data.dim();
            let problem = match outcome {
                Err(source) => Some(source),
                Ok(candidate) if candidate.is_diverged() => Some(SolveError::Diverged),
                Ok(candidate) if candidate.shape() != expected_shape => {
                    Some(SolveError::Failed(format!(
                        "result shape {:?} does not match data shape {expected_shape:?}",
                        candidate.shape()
                    )))
                }
                Ok(candidate) => {
                    debug!(generation, dataset, candidate = index, error = ?candidate.final_error(), "Run finished");
                    results[dataset][index] = Some(candidate);
                    None
                }
            };
            if let Some(source) = problem {
                warn!(generation, dataset, candidate = index, error = %source, "Run failed, stopping the others");
                failure = Some(BraggError::Solve {
                    generation,
                    dataset,
                    candidate: index,
                    device: device_of(dataset, index),
                    source,
                });
                run_cancel.cancel();
            }
        }
        self.reporter.finish_stage();

        if received < total {
            self.terminate_outstanding(generation, &rx, &terminate, total - received);
        }
        if let Some(err) = failure {
            return Err(err);
        }
        if run_cancel.is_cancelled() {
            warn!(generation, "Generation aborted, no checkpoint written");
            return Err(BraggError::Aborted { generation });
        }

        results
            .into_iter()
            .enumerate()
            .map(|(dataset, slots)| {
                slots
                    .into_iter()
                    .enumerate()
                    .map(|(index, slot)| {
                        slot.ok_or_else(|| BraggError::Solve {
                            generation,
                            dataset,
                            candidate: index,
                            device: device_of(dataset, index),
                            source: SolveError::Failed(
                                "solver thread ended without a result".into(),
                            ),
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Tell runs still going to end at once and wait a bounded time for them.
    fn terminate_outstanding(
        &self,
        generation: usize,
        rx: &Receiver<RunMessage>,
        terminate: &CancelToken,
        outstanding: usize,
    ) {
        warn!(generation, outstanding, "Terminating runs still in progress");
        terminate.cancel();
        let deadline = Instant::now() + Duration::from_millis(TERMINATE_WAIT_MILLIS);
        let mut left = outstanding;
        while left > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(_) => left -= 1,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(generation, left, "Runs did not exit after termination");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

/// Move candidates into rank order.
fn reorder(population: Vec<Candidate>, order: &[usize]) -> Vec<Candidate> {
    let mut slots: Vec<Option<Candidate>> = population.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}
