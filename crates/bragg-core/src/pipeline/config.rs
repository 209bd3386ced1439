use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::lowres::{sigma_schedule, SigmaAlgorithm};
use crate::breed::{BreedMode, BreedParams};
use crate::consts::{
    DEFAULT_GRACE_PERIOD_SECS, DEFAULT_LOW_RES_SCALE_POWER, DEFAULT_LOW_RES_SIGMA_MAX,
    DEFAULT_LOW_RES_SIGMA_MIN, DEFAULT_SUPPORT_SIGMA, DEFAULT_SUPPORT_THRESHOLD,
};
use crate::error::{BraggError, Result};
use crate::quality::FitnessMetric;
use crate::volume::DeviceId;

/// Reconstruction settings as read from a file. Every field has a default;
/// per-generation lists may be shorter than `generations` and are padded by
/// [`ReconstructionConfig::resolve`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub generations: usize,
    /// Population size.
    pub samples: usize,
    /// Fitness metric per generation; padded with the last entry.
    pub metrics: Vec<FitnessMetric>,
    /// Breed mode per generation; padded with `none`.
    pub breed_modes: Vec<BreedMode>,
    /// Worst candidates dropped before breeding, per generation; padded with 0.
    pub culling: Vec<usize>,
    pub support_threshold: f64,
    pub support_sigma: f64,
    /// Per-generation shrink-wrap overrides, padded with the scalar values.
    pub generation_support_thresholds: Vec<f64>,
    pub generation_support_sigmas: Vec<f64>,
    pub low_resolution_generations: usize,
    pub low_resolution_sigma_alg: SigmaAlgorithm,
    pub low_resolution_sigmas: Option<Vec<f64>>,
    pub low_resolution_sigma_min: f64,
    pub low_resolution_sigma_max: f64,
    pub low_resolution_scale_power: f64,
    /// Accelerators to schedule runs on; empty runs without devices.
    pub device_ids: Vec<DeviceId>,
    /// Device memory per run; estimated from the data size when absent.
    pub per_run_bytes: Option<u64>,
    /// Checkpoint directory to warm-start generation 0 from.
    pub continuation_dir: Option<PathBuf>,
    pub grace_period_secs: u64,
    pub seed: u64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            generations: 1,
            samples: 1,
            metrics: vec![FitnessMetric::Chi],
            breed_modes: Vec::new(),
            culling: Vec::new(),
            support_threshold: DEFAULT_SUPPORT_THRESHOLD,
            support_sigma: DEFAULT_SUPPORT_SIGMA,
            generation_support_thresholds: Vec::new(),
            generation_support_sigmas: Vec::new(),
            low_resolution_generations: 0,
            low_resolution_sigma_alg: SigmaAlgorithm::default(),
            low_resolution_sigmas: None,
            low_resolution_sigma_min: DEFAULT_LOW_RES_SIGMA_MIN,
            low_resolution_sigma_max: DEFAULT_LOW_RES_SIGMA_MAX,
            low_resolution_scale_power: DEFAULT_LOW_RES_SCALE_POWER,
            device_ids: Vec::new(),
            per_run_bytes: None,
            continuation_dir: None,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            seed: 0,
        }
    }
}

/// Validated, fully expanded generation settings. Every per-generation
/// vector has exactly `generations` entries.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub generations: usize,
    pub samples: usize,
    pub metrics: Vec<FitnessMetric>,
    pub breed_modes: Vec<BreedMode>,
    pub culling: Vec<usize>,
    pub support_thresholds: Vec<f64>,
    pub support_sigmas: Vec<f64>,
    /// Low-pass sigma of each low-resolution generation.
    pub low_resolution_sigmas: Vec<f64>,
    pub device_ids: Vec<DeviceId>,
    pub per_run_bytes: Option<u64>,
    pub continuation_dir: Option<PathBuf>,
    pub grace_period: Duration,
    pub seed: u64,
    /// Soft fallbacks taken while resolving.
    pub warnings: Vec<String>,
}

fn pad<T: Clone>(values: &[T], len: usize, fill: T) -> Vec<T> {
    let mut out: Vec<T> = values.iter().take(len).cloned().collect();
    out.resize(len, fill);
    out
}

impl ReconstructionConfig {
    /// Validate and expand into a [`GenerationConfig`].
    pub fn resolve(&self) -> Result<GenerationConfig> {
        let g = self.generations;
        if g == 0 {
            return Err(BraggError::InvalidConfig("generations must be at least 1".into()));
        }
        if self.samples == 0 {
            return Err(BraggError::InvalidConfig("samples must be at least 1".into()));
        }
        if self.low_resolution_generations > g {
            return Err(BraggError::InvalidConfig(format!(
                "low_resolution_generations ({}) exceeds generations ({g})",
                self.low_resolution_generations
            )));
        }

        let mut warnings = Vec::new();

        let last_metric = self.metrics.last().copied().unwrap_or_default();
        let metrics = pad(&self.metrics, g, last_metric);
        let breed_modes = pad(&self.breed_modes, g, BreedMode::None);
        let culling = pad(&self.culling, g, 0);
        let support_thresholds =
            pad(&self.generation_support_thresholds, g, self.support_threshold);
        let support_sigmas = pad(&self.generation_support_sigmas, g, self.support_sigma);

        for (gen, (&t, &s)) in support_thresholds.iter().zip(&support_sigmas).enumerate() {
            if !(t > 0.0 && t <= 1.0) {
                return Err(BraggError::InvalidConfig(format!(
                    "support threshold {t} for generation {gen} is outside (0, 1]"
                )));
            }
            if !(s >= 0.0 && s.is_finite()) {
                return Err(BraggError::InvalidConfig(format!(
                    "support sigma {s} for generation {gen} is invalid"
                )));
            }
        }

        // Breeding happens after every generation but the last; culling
        // shrinks the population for the rest of the run.
        let mut population = self.samples;
        for gen in 0..g.saturating_sub(1) {
            if breed_modes[gen] == BreedMode::None || population <= 1 {
                continue;
            }
            if culling[gen] >= population {
                return Err(BraggError::InvalidConfig(format!(
                    "generation {gen} culls {} of {population} candidates",
                    culling[gen]
                )));
            }
            population -= culling[gen];
        }

        let low_resolution_sigmas = match sigma_schedule(self)? {
            Some(sigmas) => sigmas,
            None => {
                let msg = "low resolution sigmas are missing, low resolution disabled".to_string();
                warn!("{msg}");
                warnings.push(msg);
                Vec::new()
            }
        };

        Ok(GenerationConfig {
            generations: g,
            samples: self.samples,
            metrics,
            breed_modes,
            culling,
            support_thresholds,
            support_sigmas,
            low_resolution_sigmas,
            device_ids: self.device_ids.clone(),
            per_run_bytes: self.per_run_bytes,
            continuation_dir: self.continuation_dir.clone(),
            grace_period: Duration::from_secs(self.grace_period_secs),
            seed: self.seed,
            warnings,
        })
    }
}

impl GenerationConfig {
    pub fn low_resolution_generations(&self) -> usize {
        self.low_resolution_sigmas.len()
    }

    /// Low-pass sigma for `generation`, if it is a low-resolution one.
    pub fn low_resolution_sigma(&self, generation: usize) -> Option<f64> {
        self.low_resolution_sigmas.get(generation).copied()
    }

    pub fn breed_params(&self, generation: usize) -> BreedParams {
        BreedParams {
            mode: self.breed_modes[generation],
            support_threshold: self.support_thresholds[generation],
            support_sigma: self.support_sigmas[generation],
            cull: self.culling[generation],
            seed: self.seed.wrapping_add(generation as u64),
        }
    }
}
