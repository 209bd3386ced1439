//! Fitness metrics used to rank a population.

use std::fmt;

use ndarray::{Array, ArrayView1, Axis, Dimension, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::breed::zero_phase;
use crate::filters::{loose_support, tight_support};
use crate::volume::{amplitude, Candidate};

/// Metric a generation is ranked by.
///
/// Unknown names fall back to [`FitnessMetric::Chi`] with a warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FitnessMetric {
    /// Final solver error; lower is better.
    #[default]
    Chi,
    /// Sum of amplitude to the fourth power; lower is better.
    Sharpness,
    /// Sum of |phase| over the tight support; higher is better.
    SummedPhase,
    /// Voxel count of the loose support; higher is better.
    Area,
    /// Total variation of the amplitude; lower is better.
    TotalVariation,
}

impl FitnessMetric {
    pub fn name(self) -> &'static str {
        match self {
            FitnessMetric::Chi => "chi",
            FitnessMetric::Sharpness => "sharpness",
            FitnessMetric::SummedPhase => "summed_phase",
            FitnessMetric::Area => "area",
            FitnessMetric::TotalVariation => "tv",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chi" => Some(FitnessMetric::Chi),
            "sharpness" => Some(FitnessMetric::Sharpness),
            "summed_phase" => Some(FitnessMetric::SummedPhase),
            "area" => Some(FitnessMetric::Area),
            "tv" => Some(FitnessMetric::TotalVariation),
            _ => None,
        }
    }

    /// Whether the ascending score order is reversed when ranking.
    pub fn higher_is_better(self) -> bool {
        matches!(self, FitnessMetric::SummedPhase | FitnessMetric::Area)
    }
}

impl From<String> for FitnessMetric {
    fn from(name: String) -> Self {
        FitnessMetric::parse(&name).unwrap_or_else(|| {
            warn!(metric = %name, "Unknown fitness metric, using chi");
            FitnessMetric::Chi
        })
    }
}

impl From<FitnessMetric> for String {
    fn from(metric: FitnessMetric) -> Self {
        metric.name().to_string()
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar score of one candidate. A candidate without an error trace scores
/// `+inf` under `chi`.
pub fn score(candidate: &Candidate, metric: FitnessMetric) -> f64 {
    match metric {
        FitnessMetric::Chi => candidate.final_error().unwrap_or(f64::INFINITY),
        FitnessMetric::Sharpness => candidate.image.iter().map(|v| v.norm().powi(4)).sum(),
        FitnessMetric::SummedPhase => summed_phase(&candidate.image),
        FitnessMetric::Area => loose_support(&candidate.image).sum(),
        FitnessMetric::TotalVariation => total_variation(&amplitude(&candidate.image)),
    }
}

fn summed_phase<D: Dimension>(image: &Array<Complex64, D>) -> f64 {
    let referenced = zero_phase(image);
    let support = tight_support(&referenced);
    Zip::from(&referenced)
        .and(&support)
        .fold(0.0, |acc, v, &s| acc + (v.arg() * s).abs())
}

/// Sum over all axes of the absolute gradient (central differences inside,
/// one-sided at the edges).
pub fn total_variation<D: Dimension>(amp: &Array<f64, D>) -> f64 {
    (0..amp.ndim())
        .map(|axis| {
            amp.lanes(Axis(axis))
                .into_iter()
                .map(lane_variation)
                .sum::<f64>()
        })
        .sum()
}

fn lane_variation(lane: ArrayView1<f64>) -> f64 {
    let n = lane.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = (lane[1] - lane[0]).abs() + (lane[n - 1] - lane[n - 2]).abs();
    for i in 1..n - 1 {
        total += 0.5 * (lane[i + 1] - lane[i - 1]).abs();
    }
    total
}

/// Scores of every candidate, in population order.
pub fn score_population(population: &[Candidate], metric: FitnessMetric) -> Vec<f64> {
    population.par_iter().map(|c| score(c, metric)).collect()
}

/// Rank order for precomputed scores: a stable ascending sort, reversed in
/// place for metrics where higher is better.
pub fn order_by_scores(scores: &[f64], metric: FitnessMetric) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    if metric.higher_is_better() {
        order.reverse();
    }
    order
}

/// Permutation that orders `population` best first under `metric`.
pub fn rank(population: &[Candidate], metric: FitnessMetric) -> Vec<usize> {
    order_by_scores(&score_population(population, metric), metric)
}
