use serde::{Deserialize, Serialize};

use super::config::ReconstructionConfig;
use crate::error::{BraggError, Result};
use crate::filters::gaussian_mask;
use crate::volume::RealVolume;

/// How the per-generation low-pass sigmas are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigmaAlgorithm {
    /// Linear from `low_resolution_sigma_max` down to `support_sigma`.
    #[default]
    SpaceLinear,
    /// `support_sigma / (t * (1 - min) + min)^power` for `t` in `[0, 1]`,
    /// clipped to `[support_sigma, low_resolution_sigma_max]`.
    ScalePower,
    /// Taken from `low_resolution_sigmas`.
    Assigned,
}

impl std::fmt::Display for SigmaAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpaceLinear => write!(f, "Space linear"),
            Self::ScalePower => write!(f, "Scale power"),
            Self::Assigned => write!(f, "Assigned"),
        }
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Sigma of every low-resolution generation.
///
/// Returns `None` when the assigned algorithm has no sigma list, which
/// disables low resolution; a list shorter than the low-resolution
/// generation count is an error.
pub(crate) fn sigma_schedule(config: &ReconstructionConfig) -> Result<Option<Vec<f64>>> {
    let n = config.low_resolution_generations;
    if n == 0 {
        return Ok(Some(Vec::new()));
    }
    let support_sigma = config.support_sigma;
    let max = config.low_resolution_sigma_max;

    let sigmas = match config.low_resolution_sigma_alg {
        SigmaAlgorithm::SpaceLinear => linspace(max, support_sigma, n),
        SigmaAlgorithm::ScalePower => {
            let min = config.low_resolution_sigma_min;
            linspace(0.0, 1.0, n)
                .into_iter()
                .map(|t| {
                    let s = support_sigma / (t * (1.0 - min) + min).powf(config.low_resolution_scale_power);
                    s.max(support_sigma).min(max)
                })
                .collect()
        }
        SigmaAlgorithm::Assigned => {
            let Some(assigned) = &config.low_resolution_sigmas else {
                return Ok(None);
            };
            if assigned.len() < n {
                return Err(BraggError::InvalidConfig(format!(
                    "{} low resolution sigmas given for {n} low resolution generations",
                    assigned.len()
                )));
            }
            assigned[..n].to_vec()
        }
    };
    Ok(Some(sigmas))
}

/// Data as seen by a low-resolution generation: multiplied by a centred
/// Gaussian mask of width `sigma`.
pub fn low_resolution_view(data: &RealVolume, sigma: f64) -> RealVolume {
    data * &gaussian_mask(data.dim(), sigma)
}
