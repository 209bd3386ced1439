use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info};

use super::ambiguity::resolve_image;
use super::modes::{combine, BreedMode, Parents};
use super::phase::{zero_phase, zero_phase_cc};
use crate::align::align_to;
use crate::error::{BraggError, Result};
use crate::filters::shrink_wrap;
use crate::volume::{amplitude, Candidate, ComplexVolume, RealVolume};

/// Shrink-wrap and culling parameters of one breeding step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreedParams {
    pub mode: BreedMode,
    pub support_threshold: f64,
    pub support_sigma: f64,
    /// Worst members dropped before breeding.
    pub cull: usize,
    /// Seed for the random per-voxel choice of `pixel_switch`.
    pub seed: u64,
}

/// Result of breeding. `supports` is `None` when the population was passed
/// through unchanged and the previous supports remain valid.
#[derive(Clone, Debug)]
pub struct BreedOutcome {
    pub images: Vec<ComplexVolume>,
    pub supports: Option<Vec<RealVolume>>,
}

/// Bring a ranked member into alpha's frame: resolve the conjugate
/// ambiguity, align it sub-pixel onto alpha, re-reference its phase and
/// match its global phase to alpha.
pub fn prepare_member(alpha: &ComplexVolume, member: &ComplexVolume) -> Result<ComplexVolume> {
    let beta = zero_phase(member);
    let beta = resolve_image(alpha, beta);
    let beta = align_to(alpha, &beta)?;
    let beta = zero_phase(&beta);
    Ok(zero_phase_cc(&beta, alpha))
}

/// Breed the next generation from a population ranked best first.
///
/// The best member is kept (phase-referenced) as child 0; every other
/// survivor is combined with it according to `params.mode`.
pub fn breed(ranked: &[Candidate], params: &BreedParams) -> Result<BreedOutcome> {
    if ranked.is_empty() {
        return Err(BraggError::NoData("cannot breed an empty population".into()));
    }
    if params.mode == BreedMode::None {
        debug!("Breed mode none: population passed through");
        return Ok(BreedOutcome {
            images: ranked.iter().map(|c| c.image.clone()).collect(),
            supports: None,
        });
    }
    if params.cull >= ranked.len() {
        return Err(BraggError::InvalidArgument(format!(
            "cannot cull {} of {} candidates",
            params.cull,
            ranked.len()
        )));
    }

    let survivors: Vec<ComplexVolume> = ranked[..ranked.len() - params.cull]
        .iter()
        .map(|c| c.image.clone())
        .collect();
    let shape = survivors[0].dim();
    if let Some(bad) = survivors.iter().position(|s| s.dim() != shape) {
        return Err(BraggError::InvalidArgument(format!(
            "candidate {bad} has shape {:?}, expected {shape:?}",
            survivors[bad].dim()
        )));
    }

    info!(
        mode = %params.mode,
        survivors = survivors.len(),
        culled = params.cull,
        "Breeding population"
    );

    let alpha = zero_phase(&survivors[0]);
    let prepared: Vec<ComplexVolume> = survivors[1..]
        .par_iter()
        .map(|member| prepare_member(&alpha, member))
        .collect::<Result<_>>()?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut images = Vec::with_capacity(survivors.len());
    images.push(alpha.clone());
    for (offset, beta) in prepared.iter().enumerate() {
        let parents = Parents {
            alpha: &alpha,
            beta,
            gamma: &prepared[0],
            members: &survivors,
            index: offset + 1,
        };
        images.push(combine(params.mode, &parents, &mut rng));
    }

    let supports: Vec<RealVolume> = images
        .par_iter()
        .map(|image| {
            shrink_wrap(
                &amplitude(image),
                params.support_threshold,
                params.support_sigma,
            )
        })
        .collect();

    Ok(BreedOutcome {
        images,
        supports: Some(supports),
    })
}
