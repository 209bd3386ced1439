use ndarray::{Array, Dimension, Zip};
use num_complex::Complex64;

use super::gaussian::gaussian_blur;
use crate::consts::{
    AMBIGUITY_SUPPORT_SIGMA, AMBIGUITY_SUPPORT_THRESHOLD, LOOSE_SUPPORT_SIGMA,
    LOOSE_SUPPORT_THRESHOLD, PARALLEL_VOXEL_THRESHOLD, TIGHT_SUPPORT_SIGMA,
    TIGHT_SUPPORT_THRESHOLD,
};
use crate::volume::amplitude;

/// Derive a binary support (0.0 / 1.0) from an amplitude field.
///
/// The amplitude is blurred with `sigma`, normalised by its own maximum and
/// thresholded. An all-zero amplitude gives an all-zero support.
pub fn shrink_wrap<D: Dimension>(amp: &Array<f64, D>, threshold: f64, sigma: f64) -> Array<f64, D> {
    let blurred = gaussian_blur(amp, sigma);
    let max = blurred.iter().cloned().fold(0.0f64, f64::max);
    let mut support = Array::<f64, D>::zeros(blurred.raw_dim());
    if max <= 0.0 || !max.is_finite() {
        return support;
    }

    let cut = threshold * max;
    let zip = Zip::from(&mut support).and(&blurred);
    if blurred.len() >= PARALLEL_VOXEL_THRESHOLD {
        zip.par_for_each(|s, &b| *s = if b >= cut { 1.0 } else { 0.0 });
    } else {
        zip.for_each(|s, &b| *s = if b >= cut { 1.0 } else { 0.0 });
    }
    support
}

/// Support used for phase referencing and the summed-phase metric.
pub fn tight_support<D: Dimension>(image: &Array<Complex64, D>) -> Array<f64, D> {
    shrink_wrap(&amplitude(image), TIGHT_SUPPORT_THRESHOLD, TIGHT_SUPPORT_SIGMA)
}

/// Support used by the area metric.
pub fn loose_support<D: Dimension>(image: &Array<Complex64, D>) -> Array<f64, D> {
    shrink_wrap(&amplitude(image), LOOSE_SUPPORT_THRESHOLD, LOOSE_SUPPORT_SIGMA)
}

/// Coarse support used to resolve the conjugate-reflection ambiguity.
pub fn ambiguity_support<D: Dimension>(image: &Array<Complex64, D>) -> Array<f64, D> {
    shrink_wrap(
        &amplitude(image),
        AMBIGUITY_SUPPORT_THRESHOLD,
        AMBIGUITY_SUPPORT_SIGMA,
    )
}
