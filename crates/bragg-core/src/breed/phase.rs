use ndarray::{Array, Dimension, Zip};
use num_complex::Complex64;

use crate::filters::tight_support;

/// Remove the mean phase over the tight support, so the object's average
/// phase is zero. Returns the input unchanged when the support is empty.
pub fn zero_phase<D: Dimension>(image: &Array<Complex64, D>) -> Array<Complex64, D> {
    let support = tight_support(image);
    let weight = support.sum();
    if weight <= 0.0 {
        return image.clone();
    }
    let phase_sum = Zip::from(image)
        .and(&support)
        .fold(0.0, |acc, v, &s| acc + v.arg() * s);
    let rotation = Complex64::cis(-phase_sum / weight);
    image.mapv(|v| v * rotation)
}

/// Rotate `image` by the global phase that best matches it to `reference`
/// (the phase of their complex inner product).
pub fn zero_phase_cc<D: Dimension>(
    image: &Array<Complex64, D>,
    reference: &Array<Complex64, D>,
) -> Array<Complex64, D> {
    let inner = Zip::from(image)
        .and(reference)
        .fold(Complex64::new(0.0, 0.0), |acc, a, b| acc + a.conj() * b);
    let rotation = Complex64::cis(inner.arg());
    image.mapv(|v| v * rotation)
}
