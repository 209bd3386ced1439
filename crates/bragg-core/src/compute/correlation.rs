use ndarray::{Array, Dimension, Zip};
use num_complex::Complex64;

use super::fft::{fftn, fftshift, ifftn, ifftshift};

/// Complex conjugate of the point reflection of `data` through its centre.
///
/// Computed in reciprocal space so the reflection centre matches the
/// `fftshift` convention used everywhere else.
pub fn conj_reflect<D: Dimension>(data: &Array<Complex64, D>) -> Array<Complex64, D> {
    let spectrum = ifftshift(&fftn(&fftshift(data)));
    let conj = spectrum.mapv(|v| v.conj());
    ifftshift(&ifftn(&fftshift(&conj)))
}

/// Circular cross-correlation `ifftn(conj(F a) * F b)`.
pub fn cross_correlation<D: Dimension>(
    a: &Array<Complex64, D>,
    b: &Array<Complex64, D>,
) -> Array<Complex64, D> {
    let fa = fftn(a);
    let fb = fftn(b);
    let product = Zip::from(&fa).and(&fb).map_collect(|x, y| x.conj() * y);
    ifftn(&product)
}

/// Largest modulus in a complex array.
pub fn peak_magnitude<D: Dimension>(data: &Array<Complex64, D>) -> f64 {
    data.iter().fold(0.0_f64, |acc, v| acc.max(v.norm()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn reflection_is_an_involution() {
        let data: Array1<Complex64> = (0..7)
            .map(|i| Complex64::new(i as f64, 1.0 - i as f64 * 0.3))
            .collect();
        let twice = conj_reflect(&conj_reflect(&data));
        for (a, b) in data.iter().zip(twice.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn autocorrelation_peaks_at_origin() {
        let data: Array1<Complex64> = (0..8)
            .map(|i| Complex64::new(((i * 3) % 5) as f64, 0.0))
            .collect();
        let cc = cross_correlation(&data, &data);
        let peak = peak_magnitude(&cc);
        assert!((cc[0].norm() - peak).abs() < 1e-9);
    }
}
