use ndarray::{Array, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};

use crate::consts::{LOW_RES_UNFILTERED_SIGMA, PARALLEL_VOXEL_THRESHOLD};
use crate::volume::RealVolume;

/// Separable Gaussian blur over every axis of an N-d array.
///
/// Edges are clamped. A non-positive `sigma` returns the input unchanged.
pub fn gaussian_blur<D: Dimension>(data: &Array<f64, D>, sigma: f64) -> Array<f64, D> {
    if sigma <= 0.0 || data.is_empty() {
        return data.clone();
    }
    let kernel = make_gaussian_kernel(sigma);
    let parallel = data.len() >= PARALLEL_VOXEL_THRESHOLD;

    let mut current = data.clone();
    for axis in 0..data.ndim() {
        let mut next = Array::<f64, D>::zeros(current.raw_dim());
        let zip = Zip::from(next.lanes_mut(Axis(axis))).and(current.lanes(Axis(axis)));
        if parallel {
            zip.par_for_each(|out, src| convolve_lane(out, src, &kernel));
        } else {
            zip.for_each(|out, src| convolve_lane(out, src, &kernel));
        }
        current = next;
    }
    current
}

fn make_gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (sigma * 3.0).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f64; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f64;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

fn convolve_lane(mut out: ArrayViewMut1<f64>, src: ArrayView1<f64>, kernel: &[f64]) {
    let n = src.len() as isize;
    let radius = (kernel.len() / 2) as isize;
    for (i, dst) in out.iter_mut().enumerate() {
        let mut sum = 0.0f64;
        for (ki, &kv) in kernel.iter().enumerate() {
            let j = (i as isize + ki as isize - radius).clamp(0, n - 1) as usize;
            sum += src[j] * kv;
        }
        *dst = sum;
    }
}

/// Centred Gaussian low-pass mask for reciprocal-space data.
///
/// The width along each axis is `sigma * n / 2`; the peak value is 1.0.
/// At `sigma >= 1.0` the mask is all ones.
pub fn gaussian_mask(shape: (usize, usize, usize), sigma: f64) -> RealVolume {
    if sigma >= LOW_RES_UNFILTERED_SIGMA || sigma <= 0.0 {
        return RealVolume::ones(shape);
    }
    let dims = [shape.0, shape.1, shape.2];
    let widths = dims.map(|n| (sigma * n as f64 / 2.0).max(f64::MIN_POSITIVE));
    RealVolume::from_shape_fn(shape, |(i, j, k)| {
        let exponent: f64 = [i, j, k]
            .iter()
            .zip(dims.iter().zip(widths.iter()))
            .map(|(&x, (&n, &w))| {
                let d = x as f64 - (n / 2) as f64;
                d * d / (2.0 * w * w)
            })
            .sum();
        (-exponent).exp()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn kernel_is_normalised() {
        let k = make_gaussian_kernel(1.3);
        assert_eq!(k.len(), 2 * 4 + 1);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn blur_preserves_constant_volume() {
        let data = Array3::<f64>::from_elem((5, 6, 7), 2.5);
        let blurred = gaussian_blur(&data, 1.0);
        for v in blurred.iter() {
            assert!((v - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn mask_peaks_at_centre() {
        let mask = gaussian_mask((8, 8, 8), 0.5);
        assert!((mask[[4, 4, 4]] - 1.0).abs() < 1e-12);
        assert!(mask[[0, 0, 0]] < mask[[2, 4, 4]]);
    }

    #[test]
    fn wide_sigma_disables_mask() {
        let mask = gaussian_mask((4, 4, 4), 1.0);
        assert!(mask.iter().all(|&v| v == 1.0));
    }
}
