//! Upsampled-DFT cross-correlation peak search on 2-D cross-power spectra.
//!
//! The coarse estimate comes from a 2x zero-padded inverse FFT; the optional
//! refinement evaluates a small window of the correlation surface with a
//! matrix-multiply DFT at `1 / upsample_factor` spacing.

use std::f64::consts::TAU;

use ndarray::{s, Array1, Array2};
use num_complex::Complex64;

use crate::compute::fft::fft_frequency;
use crate::compute::{fftshift, ifftn, ifftshift};
use crate::consts::UPSAMPLED_SEARCH_WINDOW;

/// Peak location and magnitude of a correlation surface.
pub(super) struct Peak {
    pub shift: [f64; 2],
    pub magnitude: f64,
}

/// Locate the correlation peak of `cross_power = conj(F ref) * F target`.
pub(super) fn locate_peak(cross_power: &Array2<Complex64>, upsample_factor: u32) -> Peak {
    let coarse = coarse_peak(cross_power);
    if upsample_factor <= 2 {
        return coarse;
    }
    refine_peak(cross_power, coarse.shift, upsample_factor)
}

fn coarse_peak(cross_power: &Array2<Complex64>) -> Peak {
    let (n0, n1) = cross_power.dim();
    let mut large = Array2::<Complex64>::zeros((2 * n0, 2 * n1));
    let (o0, o1) = (n0 - n0 / 2, n1 - n1 / 2);
    large
        .slice_mut(s![o0..o0 + n0, o1..o1 + n1])
        .assign(&fftshift(cross_power));

    let correlation = ifftn(&ifftshift(&large));
    let ((p0, p1), magnitude) = argmax_norm(&correlation);

    let wrap = |p: usize, n: usize| {
        let signed = if p > n { p as f64 - 2.0 * n as f64 } else { p as f64 };
        signed / 2.0
    };

    Peak {
        shift: [wrap(p0, n0), wrap(p1, n1)],
        magnitude: magnitude * 4.0,
    }
}

fn refine_peak(cross_power: &Array2<Complex64>, coarse: [f64; 2], upsample_factor: u32) -> Peak {
    let (n0, n1) = cross_power.dim();
    let usfac = upsample_factor as f64;
    let window = (usfac * UPSAMPLED_SEARCH_WINDOW).ceil() as usize;
    let centre = (window / 2) as f64;

    let start = coarse.map(|s| (s * usfac).round() / usfac);
    let offsets = |origin: f64| -> Array1<f64> {
        Array1::from_shape_fn(window, |j| origin + (j as f64 - centre) / usfac)
    };
    let x0 = offsets(start[0]);
    let x1 = offsets(start[1]);

    let row_kernel = Array2::from_shape_fn((window, n0), |(j, k)| {
        Complex64::cis(TAU * fft_frequency(k, n0) * x0[j] / n0 as f64)
    });
    let col_kernel = Array2::from_shape_fn((n1, window), |(k, j)| {
        Complex64::cis(TAU * fft_frequency(k, n1) * x1[j] / n1 as f64)
    });

    let correlation = row_kernel.dot(cross_power).dot(&col_kernel);
    let ((j0, j1), magnitude) = argmax_norm(&correlation);

    Peak {
        shift: [x0[j0], x1[j1]],
        magnitude: magnitude / (n0 * n1) as f64,
    }
}

fn argmax_norm(data: &Array2<Complex64>) -> ((usize, usize), f64) {
    let mut best = ((0, 0), f64::NEG_INFINITY);
    for (idx, v) in data.indexed_iter() {
        let norm = v.norm();
        if norm > best.1 {
            best = (idx, norm);
        }
    }
    best
}
