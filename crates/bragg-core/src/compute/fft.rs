//! N-dimensional FFT helpers built from rustfft 1-D passes.
//!
//! Conventions follow numpy: the forward transform is unnormalised, the
//! inverse is scaled by `1/N`, and `fftshift` moves the zero frequency to
//! index `n / 2` along every axis.

use std::f64::consts::TAU;
use std::sync::Arc;

use ndarray::{Array, ArrayViewMut1, Axis, Dimension, RemoveAxis, Slice, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::consts::PARALLEL_VOXEL_THRESHOLD;

/// Forward N-d FFT.
pub fn fftn<D: Dimension>(data: &Array<Complex64, D>) -> Array<Complex64, D> {
    let mut result = data.clone();
    transform_in_place(&mut result, FftDirection::Forward);
    result
}

/// Inverse N-d FFT, normalised by the element count.
pub fn ifftn<D: Dimension>(data: &Array<Complex64, D>) -> Array<Complex64, D> {
    let mut result = data.clone();
    transform_in_place(&mut result, FftDirection::Inverse);
    let scale = 1.0 / result.len().max(1) as f64;
    result.mapv_inplace(|v| v * scale);
    result
}

fn transform_in_place<D: Dimension>(data: &mut Array<Complex64, D>, direction: FftDirection) {
    let mut planner = FftPlanner::new();
    let parallel = data.len() >= PARALLEL_VOXEL_THRESHOLD;

    for axis in 0..data.ndim() {
        let n = data.len_of(Axis(axis));
        if n <= 1 {
            continue;
        }
        let fft = planner.plan_fft(n, direction);
        let lanes = Zip::from(data.lanes_mut(Axis(axis)));
        if parallel {
            lanes.par_for_each(|lane| process_lane(lane, &fft));
        } else {
            lanes.for_each(|lane| process_lane(lane, &fft));
        }
    }
}

fn process_lane(mut lane: ArrayViewMut1<Complex64>, fft: &Arc<dyn Fft<f64>>) {
    let mut buffer: Vec<Complex64> = lane.iter().copied().collect();
    fft.process(&mut buffer);
    for (dst, src) in lane.iter_mut().zip(buffer) {
        *dst = src;
    }
}

/// Signed frequency index of FFT bin `i` for a length-`n` transform.
pub(crate) fn fft_frequency(i: usize, n: usize) -> f64 {
    if i < n.div_ceil(2) {
        i as f64
    } else {
        i as f64 - n as f64
    }
}

/// Circularly roll every axis by the matching entry of `shifts`.
/// Missing entries leave the axis untouched.
pub fn roll<A: Clone, D: Dimension>(data: &Array<A, D>, shifts: &[isize]) -> Array<A, D> {
    let mut current = data.clone();
    for (axis, &shift) in shifts.iter().enumerate().take(data.ndim()) {
        let n = current.len_of(Axis(axis));
        if n == 0 {
            continue;
        }
        let s = shift.rem_euclid(n as isize) as usize;
        if s == 0 {
            continue;
        }
        let mut rolled = current.clone();
        rolled
            .slice_axis_mut(Axis(axis), Slice::from(s..))
            .assign(&current.slice_axis(Axis(axis), Slice::from(..n - s)));
        rolled
            .slice_axis_mut(Axis(axis), Slice::from(..s))
            .assign(&current.slice_axis(Axis(axis), Slice::from(n - s..)));
        current = rolled;
    }
    current
}

/// Move the zero-frequency bin to the centre of every axis.
pub fn fftshift<A: Clone, D: Dimension>(data: &Array<A, D>) -> Array<A, D> {
    let shifts: Vec<isize> = data.shape().iter().map(|&n| (n / 2) as isize).collect();
    roll(data, &shifts)
}

/// Inverse of [`fftshift`] (differs from it for odd lengths).
pub fn ifftshift<A: Clone, D: Dimension>(data: &Array<A, D>) -> Array<A, D> {
    let shifts: Vec<isize> = data.shape().iter().map(|&n| -((n / 2) as isize)).collect();
    roll(data, &shifts)
}

/// Translate an array by a (possibly fractional) shift per axis using a
/// Fourier phase ramp. Content at index `x` moves to `x + shift`, with
/// periodic wrap-around.
pub fn shift_subpixel<D: Dimension + RemoveAxis>(data: &Array<Complex64, D>, shift: &[f64]) -> Array<Complex64, D> {
    if shift.iter().all(|&s| s == 0.0) {
        return data.clone();
    }
    let mut spectrum = fftn(data);
    let dims = spectrum.shape().to_vec();

    for (axis, (&n, &s)) in dims.iter().zip(shift).enumerate() {
        if s == 0.0 {
            continue;
        }
        let ramp: Vec<Complex64> = (0..n)
            .map(|i| Complex64::cis(-TAU * fft_frequency(i, n) * s / n as f64))
            .collect();
        for (i, mut plane) in spectrum.axis_iter_mut(Axis(axis)).enumerate() {
            let factor = ramp[i];
            plane.mapv_inplace(|v| v * factor);
        }
    }

    ifftn(&spectrum)
}
