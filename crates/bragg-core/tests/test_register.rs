mod common;

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bragg_core::align::{align_to, register_2d, register_3d};
use bragg_core::compute::shift_subpixel;
use bragg_core::error::BraggError;
use bragg_core::volume::to_complex;

use common::{blob, complex_blob};

fn blob_2d(n: usize, sigma: f64) -> Array2<Complex64> {
    let c = n as f64 / 2.0;
    Array2::from_shape_fn((n, n), |(i, j)| {
        let d2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
        Complex64::new((-d2 / (2.0 * sigma * sigma)).exp(), 0.0)
    })
}

// ---------------------------------------------------------------------------
// 2-D
// ---------------------------------------------------------------------------

#[test]
fn test_register_2d_subpixel_shift() {
    let reference = blob_2d(32, 2.5);
    let target = shift_subpixel(&reference, &[2.25, -3.5]);

    let reg = register_2d(&reference, &target, 100).unwrap();
    assert!(reg.peak_ok);
    assert_abs_diff_eq!(reg.shift[0], 2.25, epsilon = 0.02);
    assert_abs_diff_eq!(reg.shift[1], -3.5, epsilon = 0.02);
}

#[test]
fn test_register_2d_identical_is_zero() {
    let reference = blob_2d(16, 2.0);
    let reg = register_2d(&reference, &reference, 20).unwrap();
    assert_abs_diff_eq!(reg.shift[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(reg.shift[1], 0.0, epsilon = 1e-6);
}

#[test]
fn test_register_2d_zero_input_flags_peak() {
    let zeros = Array2::<Complex64>::zeros((8, 8));
    let reg = register_2d(&zeros, &zeros, 10).unwrap();
    assert!(!reg.peak_ok);
}

// ---------------------------------------------------------------------------
// 3-D
// ---------------------------------------------------------------------------

#[test]
fn test_register_3d_subpixel_shift() {
    let shape = (16, 16, 16);
    let reference = to_complex(&blob(shape, [8.0, 8.0, 8.0], 2.0));
    let target = shift_subpixel(&reference, &[0.37, -1.2, 0.6]);

    let reg = register_3d(&reference, &target, 100).unwrap();
    assert!(reg.peak_ok);
    assert_abs_diff_eq!(reg.shift[0], 0.37, epsilon = 0.02);
    assert_abs_diff_eq!(reg.shift[1], -1.2, epsilon = 0.02);
    assert_abs_diff_eq!(reg.shift[2], 0.6, epsilon = 0.02);
}

#[test]
fn test_register_3d_random_volume() {
    let mut rng = StdRng::seed_from_u64(17);
    let reference: Array3<Complex64> =
        Array3::from_shape_fn((16, 16, 16), |_| Complex64::new(rng.gen(), rng.gen()));
    let target = shift_subpixel(&reference, &[0.37, -1.2, 0.6]);

    let reg = register_3d(&reference, &target, 100).unwrap();
    assert_abs_diff_eq!(reg.shift[0], 0.37, epsilon = 0.02);
    assert_abs_diff_eq!(reg.shift[1], -1.2, epsilon = 0.02);
    assert_abs_diff_eq!(reg.shift[2], 0.6, epsilon = 0.02);

    let same = register_3d(&reference, &reference, 100).unwrap();
    for s in same.shift {
        assert_abs_diff_eq!(s, 0.0, epsilon = 1e-6);
    }
}

#[test]
fn test_register_3d_rejects_small_upsample() {
    let v = Array3::<Complex64>::zeros((4, 4, 4));
    for factor in [0, 1] {
        let err = register_3d(&v, &v, factor).unwrap_err();
        assert!(matches!(err, BraggError::InvalidArgument(_)), "{err}");
    }
}

#[test]
fn test_register_3d_rejects_shape_mismatch() {
    let a = Array3::<Complex64>::zeros((4, 4, 4));
    let b = Array3::<Complex64>::zeros((4, 4, 5));
    assert!(matches!(
        register_3d(&a, &b, 10),
        Err(BraggError::InvalidArgument(_))
    ));
}

#[test]
fn test_align_to_undoes_shift() {
    let reference = complex_blob((16, 16, 16), 2.0);
    let target = shift_subpixel(&reference, &[1.5, -0.75, 0.25]);

    let aligned = align_to(&reference, &target).unwrap();
    let worst = aligned
        .iter()
        .zip(reference.iter())
        .map(|(a, r)| (a - r).norm())
        .fold(0.0, f64::max);
    assert!(worst < 0.02, "max deviation {worst}");
}
