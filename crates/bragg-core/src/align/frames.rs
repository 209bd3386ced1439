use ndarray::{Array, Dimension};
use num_complex::Complex64;
use tracing::debug;

use crate::compute::{cross_correlation, roll};
use crate::error::{BraggError, Result};
use crate::volume::{check_same_shape, to_complex, RealVolume};

/// Whole-pixel registration: the argmax of the raw cross-correlation, with
/// indices past the midpoint wrapped to negative shifts.
///
/// Returns the displacement of `target` relative to `reference` per axis.
pub fn register_whole_pixel<D: Dimension>(
    reference: &Array<Complex64, D>,
    target: &Array<Complex64, D>,
) -> Result<Vec<isize>> {
    check_same_shape(reference, target, "register_whole_pixel")?;

    let correlation = cross_correlation(reference, target).into_dyn();
    let mut best_idx = vec![0usize; correlation.ndim()];
    let mut best = f64::NEG_INFINITY;
    for (idx, v) in correlation.indexed_iter() {
        let norm = v.norm();
        if norm > best {
            best = norm;
            best_idx.copy_from_slice(idx.slice());
        }
    }

    let shape = correlation.shape();
    Ok(best_idx
        .iter()
        .zip(shape)
        .map(|(&p, &n)| {
            if p > n / 2 {
                p as isize - n as isize
            } else {
                p as isize
            }
        })
        .collect())
}

/// Merge repeated exposures of one measurement into a single volume.
///
/// The first frame is the reference. Every later frame is registered to it
/// at whole-pixel precision, rolled into place and added to a running sum
/// seeded with the reference magnitude.
pub fn align_frames(frames: &[RealVolume]) -> Result<RealVolume> {
    let Some((reference, rest)) = frames.split_first() else {
        return Err(BraggError::NoData("no frames to align".into()));
    };

    let reference_c = to_complex(reference);
    let mut sum = reference.mapv(f64::abs);

    for (i, frame) in rest.iter().enumerate() {
        let shift = register_whole_pixel(&reference_c, &to_complex(frame))?;
        debug!(frame = i + 1, ?shift, "Frame offset");
        let back: Vec<isize> = shift.iter().map(|&s| -s).collect();
        sum += &roll(frame, &back);
    }

    Ok(sum)
}
