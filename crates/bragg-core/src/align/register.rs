use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex64;
use tracing::debug;

use super::upsampled::locate_peak;
use crate::compute::{fftn, shift_subpixel};
use crate::consts::BREED_UPSAMPLE_FACTOR;
use crate::error::{BraggError, Result};
use crate::volume::{check_same_shape, to_complex, ComplexVolume};

/// Outcome of a sub-pixel registration.
///
/// `shift` is the displacement of the target relative to the reference:
/// shifting the target by `-shift` aligns it onto the reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Registration<const N: usize> {
    pub shift: [f64; N],
    /// Correlation peak magnitude, normalised by the element count.
    pub peak: f64,
    /// False when the peak is zero or not finite (nothing to register).
    pub peak_ok: bool,
}

fn check_upsample(upsample_factor: u32) -> Result<()> {
    if upsample_factor < 2 {
        return Err(BraggError::InvalidArgument(format!(
            "upsample factor must be at least 2, got {upsample_factor}"
        )));
    }
    Ok(())
}

/// Sub-pixel registration of two same-shaped 2-D arrays.
pub fn register_2d(
    reference: &Array2<Complex64>,
    target: &Array2<Complex64>,
    upsample_factor: u32,
) -> Result<Registration<2>> {
    check_same_shape(reference, target, "register_2d")?;
    check_upsample(upsample_factor)?;

    let ref_fft = fftn(reference);
    let tgt_fft = fftn(target);
    let cross_power = Zip::from(&ref_fft)
        .and(&tgt_fft)
        .map_collect(|r, t| r.conj() * t);

    let peak = locate_peak(&cross_power, upsample_factor);
    Ok(Registration {
        shift: peak.shift,
        peak: peak.magnitude,
        peak_ok: peak.magnitude.is_finite() && peak.magnitude > 0.0,
    })
}

/// Sub-pixel registration of two same-shaped 3-D volumes.
///
/// Each axis shift is estimated twice, from the two axis-summed projections
/// that contain it, and the two estimates are averaged.
pub fn register_3d(
    reference: &Array3<Complex64>,
    target: &Array3<Complex64>,
    upsample_factor: u32,
) -> Result<Registration<3>> {
    check_same_shape(reference, target, "register_3d")?;
    check_upsample(upsample_factor)?;

    let project = |axis: usize| -> Result<Registration<2>> {
        register_2d(
            &reference.sum_axis(Axis(axis)),
            &target.sum_axis(Axis(axis)),
            upsample_factor,
        )
    };
    // Projection along axis 2 sees axes (0, 1), along 1 sees (0, 2), along 0 sees (1, 2).
    let along_2 = project(2)?;
    let along_1 = project(1)?;
    let along_0 = project(0)?;

    let shift = [
        0.5 * (along_2.shift[0] + along_1.shift[0]),
        0.5 * (along_2.shift[1] + along_0.shift[0]),
        0.5 * (along_1.shift[1] + along_0.shift[1]),
    ];
    let peak = along_2.peak.min(along_1.peak).min(along_0.peak);
    let peak_ok = along_2.peak_ok && along_1.peak_ok && along_0.peak_ok;

    debug!(?shift, peak, peak_ok, "Registered volumes");
    Ok(Registration {
        shift,
        peak,
        peak_ok,
    })
}

/// Align `target` onto `reference` by registering their amplitudes and
/// applying the opposite sub-pixel shift to the complex target.
pub fn align_to(reference: &ComplexVolume, target: &ComplexVolume) -> Result<ComplexVolume> {
    let reg = register_3d(
        &to_complex(&reference.mapv(|v| v.norm())),
        &to_complex(&target.mapv(|v| v.norm())),
        BREED_UPSAMPLE_FACTOR,
    )?;
    let back = reg.shift.map(|s| -s);
    Ok(shift_subpixel(target, &back))
}
