use ndarray::{Array, Array3, Dimension, Zip};
use num_complex::Complex64;

use crate::error::{BraggError, Result};

/// Dense complex 3-D array (reconstructed image, coherence, reciprocal space).
pub type ComplexVolume = Array3<Complex64>;

/// Dense real 3-D array (intensities, supports).
pub type RealVolume = Array3<f64>;

/// Physical accelerator index as reported by the driver.
pub type DeviceId = u32;

/// One member of the population: the result of a single reconstruction run.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub image: ComplexVolume,
    /// Binary support stored as 0.0 / 1.0.
    pub support: RealVolume,
    pub coherence: Option<ComplexVolume>,
    /// Per-iteration error reported by the solver.
    pub error_trace: Vec<f64>,
    pub reciprocal: Option<ComplexVolume>,
}

impl Candidate {
    /// Build a candidate, checking that image and support share a shape.
    pub fn new(image: ComplexVolume, support: RealVolume) -> Result<Self> {
        if image.dim() != support.dim() {
            return Err(BraggError::InvalidArgument(format!(
                "image shape {:?} does not match support shape {:?}",
                image.dim(),
                support.dim()
            )));
        }
        Ok(Self {
            image,
            support,
            coherence: None,
            error_trace: Vec::new(),
            reciprocal: None,
        })
    }

    pub fn with_error_trace(mut self, error_trace: Vec<f64>) -> Self {
        self.error_trace = error_trace;
        self
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.image.dim()
    }

    /// Last recorded error, if the candidate came out of a solver.
    pub fn final_error(&self) -> Option<f64> {
        self.error_trace.last().copied()
    }

    /// True when the solver signalled numerical failure.
    pub fn is_diverged(&self) -> bool {
        self.error_trace.iter().any(|e| e.is_nan())
    }

    pub fn amplitude(&self) -> RealVolume {
        amplitude(&self.image)
    }
}

/// Ordered set of candidates; index 0 is the best after ranking.
pub type Population = Vec<Candidate>;

pub fn amplitude<D: Dimension>(data: &Array<Complex64, D>) -> Array<f64, D> {
    data.mapv(|v| v.norm())
}

pub fn phase<D: Dimension>(data: &Array<Complex64, D>) -> Array<f64, D> {
    data.mapv(|v| v.arg())
}

/// Promote a real array to complex with zero imaginary part.
pub fn to_complex<D: Dimension>(data: &Array<f64, D>) -> Array<Complex64, D> {
    data.mapv(|v| Complex64::new(v, 0.0))
}

/// Recombine amplitude and phase fields into a complex array.
pub fn from_polar<D: Dimension>(amp: &Array<f64, D>, ph: &Array<f64, D>) -> Array<Complex64, D> {
    Zip::from(amp)
        .and(ph)
        .map_collect(|&a, &p| Complex64::from_polar(a, p))
}

pub(crate) fn check_same_shape<D: Dimension, A, B>(
    a: &Array<A, D>,
    b: &Array<B, D>,
    what: &str,
) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(BraggError::InvalidArgument(format!(
            "{what}: shape mismatch {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    if a.is_empty() {
        return Err(BraggError::InvalidArgument(format!("{what}: empty array")));
    }
    Ok(())
}
