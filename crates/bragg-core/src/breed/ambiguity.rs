use tracing::debug;

use crate::compute::{conj_reflect, cross_correlation, peak_magnitude};
use crate::filters::ambiguity_support;
use crate::volume::{to_complex, Candidate, ComplexVolume};

/// Which orientation of `other` matches `reference` better.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Unchanged,
    ConjugateReflected,
}

/// Correlation peaks of `reference`'s coarse support against the support
/// of `other` as given and of its conjugate reflection.
pub fn orientation_peaks(reference: &ComplexVolume, other: &ComplexVolume) -> (f64, f64) {
    let ref_support = to_complex(&ambiguity_support(reference));
    let direct = to_complex(&ambiguity_support(other));
    let reflected = to_complex(&ambiguity_support(&conj_reflect(other)));

    let direct_peak = peak_magnitude(&cross_correlation(&ref_support, &direct));
    let reflected_peak = peak_magnitude(&cross_correlation(&ref_support, &reflected));
    (direct_peak, reflected_peak)
}

pub fn orientation(reference: &ComplexVolume, other: &ComplexVolume) -> Orientation {
    let (direct, reflected) = orientation_peaks(reference, other);
    debug!(direct, reflected, "Conjugate ambiguity peaks");
    if reflected > direct {
        Orientation::ConjugateReflected
    } else {
        Orientation::Unchanged
    }
}

/// Resolve the conjugate-inversion ambiguity of an image against a reference.
pub fn resolve_image(reference: &ComplexVolume, other: ComplexVolume) -> ComplexVolume {
    match orientation(reference, &other) {
        Orientation::Unchanged => other,
        Orientation::ConjugateReflected => conj_reflect(&other),
    }
}

/// Candidate-level [`resolve_image`]: a reflected candidate gets its image
/// and support reflected; coherence and reciprocal space are dropped since
/// they no longer describe the reflected image.
pub fn resolve(reference: &Candidate, other: Candidate) -> Candidate {
    match orientation(&reference.image, &other.image) {
        Orientation::Unchanged => other,
        Orientation::ConjugateReflected => {
            let support = conj_reflect(&to_complex(&other.support))
                .mapv(|v| if v.re >= 0.5 { 1.0 } else { 0.0 });
            Candidate {
                image: conj_reflect(&other.image),
                support,
                coherence: None,
                error_trace: other.error_trace,
                reciprocal: None,
            }
        }
    }
}
