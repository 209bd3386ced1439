use std::fmt;
use std::str::FromStr;

use ndarray::Zip;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compute::{fftn, fftshift, ifftn, ifftshift};
use crate::consts::EPSILON;
use crate::error::BraggError;
use crate::volume::ComplexVolume;

/// Rule used to combine the best candidate ("alpha") with another ranked
/// member ("beta") and, for the three-way modes, member 1 ("gamma").
///
/// Suffix `_pa` keeps alpha's phase; `_recip` combines in reciprocal space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreedMode {
    #[serde(rename = "sqrt_ab")]
    SqrtAB,
    #[serde(rename = "max_all")]
    MaxAll,
    #[serde(rename = "dhalf", alias = "Dhalf")]
    DHalf,
    #[serde(rename = "dhalf-best", alias = "Dhalf-best")]
    DHalfBest,
    #[serde(rename = "dsqrt")]
    DSqrt,
    #[serde(rename = "pixel_switch")]
    PixelSwitch,
    #[serde(rename = "b_pa")]
    BPa,
    #[serde(rename = "2ab_a_b")]
    HarmonicAB,
    #[serde(rename = "2a-b_pa")]
    TwoAMinusBPa,
    #[serde(rename = "sqrt_ab_pa")]
    SqrtABPa,
    #[serde(rename = "sqrt_ab_pa_recip")]
    SqrtABPaRecip,
    #[serde(rename = "sqrt_ab_recip")]
    SqrtABRecip,
    #[serde(rename = "max_ab")]
    MaxAB,
    #[serde(rename = "max_ab_pa")]
    MaxABPa,
    #[serde(rename = "min_ab_pa")]
    MinABPa,
    #[serde(rename = "avg_ab")]
    AvgAB,
    #[serde(rename = "avg_ab_pa")]
    AvgABPa,
    #[serde(rename = "sqrt_abg")]
    SqrtABG,
    #[serde(rename = "sqrt_abg_pa")]
    SqrtABGPa,
    #[serde(rename = "max_abg")]
    MaxABG,
    #[serde(rename = "max_abg_pa")]
    MaxABGPa,
    #[serde(rename = "avg_abg")]
    AvgABG,
    #[serde(rename = "avg_abg_pa")]
    AvgABGPa,
    #[serde(rename = "avg_sqrt")]
    AvgSqrt,
    /// Keep the population and its supports unchanged.
    #[default]
    #[serde(rename = "none")]
    None,
}

impl BreedMode {
    pub const ALL: [BreedMode; 25] = [
        BreedMode::SqrtAB,
        BreedMode::MaxAll,
        BreedMode::DHalf,
        BreedMode::DHalfBest,
        BreedMode::DSqrt,
        BreedMode::PixelSwitch,
        BreedMode::BPa,
        BreedMode::HarmonicAB,
        BreedMode::TwoAMinusBPa,
        BreedMode::SqrtABPa,
        BreedMode::SqrtABPaRecip,
        BreedMode::SqrtABRecip,
        BreedMode::MaxAB,
        BreedMode::MaxABPa,
        BreedMode::MinABPa,
        BreedMode::AvgAB,
        BreedMode::AvgABPa,
        BreedMode::SqrtABG,
        BreedMode::SqrtABGPa,
        BreedMode::MaxABG,
        BreedMode::MaxABGPa,
        BreedMode::AvgABG,
        BreedMode::AvgABGPa,
        BreedMode::AvgSqrt,
        BreedMode::None,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BreedMode::SqrtAB => "sqrt_ab",
            BreedMode::MaxAll => "max_all",
            BreedMode::DHalf => "dhalf",
            BreedMode::DHalfBest => "dhalf-best",
            BreedMode::DSqrt => "dsqrt",
            BreedMode::PixelSwitch => "pixel_switch",
            BreedMode::BPa => "b_pa",
            BreedMode::HarmonicAB => "2ab_a_b",
            BreedMode::TwoAMinusBPa => "2a-b_pa",
            BreedMode::SqrtABPa => "sqrt_ab_pa",
            BreedMode::SqrtABPaRecip => "sqrt_ab_pa_recip",
            BreedMode::SqrtABRecip => "sqrt_ab_recip",
            BreedMode::MaxAB => "max_ab",
            BreedMode::MaxABPa => "max_ab_pa",
            BreedMode::MinABPa => "min_ab_pa",
            BreedMode::AvgAB => "avg_ab",
            BreedMode::AvgABPa => "avg_ab_pa",
            BreedMode::SqrtABG => "sqrt_abg",
            BreedMode::SqrtABGPa => "sqrt_abg_pa",
            BreedMode::MaxABG => "max_abg",
            BreedMode::MaxABGPa => "max_abg_pa",
            BreedMode::AvgABG => "avg_abg",
            BreedMode::AvgABGPa => "avg_abg_pa",
            BreedMode::AvgSqrt => "avg_sqrt",
            BreedMode::None => "none",
        }
    }

    /// Modes that also draw on population member 1.
    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            BreedMode::SqrtABG
                | BreedMode::SqrtABGPa
                | BreedMode::MaxABG
                | BreedMode::MaxABGPa
                | BreedMode::AvgABG
                | BreedMode::AvgABGPa
                | BreedMode::AvgSqrt
        )
    }
}

impl fmt::Display for BreedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BreedMode {
    type Err = BraggError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        BreedMode::ALL
            .iter()
            .copied()
            .find(|m| m.name() == lower)
            .ok_or_else(|| BraggError::InvalidConfig(format!("unknown breed mode '{s}'")))
    }
}

/// Inputs of one combination step. `alpha` and `beta` (and `gamma`) are
/// aligned and phase-referenced; `members` are the raw ranked survivors.
pub(crate) struct Parents<'a> {
    pub alpha: &'a ComplexVolume,
    pub beta: &'a ComplexVolume,
    pub gamma: &'a ComplexVolume,
    pub members: &'a [ComplexVolume],
    pub index: usize,
}

fn polar(amp: f64, phase: f64) -> Complex64 {
    Complex64::cis(phase) * amp
}

fn to_reciprocal(x: &ComplexVolume) -> ComplexVolume {
    fftshift(&fftn(&fftshift(x)))
}

fn from_reciprocal(x: &ComplexVolume) -> ComplexVolume {
    ifftshift(&ifftn(&ifftshift(x)))
}

/// Apply `mode` to one (alpha, beta[, gamma]) triple.
pub(crate) fn combine(mode: BreedMode, p: &Parents<'_>, rng: &mut StdRng) -> ComplexVolume {
    let ab = Zip::from(p.alpha).and(p.beta);
    let abg = Zip::from(p.alpha).and(p.beta).and(p.gamma);

    match mode {
        BreedMode::None => p.beta.clone(),
        BreedMode::SqrtAB => ab.map_collect(|a, b| {
            polar((a.norm() * b.norm()).sqrt(), 0.5 * (a.arg() + b.arg()))
        }),
        BreedMode::MaxAll => {
            let mut amp = p.beta.mapv(|_| 0.0f64);
            for member in p.members {
                Zip::from(&mut amp)
                    .and(member)
                    .for_each(|m, v| *m = m.max(v.norm()));
            }
            Zip::from(&amp)
                .and(p.beta)
                .map_collect(|&m, b| polar(m, b.arg()))
        }
        BreedMode::DHalf | BreedMode::DHalfBest => {
            let nhalf = ((p.members.len() as f64) / 2.0).round_ties_even() as usize;
            let current = &p.members[p.index];
            let mut delta = current.mapv(|v| v * nhalf as f64);
            for member in &p.members[..nhalf] {
                delta -= member;
            }
            p.beta + &delta
        }
        BreedMode::DSqrt => p.beta.mapv(|b| polar(b.norm().sqrt(), b.arg())),
        BreedMode::PixelSwitch => ab.map_collect(|&a, &b| if rng.gen::<f64>() > 0.5 { b } else { a }),
        BreedMode::BPa => ab.map_collect(|a, b| polar(b.norm(), a.arg())),
        BreedMode::HarmonicAB => ab.map_collect(|&a, &b| {
            let sum = a + b;
            if sum.norm() < EPSILON {
                Complex64::new(0.0, 0.0)
            } else {
                2.0 * a * b / sum
            }
        }),
        BreedMode::TwoAMinusBPa => {
            ab.map_collect(|a, b| polar(2.0 * a.norm() - b.norm(), a.arg()))
        }
        BreedMode::SqrtABPa => ab.map_collect(|a, b| polar((a.norm() * b.norm()).sqrt(), a.arg())),
        BreedMode::SqrtABPaRecip | BreedMode::SqrtABRecip => {
            let ra = to_reciprocal(p.alpha);
            let rb = to_reciprocal(p.beta);
            let keep_alpha_phase = mode == BreedMode::SqrtABPaRecip;
            let mixed = Zip::from(&ra).and(&rb).map_collect(|a, b| {
                let phase = if keep_alpha_phase {
                    a.arg()
                } else {
                    0.5 * (a.arg() + b.arg())
                };
                polar((a.norm() * b.norm()).sqrt(), phase)
            });
            from_reciprocal(&mixed)
        }
        BreedMode::MaxAB => ab.map_collect(|a, b| {
            polar(a.norm().max(b.norm()), 0.5 * (a.arg() + b.arg()))
        }),
        BreedMode::MaxABPa => ab.map_collect(|a, b| polar(a.norm().max(b.norm()), a.arg())),
        BreedMode::MinABPa => ab.map_collect(|a, b| polar(a.norm().min(b.norm()), a.arg())),
        BreedMode::AvgAB => ab.map_collect(|&a, &b| 0.5 * (a + b)),
        BreedMode::AvgABPa => ab.map_collect(|a, b| polar(0.5 * (a.norm() + b.norm()), a.arg())),
        BreedMode::SqrtABG => abg.map_collect(|a, b, g| {
            polar(
                (a.norm() * b.norm() * g.norm()).cbrt(),
                (a.arg() + b.arg() + g.arg()) / 3.0,
            )
        }),
        BreedMode::SqrtABGPa => abg.map_collect(|a, b, g| {
            polar((a.norm() * b.norm() * g.norm()).cbrt(), a.arg())
        }),
        BreedMode::MaxABG => abg.map_collect(|a, b, g| {
            polar(
                a.norm().max(b.norm()).max(g.norm()),
                (a.arg() + b.arg() + g.arg()) / 3.0,
            )
        }),
        BreedMode::MaxABGPa => abg.map_collect(|a, b, g| {
            polar(a.norm().max(b.norm()).max(g.norm()), a.arg())
        }),
        BreedMode::AvgABG => abg.map_collect(|&a, &b, &g| (a + b + g) / 3.0),
        BreedMode::AvgABGPa => abg.map_collect(|a, b, g| {
            polar((a.norm() + b.norm() + g.norm()) / 3.0, a.arg())
        }),
        BreedMode::AvgSqrt => abg.map_collect(|a, b, g| {
            let mean = (b.norm().cbrt() + a.norm().cbrt() + g.norm().cbrt()) / 3.0;
            polar(mean.powi(3), b.arg())
        }),
    }
}
