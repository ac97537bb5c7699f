//! Acoustic surface materials.
//!
//! Every surface carries one absorption and one scattering coefficient per
//! octave band (see [`crate::bands`]).

use crate::bands::Bands;
use crate::error::{HallSonicError, Result};

/// Acoustic properties of a surface.
///
/// - **Absorption**: fraction of incident energy absorbed per band,
///   `0.0 <= a < 1.0`. The reflected fraction is `1 - a`.
/// - **Scattering**: fraction of reflected energy that leaves the surface
///   diffusely rather than specularly, `0.0 <= s <= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub absorption: Bands,
    pub scattering: Bands,
}

impl Surface {
    /// A uniform surface: the same absorption and scattering in every band.
    pub fn uniform(absorption: f32, scattering: f32) -> Self {
        Self {
            absorption: Bands::splat(absorption),
            scattering: Bands::splat(scattering),
        }
    }

    /// Bare concrete - very reflective.
    pub const CONCRETE: Self = Self {
        absorption: Bands([0.01, 0.01, 0.02, 0.02, 0.02, 0.03, 0.03, 0.04]),
        scattering: Bands([0.05; 8]),
    };

    /// Painted brick.
    pub const BRICK: Self = Self {
        absorption: Bands([0.01, 0.02, 0.02, 0.03, 0.03, 0.04, 0.05, 0.07]),
        scattering: Bands([0.1; 8]),
    };

    /// Wood panelling - absorbs low frequencies.
    pub const WOOD: Self = Self {
        absorption: Bands([0.25, 0.18, 0.11, 0.10, 0.07, 0.06, 0.06, 0.07]),
        scattering: Bands([0.1; 8]),
    };

    /// Heavy carpet on concrete - absorbs high frequencies.
    pub const CARPET: Self = Self {
        absorption: Bands([0.02, 0.04, 0.08, 0.24, 0.57, 0.69, 0.71, 0.73]),
        scattering: Bands([0.2; 8]),
    };

    /// Glass pane.
    pub const GLASS: Self = Self {
        absorption: Bands([0.18, 0.12, 0.06, 0.04, 0.03, 0.02, 0.02, 0.02]),
        scattering: Bands([0.05; 8]),
    };

    /// Plaster on lath.
    pub const PLASTER: Self = Self {
        absorption: Bands([0.14, 0.13, 0.12, 0.06, 0.04, 0.04, 0.03, 0.03]),
        scattering: Bands([0.1; 8]),
    };

    /// Per-band reflected-energy fraction, `1 - absorption`.
    pub fn reflectance(&self) -> Bands {
        Bands::ONE - self.absorption
    }

    /// Largest per-band reflectance, used to size the reflection depth.
    pub fn max_reflectance(&self) -> f32 {
        self.reflectance().max_element()
    }

    pub fn validate(&self) -> Result<()> {
        for a in self.absorption.iter() {
            if !(0.0..1.0).contains(&a) {
                return Err(HallSonicError::InvalidMaterial(format!(
                    "absorption {a} outside [0, 1)"
                )));
            }
        }
        for s in self.scattering.iter() {
            if !(0.0..=1.0).contains(&s) {
                return Err(HallSonicError::InvalidMaterial(format!(
                    "scattering {s} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::uniform(0.1, 0.1)
    }
}
