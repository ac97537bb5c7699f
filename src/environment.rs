//! Physical constants of the simulated medium.

use crate::bands::Bands;

/// Default speed of sound in air, m/s.
pub const DEFAULT_SPEED_OF_SOUND: f32 = 340.0;

/// Default specific acoustic impedance of air, Pa·s/m.
pub const DEFAULT_ACOUSTIC_IMPEDANCE: f32 = 400.0;

/// Properties of the air the simulation runs in.
///
/// `air_attenuation` is a per-band exponential coefficient in nepers per
/// metre: energy travelling a distance `d` is scaled by
/// `exp(-air_attenuation * d)` in each band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub speed_of_sound: f32,
    pub acoustic_impedance: f32,
    pub air_attenuation: Bands,
}

impl Environment {
    /// Ambient density of the medium, kg/m³, derived from `Z = rho * c`.
    pub fn ambient_density(&self) -> f32 {
        self.acoustic_impedance / self.speed_of_sound
    }

    /// Per-band energy scale for a path of length `distance` metres.
    pub fn air_scale(&self, distance: f32) -> Bands {
        self.air_attenuation.map(|a| (-a * distance).exp())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
            acoustic_impedance: DEFAULT_ACOUSTIC_IMPEDANCE,
            air_attenuation: Bands::ZERO,
        }
    }
}

/// Converts an intensity-like sample to a pressure-like sample,
/// `p = sign(i) * sqrt(|i| * z)`.
pub fn intensity_to_pressure(intensity: f32, acoustic_impedance: f32) -> f32 {
    intensity.signum() * (intensity.abs() * acoustic_impedance).sqrt()
}

/// Inverse of [`intensity_to_pressure`].
pub fn pressure_to_intensity(pressure: f32, acoustic_impedance: f32) -> f32 {
    pressure.signum() * pressure * pressure / acoustic_impedance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let env = Environment::default();
        assert_eq!(env.speed_of_sound, 340.0);
        assert_eq!(env.acoustic_impedance, 400.0);
        assert!((env.ambient_density() - 400.0 / 340.0).abs() < 1e-6);
    }

    #[test]
    fn test_pressure_intensity_round_trip() {
        for i in [-2.0f32, -0.5, 0.0, 0.25, 3.0] {
            let p = intensity_to_pressure(i, 400.0);
            let back = pressure_to_intensity(p, 400.0);
            assert!((back - i).abs() < 1e-5, "{i} -> {p} -> {back}");
        }
    }

    #[test]
    fn test_air_scale_is_unity_without_attenuation() {
        let env = Environment::default();
        assert_eq!(env.air_scale(10.0), Bands::ONE);

        let lossy = Environment {
            air_attenuation: Bands::splat(0.1),
            ..Environment::default()
        };
        let s = lossy.air_scale(10.0);
        assert!((s[0] - (-1.0f32).exp()).abs() < 1e-6);
    }
}
