//! Receiver models.
//!
//! An [`Attenuator`] turns an arrival direction into per-band gains: a
//! perfect omni, a first-order polar microphone, or one ear of a binaural
//! pair. One attenuator renders one output channel.

use crate::bands::{Bands, NUM_BANDS};
use crate::math::{Orientation, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrtfChannel {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attenuator {
    /// Unity gain in every direction and band.
    Null,
    /// First-order polar pattern, gain `(1 - shape) + shape·cos(angle)`.
    /// `shape` 0 is omni, 0.5 cardioid, 1 bidirectional.
    Microphone { pointing: Vec3, shape: f32 },
    /// One ear of a binaural pair, with per-band head-shadow gains.
    Hrtf {
        pointing: Vec3,
        up: Vec3,
        channel: HrtfChannel,
    },
}

impl Attenuator {
    pub fn microphone(pointing: Vec3, shape: f32) -> Self {
        Self::Microphone {
            pointing: pointing.normalize(),
            shape,
        }
    }

    /// Per-band gains for a sound arriving from `direction` (unit vector
    /// from the receiver towards the apparent source).
    pub fn band_gains(&self, direction: Vec3) -> Bands {
        match self {
            Self::Null => Bands::ONE,
            Self::Microphone { pointing, shape } => {
                let gain = (1.0 - shape) + shape * pointing.dot(direction);
                Bands::splat(gain)
            }
            Self::Hrtf {
                pointing,
                up,
                channel,
            } => {
                let orientation = Orientation::new(*pointing, *up);
                let (azimuth, elevation) = orientation.azimuth_elevation(direction);
                hrtf_band_gains(azimuth, elevation, *channel)
            }
        }
    }
    /// Per-band gains for an arrival with no usable direction (diffuse
    /// rain): the RMS of the pattern over the sphere.
    pub fn diffuse_field_gains(&self) -> Bands {
        match self {
            Self::Null | Self::Hrtf { .. } => Bands::ONE,
            Self::Microphone { shape, .. } => {
                let rms = ((1.0 - shape).powi(2) + shape.powi(2) / 3.0).sqrt();
                Bands::splat(rms)
            }
        }
    }
}

/// Built-in head-shadow lookup: azimuth/elevation (radians, azimuth
/// positive towards the listener's right) to per-band gains.
///
/// A coarse spherical-head approximation: no interaural difference in the
/// lowest band, rising to a strong contralateral shadow in the highest.
pub fn hrtf_band_gains(azimuth: f32, elevation: f32, channel: HrtfChannel) -> Bands {
    let lateral = azimuth.sin() * elevation.cos();
    let side = match channel {
        HrtfChannel::Right => lateral,
        HrtfChannel::Left => -lateral,
    };
    let mut gains = Bands::ONE;
    for band in 0..NUM_BANDS {
        let shadow = 0.8 * band as f32 / (NUM_BANDS - 1) as f32;
        gains[band] = (1.0 + side * shadow).max(0.05);
    }
    gains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_unity() {
        let gains = Attenuator::Null.band_gains(Vec3::new(0.3, -0.9, 0.1).normalize());
        assert_eq!(gains, Bands::ONE);
    }

    #[test]
    fn test_cardioid_polar_pattern() {
        let cardioid = Attenuator::microphone(Vec3::X, 0.5);
        // on-axis: unity
        assert!((cardioid.band_gains(Vec3::X)[0] - 1.0).abs() < 1e-6);
        // rear: null
        assert!(cardioid.band_gains(-Vec3::X)[0].abs() < 1e-6);
        // side: half
        assert!((cardioid.band_gains(Vec3::Y)[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bidirectional_rear_lobe_is_negative() {
        let figure_eight = Attenuator::microphone(Vec3::X, 1.0);
        assert!((figure_eight.band_gains(-Vec3::X)[0] + 1.0).abs() < 1e-6);
        assert!(figure_eight.band_gains(Vec3::Y)[0].abs() < 1e-6);
    }

    #[test]
    fn test_hrtf_shadow_sides_mirror() {
        // source hard right: right ear louder than left, more so in the top
        // band than the bottom
        let right_ear = hrtf_band_gains(std::f32::consts::FRAC_PI_2, 0.0, HrtfChannel::Right);
        let left_ear = hrtf_band_gains(std::f32::consts::FRAC_PI_2, 0.0, HrtfChannel::Left);
        assert!((right_ear[0] - left_ear[0]).abs() < 1e-6);
        assert!(right_ear[NUM_BANDS - 1] > left_ear[NUM_BANDS - 1]);
        assert!(left_ear[NUM_BANDS - 1] >= 0.05);

        // mirrored azimuth swaps the ears
        let mirrored = hrtf_band_gains(-std::f32::consts::FRAC_PI_2, 0.0, HrtfChannel::Left);
        for b in 0..NUM_BANDS {
            assert!((mirrored[b] - right_ear[b]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hrtf_attenuator_uses_orientation() {
        let facing_x = Attenuator::Hrtf {
            pointing: Vec3::X,
            up: Vec3::Y,
            channel: HrtfChannel::Right,
        };
        // right of an x-facing listener (up +y) is +z
        let from_right = facing_x.band_gains(Vec3::Z);
        let from_left = facing_x.band_gains(-Vec3::Z);
        assert!(from_right[NUM_BANDS - 1] > from_left[NUM_BANDS - 1]);
    }
}
