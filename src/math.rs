//! Math types for HallSonic

pub use glam::{IVec3, Quat, Vec3};

/// Orientation of a directional receiver: where it points and which way is up.
///
/// `pointing` and `up` are kept normalised; `up` is re-orthogonalised against
/// `pointing` on construction so the pair always forms a valid frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub pointing: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(pointing: Vec3, up: Vec3) -> Self {
        let pointing = pointing.normalize();
        let up = (up - pointing * up.dot(pointing)).normalize();
        Self { pointing, up }
    }

    pub fn facing(pointing: Vec3) -> Self {
        let pointing = pointing.normalize();
        let up = if pointing.y.abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Self::new(pointing, up)
    }

    pub fn right(&self) -> Vec3 {
        self.pointing.cross(self.up)
    }

    /// Azimuth/elevation of a world-space direction relative to this frame.
    ///
    /// Azimuth is measured in the pointing/right plane, positive towards
    /// `right()`; elevation positive towards `up`. Both in radians.
    pub fn azimuth_elevation(&self, direction: Vec3) -> (f32, f32) {
        let d = direction.normalize();
        let x = d.dot(self.pointing);
        let y = d.dot(self.right());
        let z = d.dot(self.up);
        let azimuth = y.atan2(x);
        let elevation = z.clamp(-1.0, 1.0).asin();
        (azimuth, elevation)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            pointing: -Vec3::Z,
            up: Vec3::Y,
        }
    }
}

/// Mirrors `point` across the axis-aligned plane `axis = value`.
pub fn mirror_on_axis(point: Vec3, axis: usize, value: f32) -> Vec3 {
    let mut out = point;
    out[axis] = 2.0 * value - out[axis];
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_frame_is_orthonormal() {
        let o = Orientation::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Y);
        assert!((o.pointing.length() - 1.0).abs() < 1e-6);
        assert!((o.up.length() - 1.0).abs() < 1e-6);
        assert!(o.pointing.dot(o.up).abs() < 1e-6);
    }

    #[test]
    fn test_azimuth_elevation_cardinal_directions() {
        let o = Orientation::new(-Vec3::Z, Vec3::Y);
        let (az, el) = o.azimuth_elevation(-Vec3::Z);
        assert!(az.abs() < 1e-6);
        assert!(el.abs() < 1e-6);

        let (az, _) = o.azimuth_elevation(o.right());
        assert!((az - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        let (_, el) = o.azimuth_elevation(Vec3::Y);
        assert!((el - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_mirror_on_axis() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(mirror_on_axis(p, 0, 0.0), Vec3::new(-1.0, 2.0, 3.0));
        assert_eq!(mirror_on_axis(p, 2, 4.0), Vec3::new(1.0, 2.0, 5.0));
    }
}
