//! Ray-tracer output records.

use crate::bands::Bands;
use crate::math::Vec3;

/// A single broadband arrival: per-band volume, the position it appears to
/// arrive from, and the total path length in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    pub volume: Bands,
    pub position: Vec3,
    pub distance: f32,
}

impl Impulse {
    pub fn time(&self, speed_of_sound: f32) -> f32 {
        self.distance / speed_of_sound
    }
}

/// Everything the stochastic ray tracer found.
///
/// `diffuse` holds one inner vector per reflection depth; `image_source`
/// holds the validated early specular arrivals. Volumes in `direct` and
/// `image_source` are pressure-like (distance spreading applied at
/// synthesis); volumes in `diffuse` are Monte-Carlo energies.
#[derive(Debug, Clone)]
pub struct Results {
    pub direct: Option<Impulse>,
    pub image_source: Vec<Impulse>,
    pub diffuse: Vec<Vec<Impulse>>,
    pub receiver: Vec3,
}

impl Results {
    /// All impulses in one flat list.
    pub fn all_impulses(&self) -> Vec<Impulse> {
        let mut out = Vec::new();
        out.extend(self.direct);
        out.extend(self.image_source.iter().copied());
        for layer in &self.diffuse {
            out.extend(layer.iter().copied());
        }
        out
    }

    /// Latest arrival time across every impulse, in seconds.
    pub fn max_time(&self, speed_of_sound: f32) -> f32 {
        self.all_impulses()
            .iter()
            .map(|i| i.time(speed_of_sound))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_time_spans_all_collections() {
        let imp = |distance| Impulse {
            volume: Bands::ONE,
            position: Vec3::ZERO,
            distance,
        };
        let results = Results {
            direct: Some(imp(34.0)),
            image_source: vec![imp(68.0)],
            diffuse: vec![vec![imp(10.0)], vec![imp(340.0)]],
            receiver: Vec3::ZERO,
        };
        assert!((results.max_time(340.0) - 1.0).abs() < 1e-6);
        assert_eq!(results.all_impulses().len(), 4);
    }
}
