//! Statistical reverb-time estimates.
//!
//! Sabine and Eyring RT60 predictions from scene area and volume, used to
//! sanity-check simulated decay.

use crate::bands::{Bands, NUM_BANDS};
use crate::scene::geometry::SceneData;

fn triangle_area(verts: &[crate::math::Vec3; 3]) -> f32 {
    0.5 * (verts[1] - verts[0]).cross(verts[2] - verts[0]).length()
}

/// Total surface area and per-band absorption area `sum(S_i * a_i)`.
fn surface_terms(scene: &SceneData) -> (f32, Bands) {
    let mut total_area = 0.0;
    let mut absorption_area = Bands::ZERO;
    for index in 0..scene.triangles.len() {
        let area = triangle_area(&scene.triangle_verts(index));
        total_area += area;
        absorption_area += scene.triangle_surface(index).absorption * area;
    }
    (total_area, absorption_area)
}

/// Sabine RT60 per band: `0.161 * V / (S * a)`.
pub fn sabine_reverb_time(scene: &SceneData, volume: f32) -> Bands {
    let (_, absorption_area) = surface_terms(scene);
    let mut out = Bands::ZERO;
    for band in 0..NUM_BANDS {
        out[band] = 0.161 * volume / absorption_area[band].max(1e-9);
    }
    out
}

/// Eyring RT60 per band: `0.161 * V / (-S * ln(1 - a_mean))`.
pub fn eyring_reverb_time(scene: &SceneData, volume: f32) -> Bands {
    let (total_area, absorption_area) = surface_terms(scene);
    let mut out = Bands::ZERO;
    for band in 0..NUM_BANDS {
        let mean_absorption = (absorption_area[band] / total_area).clamp(0.0, 1.0 - 1e-6);
        let denominator = -total_area * (1.0 - mean_absorption).ln();
        out[band] = 0.161 * volume / denominator.max(1e-9);
    }
    out
}
