//! Stochastic geometric-acoustics ray tracer.
//!
//! Forward rays leave the source with `1/rays` energy per band. Each depth
//! layer is one data-parallel dispatch: every live ray advances one specular
//! bounce, splits off a diffuse-rain contribution towards the receiver, and
//! records its specular chain for image-source validation.

pub mod diffuse;
pub mod image_source;
pub mod reflector;
pub mod results;

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::bands::Bands;
use crate::compute::ComputeContext;
use crate::environment::Environment;
use crate::error::{HallSonicError, Result};
use crate::math::Vec3;
use crate::scene::VoxelGrid;

use diffuse::DiffuseFinder;
use reflector::{RayPath, Reflector};
pub use results::{Impulse, Results};

/// Hard cap on the reflection depth chosen by [`optimum_reflection_depth`].
pub const MAX_REFLECTION_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct RaytracerDesc {
    /// Number of stochastic rays to emit.
    pub rays: usize,
    /// Reflection depth; `None` derives it from the scene's strongest
    /// reflectance via [`optimum_reflection_depth`].
    pub max_depth: Option<usize>,
    /// Specular chain length considered for image-source validation.
    pub max_image_source_depth: usize,
    /// Rays whose specular energy decays below this level (dB relative to
    /// their emitted energy) are terminated early.
    pub energy_threshold_db: f32,
    /// Seed for the emitted ray directions. Identical seeds give
    /// bitwise-identical results.
    pub seed: u64,
}

impl Default for RaytracerDesc {
    fn default() -> Self {
        Self {
            rays: 10_000,
            max_depth: None,
            max_image_source_depth: 5,
            energy_threshold_db: -60.0,
            seed: 0,
        }
    }
}

/// Uniformly distributed unit directions from a seeded generator.
pub fn random_directions(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let z: f32 = rng.gen_range(-1.0..1.0);
            let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            let r = (1.0 - z * z).sqrt();
            Vec3::new(r * theta.cos(), r * theta.sin(), z)
        })
        .collect()
}

/// Number of reflections for the strongest surface to decay by
/// `decay_db`, clamped to `1..=MAX_REFLECTION_DEPTH`.
pub fn optimum_reflection_depth(decay_db: f32, max_reflectance: f32) -> usize {
    let amplitude = 10f32.powf(-decay_db.abs() / 20.0);
    if max_reflectance >= 1.0 - 1e-6 {
        return MAX_REFLECTION_DEPTH;
    }
    let depth = (amplitude.ln() / max_reflectance.ln()).ceil();
    (depth as usize).clamp(1, MAX_REFLECTION_DEPTH)
}

/// Runs the full ray-tracing pass with directions drawn from the desc's
/// seed. See [`run_with_directions`].
#[allow(clippy::too_many_arguments)]
pub fn run<C: ComputeContext>(
    ctx: &C,
    grid: &VoxelGrid,
    environment: &Environment,
    source: Vec3,
    receiver: Vec3,
    desc: &RaytracerDesc,
    keep_going: &AtomicBool,
    progress: impl FnMut(f64),
    visual: Option<&dyn Fn(&[Vec3], Vec3)>,
) -> Result<Option<Results>> {
    let directions = random_directions(desc.rays, desc.seed);
    run_with_directions(
        ctx,
        grid,
        environment,
        source,
        receiver,
        &directions,
        desc,
        keep_going,
        progress,
        visual,
    )
}

/// Runs the full ray-tracing pass with caller-supplied emission directions.
///
/// Returns `Ok(None)` when `keep_going` is cleared; `progress` receives a
/// fraction in `[0, 1]` once per depth layer. The optional `visual` hook
/// receives each layer's reflection positions together with the source.
#[allow(clippy::too_many_arguments)]
pub fn run_with_directions<C: ComputeContext>(
    ctx: &C,
    grid: &VoxelGrid,
    environment: &Environment,
    source: Vec3,
    receiver: Vec3,
    directions: &[Vec3],
    desc: &RaytracerDesc,
    keep_going: &AtomicBool,
    mut progress: impl FnMut(f64),
    visual: Option<&dyn Fn(&[Vec3], Vec3)>,
) -> Result<Option<Results>> {
    if directions.is_empty() {
        return Err(HallSonicError::InvalidConfiguration(
            "ray count must be nonzero".into(),
        ));
    }

    let max_depth = desc.max_depth.unwrap_or_else(|| {
        let max_reflectance = grid
            .scene()
            .surfaces
            .iter()
            .map(|s| s.max_reflectance())
            .fold(0.0, f32::max);
        optimum_reflection_depth(60.0, max_reflectance)
    });

    let rays = directions.len();
    log::info!(
        "raytracer: {rays} rays, depth {max_depth}, image-source depth {}",
        desc.max_image_source_depth
    );

    let initial_volume = Bands::splat(1.0 / rays as f32);
    let threshold = 10f32.powf(desc.energy_threshold_db.abs() * -0.1) / rays as f32;

    let mut paths: Vec<RayPath> = directions
        .iter()
        .map(|&direction| RayPath::emit(source, direction, initial_volume))
        .collect();

    let reflector = Reflector::new(threshold, desc.max_image_source_depth);
    let mut diffuse_finder = DiffuseFinder::new(receiver);

    for layer in 0..max_depth {
        if !keep_going.load(Ordering::Relaxed) {
            return Ok(None);
        }
        reflector.run_layer(ctx, grid, environment, &mut paths)?;

        for (index, path) in paths.iter().enumerate() {
            if let Some(last) = &path.last {
                if !last.specular.is_finite() || !last.diffuse.is_finite() {
                    return Err(HallSonicError::NumericalInstability { index });
                }
            }
        }

        diffuse_finder.push_layer(ctx, grid, environment, &paths)?;

        if let Some(visual) = visual {
            let positions: Vec<Vec3> = paths
                .iter()
                .filter_map(|p| p.last.as_ref().map(|r| r.position))
                .collect();
            visual(&positions, source);
        }

        progress((layer + 1) as f64 / max_depth as f64);

        if paths.iter().all(|p| !p.alive) {
            break;
        }
    }

    let direct = if grid.occluded(source, receiver) {
        None
    } else {
        let distance = source.distance(receiver);
        Some(Impulse {
            volume: environment.air_scale(distance),
            position: source,
            distance,
        })
    };

    let chains = image_source::collect_chains(&paths);
    let image_source =
        image_source::validate_chains(grid, environment, source, receiver, &chains);

    Ok(Some(Results {
        direct,
        image_source,
        diffuse: diffuse_finder.into_layers(),
        receiver,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuContext;
    use crate::scene::geometry::{Aabb, scene_from_box};
    use crate::scene::material::Surface;

    fn run_in_box(
        aabb: Aabb,
        surface: Surface,
        source: Vec3,
        receiver: Vec3,
        desc: &RaytracerDesc,
    ) -> Results {
        let grid = VoxelGrid::build(scene_from_box(&aabb, surface));
        let keep_going = AtomicBool::new(true);
        run(
            &CpuContext::new(),
            &grid,
            &Environment::default(),
            source,
            receiver,
            desc,
            &keep_going,
            |_| {},
            None,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_direct_sound_distance() {
        let results = run_in_box(
            Aabb::new(Vec3::ZERO, Vec3::new(5.0, 4.0, 4.0)),
            Surface::uniform(0.3, 0.1),
            Vec3::new(1.0, 2.0, 2.0),
            Vec3::new(4.0, 2.0, 2.0),
            &RaytracerDesc {
                rays: 1000,
                max_depth: Some(3),
                ..RaytracerDesc::default()
            },
        );
        let direct = results.direct.unwrap();
        assert!((direct.distance - 3.0).abs() < 1e-4);
        assert!((direct.time(340.0) - 3.0 / 340.0).abs() < 1e-6);
    }

    #[test]
    fn test_determinism_with_fixed_seed() {
        let desc = RaytracerDesc {
            rays: 2000,
            max_depth: Some(4),
            seed: 17,
            ..RaytracerDesc::default()
        };
        let scene = || {
            run_in_box(
                Aabb::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 6.0)),
                Surface::uniform(0.2, 0.3),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(2.0, 1.0, 5.0),
                &desc,
            )
        };
        let a = scene();
        let b = scene();
        assert_eq!(a.image_source.len(), b.image_source.len());
        assert_eq!(a.diffuse.len(), b.diffuse.len());
        for (la, lb) in a.diffuse.iter().zip(&b.diffuse) {
            assert_eq!(la.len(), lb.len());
            for (ia, ib) in la.iter().zip(lb) {
                assert_eq!(ia.volume, ib.volume);
                assert_eq!(ia.distance, ib.distance);
            }
        }
    }

    #[test]
    fn test_energy_not_amplified() {
        let results = run_in_box(
            Aabb::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 6.0)),
            Surface::uniform(0.3, 0.4),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 1.0, 5.0),
            &RaytracerDesc {
                rays: 5000,
                max_depth: Some(8),
                ..RaytracerDesc::default()
            },
        );
        // per-band diffuse energy collected at the receiver stays below the
        // unit energy emitted
        let mut total = Bands::ZERO;
        for layer in &results.diffuse {
            for impulse in layer {
                total += impulse.volume;
            }
        }
        for band in total.iter() {
            assert!(band < 1.0, "captured energy {band}");
        }
    }

    #[test]
    fn test_shoebox_image_sources_match_exact() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 6.0));
        let surface = Surface::uniform(0.1, 0.0);
        let source = Vec3::new(1.0, 1.0, 1.0);
        let receiver = Vec3::new(2.0, 1.0, 5.0);
        let order = 2;

        let results = run_in_box(
            aabb,
            surface,
            source,
            receiver,
            &RaytracerDesc {
                rays: 20_000,
                max_depth: Some(order),
                max_image_source_depth: order,
                seed: 3,
                ..RaytracerDesc::default()
            },
        );

        let exact = image_source::exact_image_sources(&aabb, source, receiver, &surface, order);
        assert!(!exact.is_empty());

        let matched = exact
            .iter()
            .filter(|e| {
                results.image_source.iter().any(|s| {
                    (s.distance - e.distance).abs() <= 0.01
                        && (s.volume - e.volume)
                            .map(f32::abs)
                            .max_element()
                            <= 1e-4
                })
            })
            .count();
        let fraction = matched as f64 / exact.len() as f64;
        assert!(fraction >= 0.9, "only {matched}/{} exact images matched", exact.len());
    }

    #[test]
    fn test_cancellation_returns_none() {
        let grid = VoxelGrid::build(scene_from_box(
            &Aabb::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 6.0)),
            Surface::uniform(0.2, 0.1),
        ));
        let keep_going = AtomicBool::new(false);
        let out = run(
            &CpuContext::new(),
            &grid,
            &Environment::default(),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 1.0, 5.0),
            &RaytracerDesc::default(),
            &keep_going,
            |_| {},
            None,
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_optimum_reflection_depth() {
        // -60 dB at reflectance 0.5 takes ten bounces
        assert_eq!(optimum_reflection_depth(60.0, 0.5), 10);
        // fully reflective scenes hit the cap
        assert_eq!(optimum_reflection_depth(60.0, 1.0), MAX_REFLECTION_DEPTH);
        assert!(optimum_reflection_depth(60.0, 0.99) <= MAX_REFLECTION_DEPTH);
    }
}
