//! Diffuse-rain energy capture.
//!
//! At every bounce a shadow ray runs from the reflection point to the
//! receiver; unoccluded bounces deposit their diffuse-branch energy,
//! weighted by the Lambertian term, as an impulse at the receiver.

use crate::compute::ComputeContext;
use crate::environment::Environment;
use crate::error::{HallSonicError, Result};
use crate::math::Vec3;
use crate::raytracer::reflector::RayPath;
use crate::raytracer::results::Impulse;
use crate::scene::VoxelGrid;

pub struct DiffuseFinder {
    receiver: Vec3,
    /// One inner vector per reflection depth.
    layers: Vec<Vec<Impulse>>,
}

impl DiffuseFinder {
    pub fn new(receiver: Vec3) -> Self {
        Self {
            receiver,
            layers: Vec::new(),
        }
    }

    /// Captures diffuse contributions for the bounces recorded by the most
    /// recent reflection layer.
    pub fn push_layer<C: ComputeContext>(
        &mut self,
        ctx: &C,
        grid: &VoxelGrid,
        environment: &Environment,
        paths: &[RayPath],
    ) -> Result<()> {
        let receiver = self.receiver;
        let mut captured: Vec<Option<Impulse>> = vec![None; paths.len()];
        ctx.dispatch(&mut captured, |i| {
            let reflection = paths[i].last.as_ref()?;
            let to_receiver = receiver - reflection.position;
            let extra = to_receiver.length();
            if extra < 1e-6 {
                return None;
            }
            let lambert = reflection.normal.dot(to_receiver / extra).max(0.0);
            if lambert == 0.0 {
                return None;
            }
            if grid.occluded(reflection.position, receiver) {
                return None;
            }
            Some(Impulse {
                volume: reflection.diffuse * environment.air_scale(extra) * lambert,
                position: receiver,
                distance: reflection.distance + extra,
            })
        })?;

        for (index, impulse) in captured.iter().enumerate() {
            if let Some(impulse) = impulse {
                if !impulse.volume.is_finite() || !impulse.distance.is_finite() {
                    return Err(HallSonicError::NumericalInstability { index });
                }
            }
        }

        self.layers.push(captured.into_iter().flatten().collect());
        Ok(())
    }

    pub fn into_layers(self) -> Vec<Vec<Impulse>> {
        self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::Bands;
    use crate::compute::CpuContext;
    use crate::raytracer::reflector::Reflector;
    use crate::scene::geometry::{Aabb, scene_from_box};
    use crate::scene::material::Surface;

    #[test]
    fn test_unoccluded_bounce_is_captured() {
        let scene = scene_from_box(
            &Aabb::new(Vec3::ZERO, Vec3::splat(2.0)),
            Surface::uniform(0.1, 0.5),
        );
        let grid = VoxelGrid::build(scene);
        let env = Environment::default();
        let ctx = CpuContext::new();

        let source = Vec3::splat(1.0);
        let receiver = Vec3::new(1.0, 1.5, 1.0);
        let mut paths = vec![RayPath::emit(source, Vec3::X, Bands::ONE)];
        Reflector::new(0.0, 4)
            .run_layer(&ctx, &grid, &env, &mut paths)
            .unwrap();

        let mut finder = DiffuseFinder::new(receiver);
        finder.push_layer(&ctx, &grid, &env, &paths).unwrap();

        let layers = finder.into_layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), 1);
        let impulse = &layers[0][0];
        // bounce at (2,1,1), receiver 1.118m away
        let extra = (receiver - Vec3::new(2.0, 1.0, 1.0)).length();
        assert!((impulse.distance - (1.0 + extra)).abs() < 1e-3);
        assert_eq!(impulse.position, receiver);
        assert!(impulse.volume[0] > 0.0);
        // lambert term keeps the capture below the full diffuse split
        assert!(impulse.volume[0] < 0.9 * 0.5);
    }

    #[test]
    fn test_dead_rays_capture_nothing() {
        let scene = scene_from_box(
            &Aabb::new(Vec3::ZERO, Vec3::splat(2.0)),
            Surface::uniform(0.1, 0.5),
        );
        let grid = VoxelGrid::build(scene);
        let env = Environment::default();
        let ctx = CpuContext::new();

        let mut path = RayPath::emit(Vec3::splat(1.0), Vec3::X, Bands::ONE);
        path.alive = false;
        let paths = vec![path];

        let mut finder = DiffuseFinder::new(Vec3::splat(1.0));
        finder.push_layer(&ctx, &grid, &env, &paths).unwrap();
        assert!(finder.into_layers()[0].is_empty());
    }

    #[test]
    fn test_nan_volume_is_reported() {
        let scene = scene_from_box(
            &Aabb::new(Vec3::ZERO, Vec3::splat(2.0)),
            Surface::uniform(0.1, 0.5),
        );
        let grid = VoxelGrid::build(scene);
        let env = Environment::default();
        let ctx = CpuContext::new();

        let mut paths = vec![RayPath::emit(Vec3::splat(1.0), Vec3::X, Bands::ONE)];
        Reflector::new(0.0, 4)
            .run_layer(&ctx, &grid, &env, &mut paths)
            .unwrap();
        if let Some(last) = paths[0].last.as_mut() {
            last.diffuse[0] = f32::NAN;
        }

        let mut finder = DiffuseFinder::new(Vec3::new(1.0, 1.5, 1.0));
        let err = finder.push_layer(&ctx, &grid, &env, &paths).unwrap_err();
        assert!(matches!(
            err,
            HallSonicError::NumericalInstability { index: 0 }
        ));
    }
}
