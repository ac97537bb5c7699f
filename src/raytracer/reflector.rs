//! Specular reflection layers.
//!
//! Every ray advances one bounce per dispatch. A ray keeps its running
//! per-band specular volume and path length; each bounce records a
//! [`Reflection`] carrying both the continuing specular branch and the
//! diffuse branch split off at that surface.

use crate::bands::Bands;
use crate::compute::ComputeContext;
use crate::environment::Environment;
use crate::error::Result;
use crate::math::Vec3;
use crate::scene::VoxelGrid;
use crate::scene::geometry::{Ray, reflect};

/// One recorded bounce.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub position: Vec3,
    pub direction: Vec3,
    pub normal: Vec3,
    pub triangle: usize,
    /// Path length from the source up to and including this bounce.
    pub distance: f32,
    /// Specular-branch volume after this bounce.
    pub specular: Bands,
    /// Diffuse-branch volume split off at this bounce.
    pub diffuse: Bands,
}

/// Per-ray marching state.
#[derive(Debug, Clone)]
pub struct RayPath {
    pub ray: Ray,
    pub volume: Bands,
    pub distance: f32,
    pub alive: bool,
    /// Bounce produced by the most recent layer, if the ray was alive.
    pub last: Option<Reflection>,
    /// Triangle indices of the specular chain so far, capped at the
    /// image-source depth.
    pub chain: Vec<u32>,
}

impl RayPath {
    pub fn emit(source: Vec3, direction: Vec3, initial_volume: Bands) -> Self {
        Self {
            ray: Ray::new(source, direction),
            volume: initial_volume,
            distance: 0.0,
            alive: true,
            last: None,
            chain: Vec::new(),
        }
    }
}

pub struct Reflector {
    energy_threshold: f32,
    chain_depth: usize,
}

impl Reflector {
    pub fn new(energy_threshold: f32, chain_depth: usize) -> Self {
        Self {
            energy_threshold,
            chain_depth,
        }
    }

    /// Advances every live ray one bounce.
    pub fn run_layer<C: ComputeContext>(
        &self,
        ctx: &C,
        grid: &VoxelGrid,
        environment: &Environment,
        paths: &mut [RayPath],
    ) -> Result<()> {
        let threshold = self.energy_threshold;
        let chain_depth = self.chain_depth;
        ctx.dispatch_mut(paths, |_, path| {
            if !path.alive {
                path.last = None;
                return;
            }
            let Some(hit) = grid.closest_intersection(&path.ray) else {
                // escaped the scene
                path.alive = false;
                path.last = None;
                return;
            };

            let surface = grid.scene().triangle_surface(hit.triangle);
            let reflectance = surface.reflectance();
            let scattering = surface.scattering;

            let position = path.ray.at(hit.distance);
            let incoming = path.volume * environment.air_scale(hit.distance);
            let specular = incoming * reflectance * (Bands::ONE - scattering);
            let diffuse = incoming * reflectance * scattering;

            let direction = reflect(path.ray.direction, hit.normal);
            path.distance += hit.distance;
            path.volume = specular;
            path.ray = Ray::new(position, direction);
            if path.chain.len() < chain_depth {
                path.chain.push(hit.triangle as u32);
            }
            path.last = Some(Reflection {
                position,
                direction,
                normal: hit.normal,
                triangle: hit.triangle,
                distance: path.distance,
                specular,
                diffuse,
            });
            if path.volume.max_element() < threshold {
                path.alive = false;
            }
        })
    }
}
