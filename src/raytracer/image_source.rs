//! Image-source discovery and validation.
//!
//! Stochastic rays only *discover* candidate specular chains (sequences of
//! triangle indices). Each unique chain is then validated geometrically by
//! progressive mirroring: the chain is accepted only when every reflection
//! point lands on its triangle and every path segment is unobstructed.
//! Accepted chains get deterministic volumes, so they agree with the exact
//! shoebox enumerator used for testing.

use std::collections::BTreeSet;

use crate::bands::Bands;
use crate::environment::Environment;
use crate::math::Vec3;
use crate::raytracer::reflector::RayPath;
use crate::raytracer::results::Impulse;
use crate::scene::VoxelGrid;
use crate::scene::geometry::{Aabb, Ray, intersect_triangle, mirror_in_plane};
use crate::scene::material::Surface;

/// All unique chain prefixes discovered by the traced rays, in a
/// deterministic order.
pub fn collect_chains(paths: &[RayPath]) -> BTreeSet<Vec<u32>> {
    let mut chains = BTreeSet::new();
    for path in paths {
        for len in 1..=path.chain.len() {
            chains.insert(path.chain[..len].to_vec());
        }
    }
    chains
}

/// Validates a single specular chain, returning its impulse if the mirror
/// construction holds.
pub fn validate_chain(
    grid: &VoxelGrid,
    environment: &Environment,
    source: Vec3,
    receiver: Vec3,
    chain: &[u32],
) -> Option<Impulse> {
    if chain.is_empty() {
        return None;
    }
    let scene = grid.scene();

    // mirror the source through the chain, front to back
    let mut images = Vec::with_capacity(chain.len());
    let mut image = source;
    for &triangle in chain {
        let verts = scene.triangle_verts(triangle as usize);
        image = mirror_in_plane(&verts, image);
        images.push(image);
    }

    // walk back from the receiver, checking each reflection point
    let mut point = receiver;
    for (j, &triangle) in chain.iter().enumerate().rev() {
        let target = images[j];
        let leg = target - point;
        let leg_length = leg.length();
        if leg_length < 1e-6 {
            return None;
        }
        let ray = Ray::new(point, leg);
        let verts = scene.triangle_verts(triangle as usize);
        let hit = intersect_triangle(&ray, &verts)?;
        if hit.distance > leg_length {
            return None;
        }
        // the reflection point must also be the first thing the ray meets
        let nearest = grid.closest_intersection(&ray)?;
        if (nearest.distance - hit.distance).abs() > 1e-3 {
            return None;
        }
        point = ray.at(hit.distance);
    }

    // last leg back to the real source
    if grid.occluded(point, source) {
        return None;
    }

    let final_image = *images.last()?;
    let distance = receiver.distance(final_image);
    let mut volume = environment.air_scale(distance);
    for &triangle in chain {
        let surface = scene.triangle_surface(triangle as usize);
        volume *= surface.reflectance() * (Bands::ONE - surface.scattering);
    }

    Some(Impulse {
        volume,
        position: final_image,
        distance,
    })
}

/// Validates every discovered chain and drops duplicate arrivals (coplanar
/// triangles of one wall produce distinct chains for the same image).
pub fn validate_chains(
    grid: &VoxelGrid,
    environment: &Environment,
    source: Vec3,
    receiver: Vec3,
    chains: &BTreeSet<Vec<u32>>,
) -> Vec<Impulse> {
    let mut impulses: Vec<Impulse> = chains
        .iter()
        .filter_map(|chain| validate_chain(grid, environment, source, receiver, chain))
        .collect();

    impulses.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    impulses.dedup_by(|a, b| {
        (a.distance - b.distance).abs() < 1e-4 && (a.position - b.position).length() < 1e-3
    });
    impulses
}

/// Exact image sources of an axis-aligned box with one surface on all
/// walls, up to `max_order` reflections. The zeroth-order (direct) arrival
/// is excluded.
///
/// Allen–Berkley enumeration: for parities `p` in {0,1}³ and integer wall
/// counts `r`, the image coordinate on each axis is
/// `(1 - 2p)·s + 2·r·L` (relative to the box minimum), reached by
/// `|2r - p|` reflections on that axis' wall pair.
pub fn exact_image_sources(
    aabb: &Aabb,
    source: Vec3,
    receiver: Vec3,
    surface: &Surface,
    max_order: usize,
) -> Vec<Impulse> {
    let dims = aabb.dimensions();
    let rel_source = source - aabb.min;
    let order = max_order as i32;
    let per_reflection = surface.reflectance() * (Bands::ONE - surface.scattering);

    let mut out = Vec::new();
    for px in 0..2i32 {
        for py in 0..2i32 {
            for pz in 0..2i32 {
                for rx in -order..=order {
                    let nx = (2 * rx - px).unsigned_abs();
                    if nx > max_order as u32 {
                        continue;
                    }
                    for ry in -order..=order {
                        let ny = (2 * ry - py).unsigned_abs();
                        if nx + ny > max_order as u32 {
                            continue;
                        }
                        for rz in -order..=order {
                            let nz = (2 * rz - pz).unsigned_abs();
                            let total = nx + ny + nz;
                            if total == 0 || total > max_order as u32 {
                                continue;
                            }
                            let image = aabb.min
                                + Vec3::new(
                                    (1 - 2 * px) as f32 * rel_source.x
                                        + 2.0 * rx as f32 * dims.x,
                                    (1 - 2 * py) as f32 * rel_source.y
                                        + 2.0 * ry as f32 * dims.y,
                                    (1 - 2 * pz) as f32 * rel_source.z
                                        + 2.0 * rz as f32 * dims.z,
                                );
                            let mut volume = Bands::ONE;
                            for _ in 0..total {
                                volume *= per_reflection;
                            }
                            out.push(Impulse {
                                volume,
                                position: image,
                                distance: receiver.distance(image),
                            });
                        }
                    }
                }
            }
        }
    }
    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}
